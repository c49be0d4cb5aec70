use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Type-erased, hashable, cloneable identity of a single request. Acts as
/// the key into the per-kind half of the [`crate::cache::Cache`].
///
/// `IdentityKey` precomputes its hash at construction time so it can
/// implement `Hash` without forwarding into an arbitrary `&mut dyn Hasher`.
/// Equality still downcasts to the concrete identity type, so two different
/// concrete types never compare equal even if their hashes collide.
pub struct IdentityKey {
    hash: u64,
    inner: Box<dyn ErasedIdentity>,
}

impl IdentityKey {
    pub fn new<T>(value: T) -> Self
    where
        T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        IdentityKey {
            hash: hasher.finish(),
            inner: Box::new(value),
        }
    }
}

impl Clone for IdentityKey {
    fn clone(&self) -> Self {
        IdentityKey {
            hash: self.hash,
            inner: self.inner.clone_box(),
        }
    }
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.inner.eq_any(other.inner.as_any())
    }
}

impl Eq for IdentityKey {}

impl Hash for IdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

trait ErasedIdentity: Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn eq_any(&self, other: &dyn Any) -> bool;
    fn clone_box(&self) -> Box<dyn ErasedIdentity>;
}

impl<T> ErasedIdentity for T
where
    T: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_any(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn clone_box(&self) -> Box<dyn ErasedIdentity> {
        Box::new(self.clone())
    }
}
