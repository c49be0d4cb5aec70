use std::any::TypeId;
use std::fmt;

/// The nominal type of a data-source request. Two requests share a kind iff
/// they were built from the same [`crate::source::DataSource`] implementor.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindId {
    type_id: TypeId,
    name: &'static str,
}

impl KindId {
    pub(crate) fn of<S: 'static>() -> Self {
        KindId {
            type_id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }
}

impl fmt::Debug for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
