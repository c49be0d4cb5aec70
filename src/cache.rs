use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::any::AnyValue;
use crate::identity::IdentityKey;
use crate::kind::KindId;

type Inner = HashMap<KindId, HashMap<IdentityKey, Arc<AnyValue>>>;

/// A two-level `resource kind -> identity -> response` map, owned by a
/// single [`crate::run::execute`] call. Entries are write-once: the
/// evaluator only ever inserts a `(kind, identity)` pair it has not already
/// inserted, since dispatch only ever asks for misses.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<RwLock<Inner>>,
}

impl Cache {
    pub fn new() -> Self {
        Cache {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub(crate) fn lookup(&self, kind: KindId, id: &IdentityKey) -> Option<Arc<AnyValue>> {
        self.inner.read().get(&kind)?.get(id).cloned()
    }

    /// Merges freshly fetched responses for a single kind into the cache.
    /// Debug-asserts the write-once invariant; ignored in release builds,
    /// since a violation there indicates a bug in the dispatch layer rather
    /// than something the caller can act on.
    pub(crate) fn merge(&self, kind: KindId, responses: HashMap<IdentityKey, AnyValue>) {
        let mut guard = self.inner.write();
        let slot = guard.entry(kind).or_default();
        for (id, value) in responses {
            debug_assert!(
                !slot.contains_key(&id),
                "muse: cache entry for {kind:?}/{id:?} was fetched twice in one run"
            );
            slot.insert(id, Arc::new(value));
        }
    }

    /// Number of resource kinds with at least one cached response. Exposed
    /// for diagnostics and tests, not part of the evaluator's own logic.
    pub fn kind_count(&self) -> usize {
        self.inner.read().len()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
