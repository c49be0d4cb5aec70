use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::Cache;

/// Arbitrary caller-supplied context, keyed by type, carried alongside the
/// cache into every `fetch`/`fetch_multi` call. Modeled after the
/// type-keyed extension maps this lineage uses for per-request context.
#[derive(Default, Clone)]
pub(crate) struct Context(HashMap<TypeId, Arc<dyn Any + Send + Sync>>);

impl Context {
    fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.0.insert(TypeId::of::<T>(), Arc::new(value));
    }

    fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.0.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }
}

/// The environment passed to every data-source fetch: the run's cache plus
/// whatever typed context the caller attached via [`RunOptions::with_context`].
#[derive(Clone)]
pub struct Env {
    pub(crate) cache: Cache,
    context: Context,
}

impl Env {
    pub(crate) fn new(cache: Cache, context: Context) -> Self {
        Env { cache, context }
    }

    /// The cache backing the run this `Env` belongs to.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Looks up context of type `T` attached via [`RunOptions::with_context`].
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.context.get::<T>()
    }
}

/// Configuration for a single [`crate::run::execute`] call.
pub struct RunOptions {
    pub(crate) cache: Cache,
    pub(crate) context: Context,
    pub(crate) max_iterations: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            cache: Cache::new(),
            context: Context::default(),
            max_iterations: 1_000,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the run with an already-populated cache, e.g. to reuse results
    /// carried over from a prior `execute` call.
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    /// Attaches a piece of typed context, retrievable from `fetch`/`fetch_multi`
    /// implementations via `Env::get`.
    pub fn with_context<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.context.insert(value);
        self
    }

    /// Overrides the total evaluator-pass bound that guards against a
    /// [`crate::error::MuseError::Diverged`] evaluator.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}
