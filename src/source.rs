use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::any::{boxed, AnyValue};
use crate::env::Env;
use crate::error::{MissingList, MuseError};
use crate::identity::IdentityKey;
use crate::kind::KindId;

/// A single piece of remote data a plan can ask for. `Identity` is the
/// dedup/cache key; `Response` is what a successful fetch produces. `fetch`
/// reports failure through the implementor's own error type; the evaluator
/// wraps it into [`MuseError::FetchFailed`] alongside the kind and identity
/// that failed, so implementations don't need to know about `MuseError`.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    type Identity: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;
    type Response: Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn identity(&self) -> Self::Identity;

    async fn fetch(&self, env: &Env) -> Result<Self::Response, Self::Error>;
}

/// Opt-in batching for a [`DataSource`]. Requests entered through
/// [`batched_source`] have their kind dispatched through `fetch_multi`
/// instead of one concurrent `fetch` per request.
#[async_trait]
pub trait BatchedSource: DataSource {
    /// Resolves `self` together with every request in `others` in one call.
    /// The returned map must contain an entry for every input identity,
    /// including `self`'s; a missing entry surfaces as
    /// [`MuseError::BatchIncomplete`].
    async fn fetch_multi(
        &self,
        others: &[&Self],
        env: &Env,
    ) -> Result<HashMap<Self::Identity, Self::Response>, Self::Error>;
}

/// Type-erased handle to a pending request, held by `Node::Source` and
/// passed around the fetch/dispatch layer without knowledge of the
/// concrete `DataSource` implementor.
pub(crate) trait ErasedRequest: Send + Sync {
    fn kind(&self) -> KindId;
    fn identity(&self) -> IdentityKey;
    fn as_any(&self) -> &dyn Any;
    fn fetch_one<'a>(&'a self, env: &'a Env) -> BoxFuture<'a, Result<AnyValue, MuseError>>;
    fn as_batch(&self) -> Option<&dyn ErasedBatch>;
    /// Clones a cached response out of its type-erased storage. The cache
    /// keeps one `Arc<AnyValue>` per identity so that several `Source`
    /// nodes sharing an identity can all read it; this downcasts to the
    /// concrete `Response` type (known here, not at the cache) and clones
    /// it into a fresh, independently owned `AnyValue`.
    fn clone_response(&self, value: &AnyValue) -> AnyValue;
}

/// Implemented by requests entered through [`batched_source`]; lets the
/// dispatcher fire a single `fetch_multi` call across a same-kind group.
pub(crate) trait ErasedBatch: Send + Sync {
    fn fetch_group<'a>(
        &'a self,
        group: &'a [Arc<dyn ErasedRequest>],
        env: &'a Env,
    ) -> BoxFuture<'a, Result<HashMap<IdentityKey, AnyValue>, MuseError>>;
}

pub(crate) type ArcSource = Arc<dyn ErasedRequest>;

struct Plain<S>(S);

impl<S: DataSource> ErasedRequest for Plain<S> {
    fn kind(&self) -> KindId {
        KindId::of::<S>()
    }

    fn identity(&self) -> IdentityKey {
        IdentityKey::new(self.0.identity())
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn fetch_one<'a>(&'a self, env: &'a Env) -> BoxFuture<'a, Result<AnyValue, MuseError>> {
        Box::pin(async move { fetch_one::<S>(&self.0, env).await })
    }

    fn as_batch(&self) -> Option<&dyn ErasedBatch> {
        None
    }

    fn clone_response(&self, value: &AnyValue) -> AnyValue {
        clone_cached::<S>(value)
    }
}

struct Batched<S>(S);

impl<S: BatchedSource> ErasedRequest for Batched<S> {
    fn kind(&self) -> KindId {
        KindId::of::<S>()
    }

    fn identity(&self) -> IdentityKey {
        IdentityKey::new(self.0.identity())
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn fetch_one<'a>(&'a self, env: &'a Env) -> BoxFuture<'a, Result<AnyValue, MuseError>> {
        Box::pin(async move { fetch_one::<S>(&self.0, env).await })
    }

    fn as_batch(&self) -> Option<&dyn ErasedBatch> {
        Some(self)
    }

    fn clone_response(&self, value: &AnyValue) -> AnyValue {
        clone_cached::<S>(value)
    }
}

fn clone_cached<S: DataSource>(value: &AnyValue) -> AnyValue {
    let response = value
        .downcast_ref::<S::Response>()
        .expect("muse: cache value type mismatch for this kind");
    boxed(response.clone())
}

async fn fetch_one<S: DataSource>(s: &S, env: &Env) -> Result<AnyValue, MuseError> {
    s.fetch(env).await.map(boxed).map_err(|e| MuseError::FetchFailed {
        kind: KindId::of::<S>(),
        id: format!("{:?}", s.identity()),
        source: Box::new(e),
    })
}

impl<S: BatchedSource> ErasedBatch for Batched<S> {
    fn fetch_group<'a>(
        &'a self,
        group: &'a [ArcSource],
        env: &'a Env,
    ) -> BoxFuture<'a, Result<HashMap<IdentityKey, AnyValue>, MuseError>> {
        Box::pin(async move {
            let downcast = |r: &'a ArcSource| -> &'a S {
                r.as_any()
                    .downcast_ref::<S>()
                    .expect("muse: same-kind group held a mismatched concrete source type")
            };
            let (first, rest) = group
                .split_first()
                .expect("muse: dispatch never calls fetch_group with an empty group");
            let first_s = downcast(first);
            let rest_s: Vec<&S> = rest.iter().map(downcast).collect();

            let kind = first.kind();
            let wanted: Vec<IdentityKey> = group.iter().map(|r| r.identity()).collect();

            let responses = first_s
                .fetch_multi(&rest_s, env)
                .await
                .map_err(|e| MuseError::FetchFailed {
                    kind,
                    id: format!("<batch of {} requests>", group.len()),
                    source: Box::new(e),
                })?;
            let mut out = HashMap::with_capacity(responses.len());
            for (identity, response) in responses {
                out.insert(IdentityKey::new(identity), boxed(response));
            }

            let missing: Vec<String> = wanted
                .iter()
                .filter(|id| !out.contains_key(id))
                .map(|id| format!("{id:?}"))
                .collect();
            if !missing.is_empty() {
                return Err(MuseError::BatchIncomplete {
                    kind,
                    missing: MissingList(missing),
                });
            }
            Ok(out)
        })
    }
}

/// Lifts a plain [`DataSource`] request into the untyped AST as a
/// `Node::Source`. Its kind is always dispatched by firing a `fetch` call
/// per outstanding identity at each level.
pub(crate) fn erase<S: DataSource>(s: S) -> ArcSource {
    Arc::new(Plain(s))
}

/// Lifts a [`BatchedSource`] request into the untyped AST. Its kind is
/// dispatched through a single `fetch_multi` call per level, provided every
/// sibling request of that kind was also entered through `batched_source`
/// (see `DESIGN.md` for the mixed-entry-point edge case).
pub(crate) fn erase_batched<S: BatchedSource>(s: S) -> ArcSource {
    Arc::new(Batched(s))
}
