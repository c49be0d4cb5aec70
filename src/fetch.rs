use std::collections::{HashMap, HashSet};

use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::any::AnyValue;
use crate::cache::Cache;
use crate::env::Env;
use crate::error::MuseError;
use crate::identity::IdentityKey;
use crate::kind::KindId;
use crate::source::ArcSource;

/// Groups the frontier by resource kind, dedupes by identity within each
/// group, fetches every group concurrently (choosing batched vs. per-item
/// dispatch per group), and merges every group's responses into the
/// cache as they complete.
#[instrument(skip_all, fields(frontier_len = frontier.len()))]
pub(crate) async fn dispatch(frontier: Vec<ArcSource>, cache: &Cache, env: &Env) -> Result<(), MuseError> {
    let groups = group_and_dedupe(frontier);
    debug!(kinds = groups.len(), "dispatching level");

    let fetches = groups
        .into_iter()
        .map(|(kind, requests)| fetch_group(kind, requests, env));
    let merged = try_join_all(fetches).await?;

    for (kind, responses) in merged {
        cache.merge(kind, responses);
    }
    Ok(())
}

fn group_and_dedupe(frontier: Vec<ArcSource>) -> Vec<(KindId, Vec<ArcSource>)> {
    let mut order: Vec<KindId> = Vec::new();
    let mut groups: HashMap<KindId, (Vec<ArcSource>, HashSet<IdentityKey>)> = HashMap::new();

    for request in frontier {
        let kind = request.kind();
        let id = request.identity();
        let (requests, seen) = groups.entry(kind).or_insert_with(|| {
            order.push(kind);
            (Vec::new(), HashSet::new())
        });
        if !seen.insert(id) {
            continue;
        }
        requests.push(request);
    }

    order
        .into_iter()
        .map(|kind| {
            let (requests, _) = groups.remove(&kind).expect("kind recorded in `order`");
            (kind, requests)
        })
        .collect()
}

async fn fetch_group(
    kind: KindId,
    requests: Vec<ArcSource>,
    env: &Env,
) -> Result<(KindId, HashMap<IdentityKey, AnyValue>), MuseError> {
    debug!(%kind, count = requests.len(), "fetching group");

    if requests.len() == 1 {
        let request = &requests[0];
        let id = request.identity();
        let value = request.fetch_one(env).await?;
        let mut out = HashMap::with_capacity(1);
        out.insert(id, value);
        return Ok((kind, out));
    }

    let all_batched = requests.iter().all(|r| r.as_batch().is_some());
    if all_batched {
        let batch = requests[0]
            .as_batch()
            .expect("checked by all_batched above");
        let out = batch.fetch_group(&requests, env).await?;
        return Ok((kind, out));
    }

    debug!(%kind, "mixed or non-batched group, fetching concurrently");
    let fetches = requests.iter().map(|r| {
        let id = r.identity();
        async move { r.fetch_one(env).await.map(|v| (id, v)) }
    });
    let out: HashMap<IdentityKey, AnyValue> = try_join_all(fetches).await?.into_iter().collect();
    Ok((kind, out))
}
