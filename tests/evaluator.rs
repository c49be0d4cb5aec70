use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use muse::{
    batched_source, collect, execute, flat_map, map, run, run_blocking, source, value, BatchedSource, DataSource,
    Env, Muse, MuseError, RunOptions,
};

#[derive(Clone)]
struct Counters {
    fetch: Arc<AtomicUsize>,
    fetch_multi: Arc<AtomicUsize>,
}

impl Counters {
    fn new() -> Self {
        Counters {
            fetch: Arc::new(AtomicUsize::new(0)),
            fetch_multi: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// A user record fetched by id. Carries its own `Counters` handle so tests
/// can check how many times `fetch`/`fetch_multi` actually ran.
struct UserById {
    id: u32,
    counters: Counters,
}

#[async_trait]
impl DataSource for UserById {
    type Identity = u32;
    type Response = String;
    type Error = Infallible;

    fn identity(&self) -> u32 {
        self.id
    }

    async fn fetch(&self, _env: &Env) -> Result<String, Infallible> {
        self.counters.fetch.fetch_add(1, Ordering::SeqCst);
        Ok(format!("user-{}", self.id))
    }
}

struct BatchedUserById {
    id: u32,
    counters: Counters,
}

#[async_trait]
impl DataSource for BatchedUserById {
    type Identity = u32;
    type Response = String;
    type Error = Infallible;

    fn identity(&self) -> u32 {
        self.id
    }

    async fn fetch(&self, _env: &Env) -> Result<String, Infallible> {
        self.counters.fetch.fetch_add(1, Ordering::SeqCst);
        Ok(format!("user-{}", self.id))
    }
}

#[async_trait]
impl BatchedSource for BatchedUserById {
    async fn fetch_multi(
        &self,
        others: &[&Self],
        _env: &Env,
    ) -> Result<HashMap<u32, String>, Infallible> {
        self.counters.fetch_multi.fetch_add(1, Ordering::SeqCst);
        let mut out = HashMap::new();
        out.insert(self.id, format!("user-{}", self.id));
        for other in others {
            out.insert(other.id, format!("user-{}", other.id));
        }
        Ok(out)
    }
}

#[test]
fn pure_value_needs_no_fetches() {
    let result = run_blocking(value(3), RunOptions::new()).unwrap();
    assert_eq!(result, 3);
}

#[test]
fn single_source_fetches_once() {
    let counters = Counters::new();
    let plan = source(UserById {
        id: 1,
        counters: counters.clone(),
    });
    let result = run_blocking(plan, RunOptions::new()).unwrap();
    assert_eq!(result, "user-1");
    assert_eq!(counters.fetch.load(Ordering::SeqCst), 1);
}

#[test]
fn transformations_mix_fetched_and_pure_data() {
    let counters = Counters::new();
    let plan = collect(vec![
        map(
            source(UserById {
                id: 7,
                counters: counters.clone(),
            }),
            |name| format!("{name}!"),
        ),
        map(value(3), |n: i32| format!("n={n}")),
    ]);
    let result = run_blocking(plan, RunOptions::new()).unwrap();
    assert_eq!(result, vec!["user-7!".to_string(), "n=3".to_string()]);
    assert_eq!(counters.fetch.load(Ordering::SeqCst), 1);
}

#[test]
fn two_distinct_sources_unbatched_fetch_concurrently() {
    let counters = Counters::new();
    let plan = collect(vec![
        source(UserById {
            id: 1,
            counters: counters.clone(),
        }),
        source(UserById {
            id: 2,
            counters: counters.clone(),
        }),
    ]);
    let result = run_blocking(plan, RunOptions::new()).unwrap();
    assert_eq!(result, vec!["user-1".to_string(), "user-2".to_string()]);
    assert_eq!(counters.fetch.load(Ordering::SeqCst), 2);
}

#[test]
fn two_distinct_sources_batched_fire_one_fetch_multi() {
    let counters = Counters::new();
    let plan = collect(vec![
        batched_source(BatchedUserById {
            id: 1,
            counters: counters.clone(),
        }),
        batched_source(BatchedUserById {
            id: 2,
            counters: counters.clone(),
        }),
    ]);
    let result = run_blocking(plan, RunOptions::new()).unwrap();
    assert_eq!(result, vec!["user-1".to_string(), "user-2".to_string()]);
    assert_eq!(counters.fetch.load(Ordering::SeqCst), 0);
    assert_eq!(counters.fetch_multi.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_identity_in_a_collect_is_deduplicated() {
    let counters = Counters::new();
    let plan = collect(vec![
        source(UserById {
            id: 5,
            counters: counters.clone(),
        }),
        source(UserById {
            id: 5,
            counters: counters.clone(),
        }),
    ]);
    let result = run_blocking(plan, RunOptions::new()).unwrap();
    assert_eq!(result, vec!["user-5".to_string(), "user-5".to_string()]);
    assert_eq!(counters.fetch.load(Ordering::SeqCst), 1);
}

#[test]
fn flat_map_chains_a_second_level_of_fetches() {
    let counters = Counters::new();
    let continuation_counters = counters.clone();
    let plan = flat_map(
        source(UserById {
            id: 1,
            counters: counters.clone(),
        }),
        move |first| {
            source(UserById {
                id: first.len() as u32,
                counters: continuation_counters,
            })
        },
    );
    let result = run_blocking(plan, RunOptions::new()).unwrap();
    // "user-1" has length 6, so the second fetch is for id 6.
    assert_eq!(result, "user-6");
    assert_eq!(counters.fetch.load(Ordering::SeqCst), 2);
}

/// Context type attached via `RunOptions::with_context` and read back out of
/// `Env` inside a `fetch` implementation.
struct Prefix(String);

struct Greeting {
    id: u32,
}

#[async_trait]
impl DataSource for Greeting {
    type Identity = u32;
    type Response = String;
    type Error = Infallible;

    fn identity(&self) -> u32 {
        self.id
    }

    async fn fetch(&self, env: &Env) -> Result<String, Infallible> {
        let prefix = env.get::<Prefix>().map(|p| p.0.as_str()).unwrap_or("");
        Ok(format!("{prefix}user-{}", self.id))
    }
}

#[test]
fn context_attached_via_with_context_is_visible_to_fetch() {
    let plan = source(Greeting { id: 9 });
    let opts = RunOptions::new().with_context(Prefix("hello-".to_string()));
    let result = run_blocking(plan, opts).unwrap();
    assert_eq!(result, "hello-user-9");
}

#[test]
fn missing_context_falls_back_to_default() {
    let plan = source(Greeting { id: 9 });
    let result = run_blocking(plan, RunOptions::new()).unwrap();
    assert_eq!(result, "user-9");
}

#[tokio::test]
async fn reusing_a_cache_via_with_cache_skips_refetching() {
    let counters = Counters::new();
    let plan = source(UserById {
        id: 3,
        counters: counters.clone(),
    });
    let (first, cache) = execute(plan, RunOptions::new()).await.unwrap();
    assert_eq!(first, "user-3");
    assert_eq!(counters.fetch.load(Ordering::SeqCst), 1);
    assert_eq!(cache.kind_count(), 1);

    let second_plan = source(UserById {
        id: 3,
        counters: counters.clone(),
    });
    let second = run(second_plan, RunOptions::new().with_cache(cache)).await.unwrap();
    assert_eq!(second, "user-3");
    assert_eq!(
        counters.fetch.load(Ordering::SeqCst),
        1,
        "a seeded cache hit should not call fetch again"
    );
}

#[derive(Debug, thiserror::Error)]
#[error("this source always fails")]
struct BoomError;

struct FailingSource;

#[async_trait]
impl DataSource for FailingSource {
    type Identity = u32;
    type Response = String;
    type Error = BoomError;

    fn identity(&self) -> u32 {
        0
    }

    async fn fetch(&self, _env: &Env) -> Result<String, BoomError> {
        Err(BoomError)
    }
}

#[test]
fn a_rejected_fetch_surfaces_as_fetch_failed() {
    let err = run_blocking(source(FailingSource), RunOptions::new()).unwrap_err();
    assert!(
        matches!(err, MuseError::FetchFailed { .. }),
        "expected FetchFailed, got {err:?}"
    );
}

/// A batched source whose `fetch_multi` drops its own identity from the
/// response map, simulating a buggy batch loader.
struct DroppingBatch {
    id: u32,
}

#[async_trait]
impl DataSource for DroppingBatch {
    type Identity = u32;
    type Response = String;
    type Error = Infallible;

    fn identity(&self) -> u32 {
        self.id
    }

    async fn fetch(&self, _env: &Env) -> Result<String, Infallible> {
        Ok(format!("flaky-{}", self.id))
    }
}

#[async_trait]
impl BatchedSource for DroppingBatch {
    async fn fetch_multi(&self, others: &[&Self], _env: &Env) -> Result<HashMap<u32, String>, Infallible> {
        let mut out = HashMap::new();
        for other in others {
            out.insert(other.id, format!("flaky-{}", other.id));
        }
        Ok(out)
    }
}

#[test]
fn fetch_multi_missing_a_key_surfaces_as_batch_incomplete() {
    let plan = collect(vec![
        batched_source(DroppingBatch { id: 1 }),
        batched_source(DroppingBatch { id: 2 }),
    ]);
    let err = run_blocking(plan, RunOptions::new()).unwrap_err();
    assert!(
        matches!(err, MuseError::BatchIncomplete { .. }),
        "expected BatchIncomplete, got {err:?}"
    );
}

struct Counter {
    id: u32,
}

#[async_trait]
impl DataSource for Counter {
    type Identity = u32;
    type Response = u32;
    type Error = Infallible;

    fn identity(&self) -> u32 {
        self.id
    }

    async fn fetch(&self, _env: &Env) -> Result<u32, Infallible> {
        Ok(self.id)
    }
}

/// A `flat_map` chain that always introduces a fresh source and never
/// produces a plain value, so it never bottoms out on its own.
fn never_ends(id: u32) -> Muse<u32> {
    flat_map(source(Counter { id }), move |next| never_ends(next + 1))
}

#[test]
fn a_flat_map_that_never_bottoms_out_diverges() {
    let opts = RunOptions::new().with_max_iterations(5);
    let err = run_blocking(never_ends(0), opts).unwrap_err();
    assert!(matches!(err, MuseError::Diverged { .. }), "expected Diverged, got {err:?}");
}
