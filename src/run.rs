use tracing::instrument;

use crate::any::downcast;
use crate::cache::Cache;
use crate::env::{Env, RunOptions};
use crate::error::MuseError;
use crate::evaluator::evaluate;
use crate::muse::{into_node, Muse};

/// Evaluates `plan` to completion, returning both the final value and the
/// cache the run populated along the way.
#[instrument(skip_all)]
pub async fn execute<T: 'static>(plan: Muse<T>, opts: RunOptions) -> Result<(T, Cache), MuseError> {
    let RunOptions {
        cache,
        context,
        max_iterations,
    } = opts;
    let env = Env::new(cache, context);
    let value = evaluate(into_node(plan), &env, max_iterations).await?;
    Ok((downcast::<T>(value), env.cache))
}

/// Evaluates `plan` to completion, discarding the resulting cache.
pub async fn run<T: 'static>(plan: Muse<T>, opts: RunOptions) -> Result<T, MuseError> {
    execute(plan, opts).await.map(|(value, _cache)| value)
}

/// Blocks the calling thread on [`run`] (the source library's `run!`).
///
/// Always drives `plan` on a dedicated current-thread Tokio runtime on a
/// fresh OS thread, rather than reusing any runtime the caller happens to
/// be inside. This keeps nested calls safe — a `fetch` implementation may
/// itself call `run_blocking` on a further plan — without requiring the
/// ambient runtime to be multi-threaded.
pub fn run_blocking<T: Send + 'static>(plan: Muse<T>, opts: RunOptions) -> Result<T, MuseError> {
    std::thread::scope(|scope| {
        scope
            .spawn(|| {
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("muse: failed to start a Tokio runtime for run_blocking")
                    .block_on(run(plan, opts))
            })
            .join()
            .expect("muse: run_blocking worker thread panicked")
    })
}
