use tracing::{instrument, trace};

use crate::any::AnyValue;
use crate::env::Env;
use crate::error::MuseError;
use crate::fetch::dispatch;
use crate::node::{inject, Node};

/// Drives `node` to a final value: inject the cache, dispatch the
/// resulting frontier, merge responses, repeat. `max_iterations` bounds
/// the total number of passes, whether or not each one dispatches a
/// fetch, guarding against a plan whose `flat_map` continuations never
/// bottom out (each continuation adds one more pass without ever
/// producing a `Done` root).
#[instrument(skip_all)]
pub(crate) async fn evaluate(mut node: Node, env: &Env, max_iterations: usize) -> Result<AnyValue, MuseError> {
    let mut iterations = 0usize;

    loop {
        iterations += 1;
        if iterations > max_iterations {
            return Err(MuseError::Diverged { iterations });
        }

        let (injected, frontier) = inject(node, &env.cache);
        node = injected;

        if frontier.is_empty() {
            if let Node::Done(value) = node {
                return Ok(value);
            }
            trace!(iterations, "no frontier yet, not done; retrying injection");
            continue;
        }

        trace!(iterations, level_frontier = frontier.len(), "dispatching level");
        dispatch(frontier, &env.cache, env).await?;
    }
}
