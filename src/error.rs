use std::fmt;

use crate::kind::KindId;

/// Anything that can go wrong while building or evaluating a plan.
#[derive(Debug, thiserror::Error)]
pub enum MuseError {
    /// A `fetch` or `fetch_multi` call rejected.
    #[error("fetch failed for {kind} identity {id}: {source}")]
    FetchFailed {
        kind: KindId,
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `fetch_multi` returned a response map missing one or more of the
    /// identities it was asked to resolve.
    #[error("batched fetch for {kind} is missing responses for: {missing}")]
    BatchIncomplete { kind: KindId, missing: MissingList },

    /// The evaluator ran more passes than the configured bound without
    /// reaching a `Done` root.
    #[error("evaluation did not converge after {iterations} iterations")]
    Diverged { iterations: usize },
}

/// Formats a list of missing identities for [`MuseError::BatchIncomplete`]
/// without requiring the identity type itself to appear in the error enum.
#[derive(Debug)]
pub struct MissingList(pub Vec<String>);

impl fmt::Display for MissingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}
