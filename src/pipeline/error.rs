use thiserror::Error;

use crate::capabilities::CapabilityError;

/// Fatal turn failures.
///
/// Scope rejections, query faults within the retry bound, retry exhaustion
/// and chart faults are all normal terminal outcomes handled inside the
/// pipeline; only capability faults and caller mistakes surface here, so a
/// presentation layer can tell "bad question or query" from "system
/// degraded".
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("{capability} capability failed: {source}")]
    Capability {
        capability: &'static str,
        #[source]
        source: CapabilityError,
    },

    #[error("state invariant violated: {0}")]
    Invariant(&'static str),
}

impl PipelineError {
    pub(crate) fn capability(capability: &'static str, source: CapabilityError) -> Self {
        PipelineError::Capability { capability, source }
    }
}
