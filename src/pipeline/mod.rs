pub mod coordinator;
pub mod error;
pub mod fork_join;
pub mod retry;

pub use coordinator::{
    retry_exhausted_reply, WorkflowCoordinator, GREETING_REPLY, OUT_OF_SCOPE_REPLY,
};
pub use error::PipelineError;
pub use retry::{RetryController, RetryVerdict, DEFAULT_MAX_ATTEMPTS};
