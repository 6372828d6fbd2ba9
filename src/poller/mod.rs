//! # Asynchronous Operation Polling
//!
//! Slow remote operations are observed through repeatable status checks. Each
//! poller queries the platform, classifies the platform-specific status into
//! an [`AsyncExecutionState`] and records whatever the next poll needs in the
//! process state.
//!
//! Transport errors while polling are returned as errors instead of being
//! reported as still running.

pub mod execute;
pub mod service_operations;
pub mod staging;
pub mod start;
pub mod upload;

use crate::error::DeployResult;
use crate::state_machine::{AsyncExecutionState, StepContext};
use async_trait::async_trait;

pub use execute::{Marker, PollExecuteStatus};
pub use service_operations::{classify_service_operation, PollServiceOperations, ServiceOperationStatus};
pub use staging::{classify_build, PollStagingStatus};
pub use start::{classify_start, PollStartStatus};
pub use upload::{classify_upload, PollUploadStatus};

/// Result of one poll, with an optional diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOutcome {
    pub state: AsyncExecutionState,
    pub message: Option<String>,
}

impl AsyncOutcome {
    pub fn running() -> Self {
        Self {
            state: AsyncExecutionState::Running,
            message: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            state: AsyncExecutionState::Finished,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: AsyncExecutionState::Error,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One repeatable status check of an asynchronous operation
#[async_trait]
pub trait AsyncExecution: Send + Sync {
    fn name(&self) -> &'static str;

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome>;

    /// Message used when the operation ends in error without a diagnostic
    fn polling_error_message(&self, ctx: &StepContext) -> String;
}
