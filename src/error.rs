//! # Error Types
//!
//! Deployment error taxonomy. Remote failures are wrapped with the names of the
//! entities involved so that messages can be surfaced to users verbatim; a raw
//! [`PlatformError`] never leaves this crate without context.

use crate::platform::PlatformError;
use thiserror::Error;

/// Errors produced while reconciling and executing deployment steps
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeployError {
    /// Invalid or contradictory deployment configuration. Never retried.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Ownership clash between MTAs over an existing resource
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Remote platform call failed
    #[error("{context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: PlatformError,
    },

    #[error("Insufficient permissions: {message}")]
    Permission { message: String },

    #[error("Could not bind application \"{application}\" to service \"{service}\": {message}")]
    Binding {
        application: String,
        service: String,
        message: String,
    },

    #[error("Required service key element \"{key}\" of service \"{service}\" for application \"{application}\" was not found")]
    ServiceKeyNotFound {
        key: String,
        service: String,
        application: String,
    },

    /// A polled asynchronous operation reached an error state
    #[error("Asynchronous operation {operation} failed: {message}")]
    AsyncOperationFailed { operation: String, message: String },

    #[error("Process state error: {message}")]
    StateStore { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Failures collected from independent entities of one batch
    #[error("{} operations failed: {}", .failures.len(), join_messages(.failures))]
    Aggregate { failures: Vec<DeployError> },
}

fn join_messages(failures: &[DeployError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DeployError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Wrap a platform error with the operation and entity it concerned
    pub fn platform(context: impl Into<String>, source: PlatformError) -> Self {
        Self::Platform {
            context: context.into(),
            source,
        }
    }

    /// Create a permission error
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    /// Create a binding error naming both ends of the binding
    pub fn binding(
        application: impl Into<String>,
        service: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Binding {
            application: application.into(),
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn service_key_not_found(
        key: impl Into<String>,
        service: impl Into<String>,
        application: impl Into<String>,
    ) -> Self {
        Self::ServiceKeyNotFound {
            key: key.into(),
            service: service.into(),
            application: application.into(),
        }
    }

    pub fn async_operation_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AsyncOperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn state_store(message: impl Into<String>) -> Self {
        Self::StateStore {
            message: message.into(),
        }
    }

    /// Collapse collected failures; a single failure is returned unwrapped
    pub fn aggregate(mut failures: Vec<DeployError>) -> Self {
        if failures.len() == 1 {
            failures.remove(0)
        } else {
            Self::Aggregate { failures }
        }
    }

    /// HTTP-like status of the underlying platform failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Platform { source, .. } => Some(source.status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Platform { source, .. } if source.is_not_found())
    }

    pub fn is_forbidden(&self) -> bool {
        match self {
            Self::Permission { .. } => true,
            Self::Platform { source, .. } => source.is_forbidden(),
            _ => false,
        }
    }

    /// Transient failures the orchestrator may choose to retry from the step start
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Platform { source, .. } => source.is_server_error(),
            Self::StateStore { .. } => true,
            Self::Aggregate { failures } => failures.iter().all(DeployError::is_retryable),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

pub type DeployResult<T> = std::result::Result<T, DeployError>;
