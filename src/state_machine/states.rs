use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one step invocation, persisted so the orchestrator can resume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    /// Step completed; the process moves on
    #[default]
    Done,
    /// An asynchronous operation is in flight; invoke the step again to poll it
    Poll,
    /// Step failed; retry policy belongs to the orchestrator
    Error,
}

impl StepPhase {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Poll)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Poll => write!(f, "poll"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for StepPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(Self::Done),
            "poll" => Ok(Self::Poll),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid step phase: {s}")),
        }
    }
}

/// Tri-state result of polling an asynchronous remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsyncExecutionState {
    Running,
    Finished,
    Error,
}

impl AsyncExecutionState {
    /// Terminal states stop polling
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}

impl fmt::Display for AsyncExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Error => write!(f, "error"),
        }
    }
}
