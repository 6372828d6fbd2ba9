//! # Step State Machine
//!
//! Resumable step execution. Each invocation of a step either completes it
//! ([`StepPhase::Done`]), leaves an asynchronous operation to be polled
//! ([`StepPhase::Poll`]) or fails it ([`StepPhase::Error`]). The phase and all
//! data needed to resume are persisted in the [`DeploymentProcessState`].

pub mod controller;
pub mod persistence;
pub mod process_state;
pub mod states;
pub mod step;

pub use controller::StepPhaseController;
pub use persistence::{InMemoryProcessStateStore, ProcessStateStore};
pub use process_state::{DeploymentFlags, DeploymentProcessState};
pub use states::{AsyncExecutionState, StepPhase};
pub use step::{Collaborators, Step, StepContext};
