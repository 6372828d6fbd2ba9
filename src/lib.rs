#![allow(clippy::doc_markdown)] // Allow technical terms like MTA, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # MTA Deployer Core
//!
//! Resumable step-execution core for multi-target application (MTA)
//! deployments onto a cloud application platform.
//!
//! ## Overview
//!
//! A deployment is a sequence of steps run by an external orchestrator. Each
//! step invocation reconciles desired applications and services with what the
//! platform currently reports, performs the required remote calls and ends in
//! one of three phases: done, poll (an asynchronous platform operation is in
//! flight) or error. Everything needed to resume lives in a typed, serializable
//! process state, so a poll may continue on another machine after a restart.
//!
//! ## Module Organization
//!
//! - [`diff`] - Pure reconciliation of desired and existing services and applications
//! - [`executor`] - Remote calls for computed actions, with partial-failure isolation
//! - [`poller`] - Status classifiers for upload, staging, start, execution and service operations
//! - [`state_machine`] - Step phases, process state and the step phase controller
//! - [`subscriptions`] - Configuration entry publishing and subscriber updates
//! - [`conflicts`] - Ownership conflict detection for existing resources
//! - [`steps`] - Concrete deployment steps
//! - [`platform`] - Contracts of the remote platform, log stream and client provider
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mta_deployer::models::ServiceDeploymentUnit;
//! use mta_deployer::state_machine::{InMemoryProcessStateStore, ProcessStateStore, StepPhaseController};
//! use mta_deployer::steps::{diff_engine, DetermineServiceActionsStep};
//! use mta_deployer::test_helpers::{process_state, TestEnvironment};
//! use std::sync::Arc;
//!
//! # async fn example() -> mta_deployer::DeployResult<()> {
//! let env = TestEnvironment::new();
//! let store = Arc::new(InMemoryProcessStateStore::new());
//!
//! let mut state = process_state("com.example.shop");
//! state.service_to_process = Some(ServiceDeploymentUnit::managed("db", "postgresql", "small"));
//! store.save_state("process-1", &state).await?;
//!
//! let controller = StepPhaseController::new(store, env.collaborators());
//! let step = DetermineServiceActionsStep::new(diff_engine(&env.config));
//! let phase = controller.run("process-1", &step).await?;
//! println!("Step finished in phase {phase}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod conflicts;
pub mod constants;
pub mod diff;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod platform;
pub mod poller;
pub mod state_machine;
pub mod steps;
pub mod subscriptions;
pub mod test_helpers;

pub use config::{ConfigManager, DeployerConfig};
pub use conflicts::ConflictDetector;
pub use diff::{ActionSet, DiffEngine, ServiceAction, StateDiffEngine};
pub use error::{DeployError, DeployResult};
pub use platform::{LogStreamReader, PlatformClient, PlatformClientProvider, PlatformError, PlatformResult};
pub use poller::{AsyncExecution, AsyncOutcome};
pub use state_machine::{
    AsyncExecutionState, Collaborators, DeploymentFlags, DeploymentProcessState,
    ProcessStateStore, Step, StepContext, StepPhase, StepPhaseController,
};
pub use subscriptions::ConfigurationStore;
