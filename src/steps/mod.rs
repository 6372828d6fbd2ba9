//! # Deployment Steps
//!
//! Concrete [`Step`](crate::state_machine::Step) implementations wiring the
//! diff engine, executors, pollers and the subscription registry together.
//! The orchestrator runs them in this order, fanning out the per-service and
//! per-application steps over `services_to_deploy` and `apps_to_deploy`:
//!
//! 1. [`CheckForCreationConflictsStep`]
//! 2. per service: [`DetermineServiceActionsStep`], [`CreateOrUpdateServiceStep`]
//! 3. per application: [`CreateOrUpdateAppStep`], [`UploadAppStep`], [`BindServicesStep`],
//!    [`DetermineApplicationActionsStep`], [`StageAppStep`], [`StartAppStep`]
//! 4. [`CreateOrUpdateServiceBrokersStep`]
//! 5. [`PublishConfigurationEntriesStep`], [`DeleteDiscontinuedConfigurationEntriesStep`]
//! 6. [`UpdateSubscribersStep`], [`RestartSubscribersStep`]
//! 7. [`DeleteServiceBrokersStep`], [`DeleteServicesStep`]

pub mod applications;
pub mod brokers;
pub mod configuration;
pub mod services;

pub use applications::{
    BindServicesStep, CreateOrUpdateAppStep, DetermineApplicationActionsStep, StageAppStep,
    StartAppStep, UploadAppStep,
};
pub use brokers::{CreateOrUpdateServiceBrokersStep, DeleteServiceBrokersStep};
pub use configuration::{
    DeleteDiscontinuedConfigurationEntriesStep, PublishConfigurationEntriesStep,
    RestartSubscribersStep, UpdateSubscribersStep,
};
pub use services::{
    CheckForCreationConflictsStep, CreateOrUpdateServiceStep, CreateRecreatedService,
    CreateServiceKeys, DeleteServicesStep, DetermineServiceActionsStep,
};

use crate::config::DeployerConfig;
use crate::diff::{DiffEngine, StateDiffEngine};
use std::sync::Arc;

/// Production diff engine for the given configuration
pub fn diff_engine(config: &DeployerConfig) -> Arc<dyn DiffEngine> {
    Arc::new(StateDiffEngine::new(
        config.services.platform_default_tags.clone(),
    ))
}
