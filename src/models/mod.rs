//! # Deployment Models
//!
//! Value types for desired deployment units and the platform's view of
//! existing resources. Desired units are immutable once the descriptor has been
//! processed; existing views are snapshots read right before a reconciliation.

pub mod application;
pub mod configuration;
pub mod mta;
pub mod service;

pub use application::{
    AppState, ApplicationLog, ApplicationStartupState, ApplicationStateAction, Build, BuildState,
    ExistingApplication, HealthCheck, InstanceInfo, InstanceState, MessageType,
    ModuleDeploymentUnit, ServiceBindingRequest, ServiceKeyToInject, UploadState, UploadStatus,
};
pub use configuration::{
    CloudTarget, ConfigurationEntry, ConfigurationFilter, ConfigurationSubscription,
    ConfigurationTarget, Subscriber,
};
pub use mta::{DeployedMta, MtaMetadata};
pub use service::{
    ExistingServiceInstance, ServiceBinding, ServiceBrokerSpec, ServiceDeploymentUnit, ServiceKey,
    ServiceKind, ServiceOperation, ServiceOperationState, ServiceOperationType,
};
