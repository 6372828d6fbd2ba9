//! Application models: desired modules, existing applications and the status
//! views polled while an application is uploaded, staged and started.

use super::mta::MtaMetadata;
use super::service::ServiceBrokerSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// One application to be deployed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDeploymentUnit {
    pub name: String,
    pub memory_mb: Option<u64>,
    pub disk_mb: Option<u64>,
    pub instances: u32,
    pub command: Option<String>,
    pub uris: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub buildpack: Option<String>,
    pub docker_image: Option<String>,
    pub health_check: Option<HealthCheck>,
    pub service_bindings: Vec<ServiceBindingRequest>,
    pub service_keys_to_inject: Vec<ServiceKeyToInject>,
    pub desired_state: ApplicationStartupState,
    /// Stop the application once an execution marker has been observed
    pub stop_after_execution: bool,
    pub success_marker: Option<String>,
    pub failure_marker: Option<String>,
    pub service_broker: Option<ServiceBrokerSpec>,
}

impl ModuleDeploymentUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            memory_mb: None,
            disk_mb: None,
            instances: 1,
            command: None,
            uris: Vec::new(),
            env: BTreeMap::new(),
            buildpack: None,
            docker_image: None,
            health_check: None,
            service_bindings: Vec::new(),
            service_keys_to_inject: Vec::new(),
            desired_state: ApplicationStartupState::Started,
            stop_after_execution: false,
            success_marker: None,
            failure_marker: None,
            service_broker: None,
        }
    }

    pub fn with_instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }

    pub fn with_memory(mut self, memory_mb: u64) -> Self {
        self.memory_mb = Some(memory_mb);
        self
    }

    pub fn with_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uris = uris.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_desired_state(mut self, state: ApplicationStartupState) -> Self {
        self.desired_state = state;
        self
    }

    pub fn with_binding(mut self, binding: ServiceBindingRequest) -> Self {
        self.service_bindings.push(binding);
        self
    }

    pub fn with_service_key(mut self, key: ServiceKeyToInject) -> Self {
        self.service_keys_to_inject.push(key);
        self
    }

    pub fn with_service_broker(mut self, broker: ServiceBrokerSpec) -> Self {
        self.service_broker = Some(broker);
        self
    }

    pub fn with_markers(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_marker = Some(success.into());
        self.failure_marker = Some(failure.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub check_type: String,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u32>,
}

/// Desired binding of an application to a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBindingRequest {
    pub service: String,
    pub parameters: Option<serde_json::Value>,
    /// Bindings to optional services are skipped when the service is missing
    pub optional: bool,
}

impl ServiceBindingRequest {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            parameters: None,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// Credentials of a named service key exposed to the application's environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKeyToInject {
    pub env_var_name: String,
    pub service: String,
    pub key: String,
}

impl ServiceKeyToInject {
    pub fn new(
        env_var_name: impl Into<String>,
        service: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            env_var_name: env_var_name.into(),
            service: service.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    Started,
    Stopped,
}

/// The platform's current view of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingApplication {
    pub guid: Uuid,
    pub name: String,
    pub state: AppState,
    pub instances: u32,
    pub running_instances: u32,
    pub memory_mb: Option<u64>,
    pub disk_mb: Option<u64>,
    pub command: Option<String>,
    pub uris: Vec<String>,
    pub buildpack: Option<String>,
    pub docker_image: Option<String>,
    pub health_check: Option<HealthCheck>,
    pub env: BTreeMap<String, String>,
    pub package_guid: Option<Uuid>,
    pub bound_services: Vec<String>,
    pub mta_metadata: Option<MtaMetadata>,
    /// Services the owning MTA declared for this application
    pub mta_services: Vec<String>,
}

impl ExistingApplication {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            name: name.into(),
            state: AppState::Stopped,
            instances: 1,
            running_instances: 0,
            memory_mb: None,
            disk_mb: None,
            command: None,
            uris: Vec::new(),
            buildpack: None,
            docker_image: None,
            health_check: None,
            env: BTreeMap::new(),
            package_guid: None,
            bound_services: Vec::new(),
            mta_metadata: None,
            mta_services: Vec::new(),
        }
    }

    /// A freshly created, stopped application with the module's attributes
    pub fn from_unit(unit: &ModuleDeploymentUnit) -> Self {
        Self {
            instances: unit.instances,
            memory_mb: unit.memory_mb,
            disk_mb: unit.disk_mb,
            command: unit.command.clone(),
            uris: unit.uris.clone(),
            buildpack: unit.buildpack.clone(),
            docker_image: unit.docker_image.clone(),
            health_check: unit.health_check.clone(),
            env: unit.env.clone(),
            ..Self::new(unit.name.clone())
        }
    }

    /// Startup state as seen by the reconciliation: a started application
    /// whose running instances do not match the desired count is inconsistent.
    pub fn startup_state(&self) -> ApplicationStartupState {
        match self.state {
            AppState::Stopped => ApplicationStartupState::Stopped,
            AppState::Started if self.running_instances == self.instances => {
                ApplicationStartupState::Started
            }
            AppState::Started => ApplicationStartupState::Inconsistent,
        }
    }
}

/// Startup state of an application. `Executed` is only meaningful as a
/// desired state: the application runs to completion and is watched through
/// its logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStartupState {
    Started,
    Stopped,
    Inconsistent,
    Executed,
}

impl fmt::Display for ApplicationStartupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Inconsistent => write!(f, "INCONSISTENT"),
            Self::Executed => write!(f, "EXECUTED"),
        }
    }
}

/// Declaration order is execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStateAction {
    Stop,
    Stage,
    Start,
    Execute,
}

impl fmt::Display for ApplicationStateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "STOP"),
            Self::Stage => write!(f, "STAGE"),
            Self::Start => write!(f, "START"),
            Self::Execute => write!(f, "EXECUTE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Running,
    Starting,
    Crashed,
    Flapping,
    Down,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub index: u32,
    pub state: InstanceState,
}

impl InstanceInfo {
    pub fn new(index: u32, state: InstanceState) -> Self {
        Self { index, state }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Stdout,
    Stderr,
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STDOUT" => Ok(Self::Stdout),
            "STDERR" => Ok(Self::Stderr),
            _ => Err(format!("Invalid message type: {s}")),
        }
    }
}

/// One line of an application's recent log stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationLog {
    pub source_name: String,
    pub message: String,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildState {
    Pending,
    Staging,
    Staged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub guid: Uuid,
    pub state: BuildState,
    pub package_guid: Option<Uuid>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadState {
    AwaitingUpload,
    ProcessingUpload,
    Ready,
    Failed,
    Expired,
}

/// Status of an asynchronous application bits upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub state: UploadState,
    pub package_guid: Option<Uuid>,
    pub error: Option<String>,
}
