//! # Deployment Process State
//!
//! Typed state transferred between steps. Everything a resumed step needs
//! (tokens, guids, start timestamps, pending operations) lives here, because the
//! next invocation may run on another machine after a crash-restart. The state
//! is persisted as a JSON blob; integer values survive the round trip as
//! integers.

use super::states::StepPhase;
use crate::config::DeployerConfig;
use crate::diff::ActionSet;
use crate::error::{DeployError, DeployResult};
use crate::logging::log_deployment_warning;
use crate::models::{
    ApplicationStateAction, CloudTarget, ConfigurationEntry, DeployedMta, ModuleDeploymentUnit,
    ServiceDeploymentUnit, ServiceOperationType, Subscriber,
};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Per-process switches chosen by the user at deploy time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentFlags {
    pub delete_services: bool,
    pub delete_service_keys: bool,
    pub fail_on_crashed: bool,
    pub no_fail_on_missing_permissions: bool,
    /// Continue with an entity's remaining actions after one of them fails
    pub keep_going: bool,
    pub skip_upload: bool,
}

impl DeploymentFlags {
    pub fn from_config(config: &DeployerConfig) -> Self {
        Self {
            delete_services: config.execution.delete_services,
            delete_service_keys: config.execution.delete_service_keys,
            fail_on_crashed: config.execution.fail_on_crashed,
            no_fail_on_missing_permissions: config.permissions.no_fail_on_missing_permissions,
            keep_going: config.execution.failsafe,
            skip_upload: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentProcessState {
    pub correlation_id: String,
    pub mta_id: String,
    pub mta_version: Option<Version>,
    pub user: String,
    pub target: Option<CloudTarget>,
    pub space_guid: String,
    pub flags: DeploymentFlags,

    pub current_step: Option<String>,
    pub step_phase: StepPhase,
    pub async_execution_index: usize,
    pub error_message: Option<String>,
    pub step_start_time: Option<DateTime<Utc>>,

    pub services_to_deploy: Vec<ServiceDeploymentUnit>,
    pub service_to_process: Option<ServiceDeploymentUnit>,
    pub service_actions: ActionSet,
    pub triggered_service_operations: BTreeMap<String, ServiceOperationType>,
    pub services_to_poll: BTreeSet<String>,
    pub services_to_delete: Vec<String>,

    pub apps_to_deploy: Vec<ModuleDeploymentUnit>,
    pub app_to_process: Option<ModuleDeploymentUnit>,
    pub app_state_actions: BTreeSet<ApplicationStateAction>,
    pub app_content_changed: bool,
    pub upload_token: Option<String>,
    pub upload_start_time: Option<DateTime<Utc>>,
    pub package_guid: Option<Uuid>,
    pub build_guid: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub logs_offset: Option<DateTime<Utc>>,
    pub service_brokers_to_delete: Vec<String>,

    pub deployed_mta: Option<DeployedMta>,
    pub entries_to_publish: Vec<ConfigurationEntry>,
    pub published_entries: Vec<ConfigurationEntry>,
    pub deleted_entries: Vec<ConfigurationEntry>,
    pub updated_subscribers: Vec<Subscriber>,

    /// User-facing warnings collected for progress reporting
    pub warnings: Vec<String>,
    /// Variables owned by the embedding orchestrator
    pub extensions: BTreeMap<String, Value>,
}

impl DeploymentProcessState {
    pub fn new(
        correlation_id: impl Into<String>,
        mta_id: impl Into<String>,
        user: impl Into<String>,
        target: CloudTarget,
        space_guid: impl Into<String>,
        flags: DeploymentFlags,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            mta_id: mta_id.into(),
            user: user.into(),
            target: Some(target),
            space_guid: space_guid.into(),
            flags,
            ..Default::default()
        }
    }

    pub fn to_bytes(&self) -> DeployResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> DeployResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reset per-step bookkeeping before a fresh (non-poll) execution
    pub fn begin_step(&mut self, step_name: &str) {
        self.current_step = Some(step_name.to_string());
        self.async_execution_index = 0;
        self.error_message = None;
        self.step_start_time = Some(Utc::now());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        log_deployment_warning(self.current_step.as_deref().unwrap_or("process"), &message);
        self.warnings.push(message);
    }

    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        for warning in warnings {
            self.add_warning(warning);
        }
    }

    /// The module the current (fan-out) step operates on
    pub fn require_app(&self) -> DeployResult<&ModuleDeploymentUnit> {
        self.app_to_process
            .as_ref()
            .ok_or_else(|| DeployError::configuration("No application selected for processing"))
    }

    /// The service the current (fan-out) step operates on
    pub fn require_service(&self) -> DeployResult<&ServiceDeploymentUnit> {
        self.service_to_process
            .as_ref()
            .ok_or_else(|| DeployError::configuration("No service selected for processing"))
    }

    pub fn require_target(&self) -> DeployResult<&CloudTarget> {
        self.target
            .as_ref()
            .ok_or_else(|| DeployError::configuration("Deployment target is not set"))
    }

    pub fn is_optional_service(&self, name: &str) -> bool {
        self.services_to_deploy
            .iter()
            .chain(self.service_to_process.iter())
            .any(|service| service.name == name && service.optional)
    }

    pub fn app_names_to_deploy(&self) -> BTreeSet<String> {
        self.apps_to_deploy.iter().map(|app| app.name.clone()).collect()
    }
}
