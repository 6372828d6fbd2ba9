//! # State Diff Engine
//!
//! Pure reconciliation of desired against existing resources. No I/O happens
//! here; callers read the platform state first and hand in snapshots.

pub mod application;
pub mod service;

use crate::error::DeployResult;
use crate::models::{
    ApplicationStartupState, ApplicationStateAction, ExistingApplication, ExistingServiceInstance,
    ModuleDeploymentUnit, ServiceDeploymentUnit,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub use application::{
    compute_application_actions, compute_application_updates, needs_restaging, ApplicationAttribute,
};
pub use service::{
    compute_service_actions, compute_service_key_changes, ServiceActionCalculator, ServiceDiff,
    ServiceKeyChanges,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceAction {
    Create,
    Recreate,
    UpdatePlan,
    UpdateTags,
    UpdateCredentials,
    UpdateSyslogUrl,
    UpdateKeys,
}

impl ServiceAction {
    /// Attributes replaced wholesale by a recreation
    fn is_subsumed_by_recreate(&self) -> bool {
        matches!(
            self,
            Self::UpdatePlan | Self::UpdateTags | Self::UpdateCredentials | Self::UpdateSyslogUrl
        )
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "CREATE",
            Self::Recreate => "RECREATE",
            Self::UpdatePlan => "UPDATE_PLAN",
            Self::UpdateTags => "UPDATE_TAGS",
            Self::UpdateCredentials => "UPDATE_CREDENTIALS",
            Self::UpdateSyslogUrl => "UPDATE_SYSLOG_URL",
            Self::UpdateKeys => "UPDATE_KEYS",
        };
        write!(f, "{name}")
    }
}

/// Ordered, deduplicated service actions. `Recreate` excludes the attribute
/// updates it subsumes, whichever was inserted first. Deserialized sets go
/// through the same insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ServiceAction>", into = "Vec<ServiceAction>")]
pub struct ActionSet {
    actions: BTreeSet<ServiceAction>,
}

impl ActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, action: ServiceAction) {
        if action == ServiceAction::Recreate {
            self.actions.retain(|existing| !existing.is_subsumed_by_recreate());
        } else if action.is_subsumed_by_recreate() && self.contains(ServiceAction::Recreate) {
            return;
        }
        self.actions.insert(action);
    }

    pub fn contains(&self, action: ServiceAction) -> bool {
        self.actions.contains(&action)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ServiceAction> + '_ {
        self.actions.iter().copied()
    }
}

impl FromIterator<ServiceAction> for ActionSet {
    fn from_iter<I: IntoIterator<Item = ServiceAction>>(iter: I) -> Self {
        let mut set = Self::new();
        for action in iter {
            set.insert(action);
        }
        set
    }
}

impl From<Vec<ServiceAction>> for ActionSet {
    fn from(actions: Vec<ServiceAction>) -> Self {
        actions.into_iter().collect()
    }
}

impl From<ActionSet> for Vec<ServiceAction> {
    fn from(set: ActionSet) -> Self {
        set.actions.into_iter().collect()
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|a| a.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Injection seam for steps; production wiring uses [`StateDiffEngine`]
pub trait DiffEngine: Send + Sync {
    fn service_actions(
        &self,
        desired: &ServiceDeploymentUnit,
        existing: Option<&ExistingServiceInstance>,
        delete_services: bool,
    ) -> DeployResult<ServiceDiff>;

    fn application_updates(
        &self,
        desired: &ModuleDeploymentUnit,
        existing: &ExistingApplication,
    ) -> BTreeSet<ApplicationAttribute>;

    fn application_actions(
        &self,
        current: ApplicationStartupState,
        desired: ApplicationStartupState,
        content_changed: bool,
        staging_required: bool,
    ) -> BTreeSet<ApplicationStateAction>;
}

#[derive(Debug, Clone, Default)]
pub struct StateDiffEngine {
    services: ServiceActionCalculator,
}

impl StateDiffEngine {
    pub fn new(platform_default_tags: Vec<String>) -> Self {
        Self {
            services: ServiceActionCalculator::new(platform_default_tags),
        }
    }
}

impl DiffEngine for StateDiffEngine {
    fn service_actions(
        &self,
        desired: &ServiceDeploymentUnit,
        existing: Option<&ExistingServiceInstance>,
        delete_services: bool,
    ) -> DeployResult<ServiceDiff> {
        self.services.compute(desired, existing, delete_services)
    }

    fn application_updates(
        &self,
        desired: &ModuleDeploymentUnit,
        existing: &ExistingApplication,
    ) -> BTreeSet<ApplicationAttribute> {
        compute_application_updates(desired, existing)
    }

    fn application_actions(
        &self,
        current: ApplicationStartupState,
        desired: ApplicationStartupState,
        content_changed: bool,
        staging_required: bool,
    ) -> BTreeSet<ApplicationStateAction> {
        compute_application_actions(current, desired, content_changed, staging_required)
    }
}
