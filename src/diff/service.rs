//! Service reconciliation rules.
//!
//! Priority order: a missing service (or one whose creation failed) is
//! created; a changed type is recreated; otherwise each independently
//! updatable attribute is compared and the changed ones are collected.

use super::{ActionSet, ServiceAction};
use crate::error::{DeployError, DeployResult};
use crate::models::{
    ExistingServiceInstance, ServiceDeploymentUnit, ServiceKey, ServiceKind, ServiceOperationType,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Result of reconciling one service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceDiff {
    pub actions: ActionSet,
    pub key_changes: ServiceKeyChanges,
    pub warnings: Vec<String>,
}

impl ServiceDiff {
    fn only(action: ServiceAction) -> Self {
        Self {
            actions: [action].into_iter().collect(),
            ..Default::default()
        }
    }
}

/// Key changes keyed by name. A same-named key with different parameters is
/// an update, executed as delete followed by create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceKeyChanges {
    pub to_create: Vec<ServiceKey>,
    pub to_update: Vec<ServiceKey>,
    pub to_delete: Vec<String>,
}

impl ServiceKeyChanges {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Updates and deletions remove existing keys
    pub fn requires_deletion(&self) -> bool {
        !self.to_update.is_empty() || !self.to_delete.is_empty()
    }
}

pub fn compute_service_key_changes(desired: &[ServiceKey], existing: &[ServiceKey]) -> ServiceKeyChanges {
    let mut changes = ServiceKeyChanges::default();

    for key in desired {
        match existing.iter().find(|candidate| candidate.name == key.name) {
            None => changes.to_create.push(key.clone()),
            Some(current) if current.parameters != key.parameters => {
                changes.to_update.push(key.clone())
            }
            Some(_) => {}
        }
    }

    changes.to_delete = existing
        .iter()
        .filter(|key| !desired.iter().any(|candidate| candidate.name == key.name))
        .map(|key| key.name.clone())
        .collect();

    changes
}

#[derive(Debug, Clone, Default)]
pub struct ServiceActionCalculator {
    platform_default_tags: BTreeSet<String>,
}

impl ServiceActionCalculator {
    pub fn new(platform_default_tags: Vec<String>) -> Self {
        Self {
            platform_default_tags: platform_default_tags.into_iter().collect(),
        }
    }

    pub fn compute(
        &self,
        desired: &ServiceDeploymentUnit,
        existing: Option<&ExistingServiceInstance>,
        delete_services: bool,
    ) -> DeployResult<ServiceDiff> {
        let Some(existing) = existing else {
            return Ok(ServiceDiff::only(ServiceAction::Create));
        };

        if existing.last_operation_failed(ServiceOperationType::Create) {
            debug!(service = %desired.name, "Creation of service failed previously; creating again");
            return Ok(ServiceDiff::only(ServiceAction::Create));
        }

        if type_changed(desired, existing) {
            if !delete_services {
                return Err(DeployError::configuration(format!(
                    "Service \"{}\" must be recreated because its type changed from \"{}\" to \"{}\", but deletion of services is not enabled",
                    desired.name,
                    existing.type_description(),
                    desired.type_description()
                )));
            }
            return Ok(ServiceDiff::only(ServiceAction::Recreate));
        }

        let mut diff = ServiceDiff::default();

        if existing.last_operation_failed(ServiceOperationType::Delete) {
            if delete_services {
                return Ok(ServiceDiff::only(ServiceAction::Recreate));
            }
            diff.warnings.push(format!(
                "Deletion of service \"{}\" failed previously; the service may not be operational",
                desired.name
            ));
        }

        if desired.kind == ServiceKind::Managed
            && desired.plan.is_some()
            && desired.plan != existing.plan
        {
            diff.actions.insert(ServiceAction::UpdatePlan);
        }

        if self.tags_changed(desired, existing) {
            diff.actions.insert(ServiceAction::UpdateTags);
        }

        if !desired.skip_parameters_update && !is_empty_parameters(&desired.credentials) {
            match &existing.credentials {
                Some(current) if *current != desired.credentials => {
                    diff.actions.insert(ServiceAction::UpdateCredentials);
                }
                Some(_) => {}
                None => diff.warnings.push(format!(
                    "Parameters of service \"{}\" could not be retrieved; skipping their update",
                    desired.name
                )),
            }
        }

        if desired.kind == ServiceKind::UserProvided
            && desired.syslog_drain_url != existing.syslog_drain_url
        {
            diff.actions.insert(ServiceAction::UpdateSyslogUrl);
        }

        if desired.kind == ServiceKind::Managed {
            let key_changes = compute_service_key_changes(&desired.service_keys, &existing.keys);
            if !key_changes.is_empty() {
                diff.actions.insert(ServiceAction::UpdateKeys);
                diff.key_changes = key_changes;
            }
        }

        debug!(service = %desired.name, actions = %diff.actions, "Computed service actions");
        Ok(diff)
    }

    /// Order-insensitive; platform default tags only count when desired
    /// mentions them.
    fn tags_changed(&self, desired: &ServiceDeploymentUnit, existing: &ExistingServiceInstance) -> bool {
        let desired_tags: BTreeSet<&str> = desired.tags.iter().map(String::as_str).collect();
        let existing_tags: BTreeSet<&str> = existing
            .tags
            .iter()
            .map(String::as_str)
            .filter(|tag| desired_tags.contains(tag) || !self.platform_default_tags.contains(*tag))
            .collect();
        desired_tags != existing_tags
    }
}

fn type_changed(desired: &ServiceDeploymentUnit, existing: &ExistingServiceInstance) -> bool {
    if desired.kind != existing.kind {
        return true;
    }
    desired.kind == ServiceKind::Managed && desired.label.is_some() && desired.label != existing.label
}

fn is_empty_parameters(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Actions for `desired` using a calculator without platform default tags
pub fn compute_service_actions(
    desired: &ServiceDeploymentUnit,
    existing: Option<&ExistingServiceInstance>,
    delete_services: bool,
) -> DeployResult<ActionSet> {
    ServiceActionCalculator::default()
        .compute(desired, existing, delete_services)
        .map(|diff| diff.actions)
}
