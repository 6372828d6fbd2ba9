use super::{ignore_not_found, run_isolated, with_context, ExecutionReport};
use crate::diff::{ActionSet, ServiceAction, ServiceKeyChanges};
use crate::error::{DeployError, DeployResult};
use crate::logging::log_service_operation;
use crate::models::{ExistingServiceInstance, ServiceDeploymentUnit, ServiceKind, ServiceOperationType};
use crate::platform::PlatformClient;
use crate::state_machine::DeploymentFlags;
use std::sync::Arc;
use tracing::debug;

/// Everything needed to reconcile one service
#[derive(Debug, Clone)]
pub struct ServiceWork {
    pub unit: ServiceDeploymentUnit,
    pub actions: ActionSet,
    pub key_changes: ServiceKeyChanges,
    pub existing: Option<ExistingServiceInstance>,
}

pub struct ServiceActionExecutor {
    client: Arc<dyn PlatformClient>,
    flags: DeploymentFlags,
}

impl ServiceActionExecutor {
    pub fn new(client: Arc<dyn PlatformClient>, flags: DeploymentFlags) -> Self {
        Self { client, flags }
    }

    pub async fn execute_all(&self, work: &[ServiceWork]) -> ExecutionReport {
        run_isolated(work.iter().map(|service| self.execute(service))).await
    }

    /// Execute one service's actions in order
    pub async fn execute(&self, work: &ServiceWork) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let name = &work.unit.name;

        for action in work.actions.iter() {
            debug!(service = %name, action = %action, "Executing service action");
            if let Err(err) = self.execute_action(action, work, &mut report).await {
                Self::record_failure(&work.unit, err, &mut report);
                if !self.flags.keep_going {
                    break;
                }
            }
        }
        report
    }

    async fn execute_action(
        &self,
        action: ServiceAction,
        work: &ServiceWork,
        report: &mut ExecutionReport,
    ) -> DeployResult<()> {
        let unit = &work.unit;
        let name = unit.name.as_str();

        match action {
            ServiceAction::Create => {
                self.create(unit, report).await?;
            }
            ServiceAction::Recreate => {
                self.recreate(work, report).await?;
            }
            ServiceAction::UpdatePlan => {
                let plan = unit.plan.as_deref().unwrap_or_default();
                with_context(self.client.update_service_plan(name, plan).await, || {
                    format!("Error updating plan of service \"{name}\"")
                })?;
                self.record_async(unit, report, ServiceOperationType::Update);
            }
            ServiceAction::UpdateTags => {
                with_context(self.client.update_service_tags(name, &unit.tags).await, || {
                    format!("Error updating tags of service \"{name}\"")
                })?;
                self.record_async(unit, report, ServiceOperationType::Update);
            }
            ServiceAction::UpdateCredentials => {
                with_context(
                    self.client
                        .update_service_credentials(name, &unit.credentials)
                        .await,
                    || format!("Error updating parameters of service \"{name}\""),
                )?;
                self.record_async(unit, report, ServiceOperationType::Update);
            }
            ServiceAction::UpdateSyslogUrl => {
                with_context(
                    self.client
                        .update_service_syslog_url(name, unit.syslog_drain_url.as_deref())
                        .await,
                    || format!("Error updating syslog drain url of service \"{name}\""),
                )?;
            }
            ServiceAction::UpdateKeys => {
                self.update_keys(name, &work.key_changes, report).await?;
            }
        }
        log_service_operation(&action.to_string(), name, "executed", None);
        Ok(())
    }

    /// Delete the service with its bindings and keys, then create it again.
    ///
    /// A managed service is deleted asynchronously: the deletion is recorded as
    /// the in-flight operation and [`complete_recreation`](Self::complete_recreation)
    /// creates the service once it has been polled to completion.
    async fn recreate(&self, work: &ServiceWork, report: &mut ExecutionReport) -> DeployResult<()> {
        let unit = &work.unit;
        let name = unit.name.as_str();

        if let Some(existing) = &work.existing {
            if !existing.keys.is_empty() && !self.flags.delete_service_keys {
                report.warn(format!(
                    "Service \"{name}\" must be recreated but has service keys and deletion of service keys is not enabled; the service is not recreated"
                ));
                return Ok(());
            }
            self.remove_dependents(existing, true).await?;
        }
        with_context(self.client.delete_service(name).await, || {
            format!("Error deleting service \"{name}\" for recreation")
        })
        .or_else(ignore_not_found)?;

        let deletion_in_flight = work
            .existing
            .as_ref()
            .is_some_and(|existing| existing.kind == ServiceKind::Managed);
        if deletion_in_flight {
            debug!(service = %name, "Recreation continues once the deletion has finished");
            report.record_operation(name, ServiceOperationType::Delete);
            return Ok(());
        }
        self.create(unit, report).await
    }

    /// Create a service whose deletion for recreation has finished
    pub async fn complete_recreation(&self, unit: &ServiceDeploymentUnit) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        if let Err(err) = self.create(unit, &mut report).await {
            Self::record_failure(unit, err, &mut report);
        }
        report
    }

    /// Optional services only warn
    fn record_failure(unit: &ServiceDeploymentUnit, err: DeployError, report: &mut ExecutionReport) {
        if unit.optional {
            report.warn(format!(
                "Optional service \"{}\" could not be processed: {err}",
                unit.name
            ));
        } else {
            report.failures.push(err);
        }
    }

    async fn create(&self, unit: &ServiceDeploymentUnit, report: &mut ExecutionReport) -> DeployResult<()> {
        with_context(self.client.create_service(unit).await, || {
            format!("Error creating service \"{}\"", unit.name)
        })?;
        self.record_async(unit, report, ServiceOperationType::Create);
        Ok(())
    }

    /// Creates always happen; updates and deletions remove existing keys and
    /// only happen when deletion of service keys is enabled.
    async fn update_keys(
        &self,
        service: &str,
        changes: &ServiceKeyChanges,
        report: &mut ExecutionReport,
    ) -> DeployResult<()> {
        for key in &changes.to_create {
            with_context(self.client.create_service_key(service, key).await, || {
                format!("Error creating key \"{}\" of service \"{service}\"", key.name)
            })?;
        }

        if changes.requires_deletion() && !self.flags.delete_service_keys {
            for key in changes.to_update.iter().map(|k| k.name.as_str()) {
                report.warn(format!(
                    "Service key \"{key}\" of service \"{service}\" has changed but deletion of service keys is not enabled; the key is not updated"
                ));
            }
            for key in &changes.to_delete {
                report.warn(format!(
                    "Service key \"{key}\" of service \"{service}\" is no longer declared but deletion of service keys is not enabled; the key is kept"
                ));
            }
            return Ok(());
        }

        for key in &changes.to_delete {
            self.delete_key(service, key).await?;
        }
        for key in &changes.to_update {
            self.delete_key(service, &key.name).await?;
            with_context(self.client.create_service_key(service, key).await, || {
                format!("Error recreating key \"{}\" of service \"{service}\"", key.name)
            })?;
        }
        Ok(())
    }

    async fn delete_key(&self, service: &str, key: &str) -> DeployResult<()> {
        with_context(self.client.delete_service_key(service, key).await, || {
            format!("Error deleting key \"{key}\" of service \"{service}\"")
        })
        .or_else(ignore_not_found)
    }

    /// Unbind all applications and, if requested, delete the service's keys
    async fn remove_dependents(&self, existing: &ExistingServiceInstance, delete_keys: bool) -> DeployResult<()> {
        let name = existing.name.as_str();
        for binding in &existing.bindings {
            with_context(self.client.unbind_service(&binding.app_name, name).await, || {
                format!(
                    "Error unbinding application \"{}\" from service \"{name}\"",
                    binding.app_name
                )
            })
            .or_else(ignore_not_found)?;
        }
        if delete_keys {
            for key in &existing.keys {
                self.delete_key(name, &key.name).await?;
            }
        }
        Ok(())
    }

    pub async fn delete_services(&self, names: &[String]) -> ExecutionReport {
        run_isolated(names.iter().map(|name| self.delete_service(name))).await
    }

    /// Delete bindings before the service itself. A service that is already
    /// gone counts as deleted.
    pub async fn delete_service(&self, name: &str) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        if let Err(err) = self.try_delete_service(name, &mut report).await {
            report.failures.push(err);
        }
        report
    }

    async fn try_delete_service(&self, name: &str, report: &mut ExecutionReport) -> DeployResult<()> {
        let existing = with_context(self.client.get_service_instance(name).await, || {
            format!("Error retrieving service \"{name}\"")
        })?;
        let Some(existing) = existing else {
            debug!(service = %name, "Service already deleted");
            return Ok(());
        };

        if !existing.keys.is_empty() && !self.flags.delete_service_keys {
            report.warn(format!(
                "Service \"{name}\" has service keys and deletion of service keys is not enabled; the service is not deleted"
            ));
            return Ok(());
        }

        self.remove_dependents(&existing, true).await?;
        let deleted = with_context(self.client.delete_service(name).await, || {
            format!("Error deleting service \"{name}\"")
        });
        match deleted {
            Ok(()) => {
                if existing.kind == ServiceKind::Managed {
                    report.record_operation(name, ServiceOperationType::Delete);
                }
                log_service_operation("delete", name, "triggered", None);
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn record_async(
        &self,
        unit: &ServiceDeploymentUnit,
        report: &mut ExecutionReport,
        operation: ServiceOperationType,
    ) {
        if unit.kind == ServiceKind::Managed {
            report.record_operation(&unit.name, operation);
        }
    }
}
