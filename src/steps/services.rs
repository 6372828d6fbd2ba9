//! Service steps: conflict check, reconciliation and deletion.

use crate::conflicts::ConflictDetector;
use crate::diff::{compute_service_key_changes, DiffEngine, ServiceAction, ServiceKeyChanges};
use crate::error::{DeployError, DeployResult};
use crate::executor::{ExecutionReport, ServiceActionExecutor, ServiceWork};
use crate::logging::log_service_operation;
use crate::models::ServiceOperationType;
use crate::poller::{AsyncExecution, AsyncOutcome, PollServiceOperations};
use crate::state_machine::{Step, StepContext, StepPhase};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fails the deployment when a resource about to be created belongs to
/// another MTA
pub struct CheckForCreationConflictsStep;

#[async_trait]
impl Step for CheckForCreationConflictsStep {
    fn name(&self) -> &'static str {
        "check-for-creation-conflicts"
    }

    #[instrument(skip_all, fields(process_id = %ctx.process_id))]
    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let detector = ConflictDetector::new(
            Arc::clone(&ctx.platform),
            ctx.config.conflicts.allow_unclaimed_foreign_resources,
        );
        let mta_id = ctx.state.mta_id.clone();
        let deployed_apps = ctx.state.app_names_to_deploy();

        let mut warnings = detector
            .check_services(&mta_id, &ctx.state.services_to_deploy, &deployed_apps)
            .await?;
        warnings.extend(
            detector
                .check_applications(&mta_id, &ctx.state.apps_to_deploy)
                .await?,
        );
        ctx.state.extend_warnings(warnings);
        Ok(StepPhase::Done)
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error checking for conflicting resources".to_string()
    }
}

/// Diff the selected service against the platform and store the actions
pub struct DetermineServiceActionsStep {
    diff: Arc<dyn DiffEngine>,
}

impl DetermineServiceActionsStep {
    pub fn new(diff: Arc<dyn DiffEngine>) -> Self {
        Self { diff }
    }
}

#[async_trait]
impl Step for DetermineServiceActionsStep {
    fn name(&self) -> &'static str {
        "determine-service-actions"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let service = ctx.state.require_service()?.clone();
        let existing = ctx
            .platform
            .get_service_instance(&service.name)
            .await
            .map_err(|e| {
                DeployError::platform(format!("Error retrieving service \"{}\"", service.name), e)
            })?;

        let diff = self.diff.service_actions(
            &service,
            existing.as_ref(),
            ctx.state.flags.delete_services,
        )?;
        log_service_operation(
            "determine-actions",
            &service.name,
            "computed",
            Some(&diff.actions.to_string()),
        );
        ctx.state.service_actions = diff.actions;
        ctx.state.extend_warnings(diff.warnings);
        Ok(StepPhase::Done)
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!(
            "Error determining actions for service \"{}\"",
            service_name(ctx)
        )
    }
}

/// Execute the stored actions of the selected service and wait for the
/// platform to finish them
pub struct CreateOrUpdateServiceStep;

#[async_trait]
impl Step for CreateOrUpdateServiceStep {
    fn name(&self) -> &'static str {
        "create-or-update-service"
    }

    #[instrument(skip_all, fields(process_id = %ctx.process_id))]
    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let unit = ctx.state.require_service()?.clone();
        let actions = ctx.state.service_actions.clone();
        if actions.is_empty() {
            debug!(service = %unit.name, "Service is up to date");
            return Ok(StepPhase::Done);
        }

        // Re-read instead of trusting the previous step's snapshot
        let existing = ctx
            .platform
            .get_service_instance(&unit.name)
            .await
            .map_err(|e| {
                DeployError::platform(format!("Error retrieving service \"{}\"", unit.name), e)
            })?;
        let key_changes = match (&existing, actions.contains(ServiceAction::UpdateKeys)) {
            (Some(existing), true) => compute_service_key_changes(&unit.service_keys, &existing.keys),
            _ => ServiceKeyChanges::default(),
        };

        let executor = ServiceActionExecutor::new(Arc::clone(&ctx.platform), ctx.state.flags.clone());
        let report = executor
            .execute(&ServiceWork {
                unit,
                actions,
                key_changes,
                existing,
            })
            .await;
        track_operations(ctx, report)
    }

    fn async_executions(&self) -> Vec<Box<dyn AsyncExecution>> {
        vec![
            Box::new(PollServiceOperations),
            Box::new(CreateRecreatedService),
            Box::new(PollServiceOperations),
            Box::new(CreateServiceKeys),
        ]
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!("Error creating or updating service \"{}\"", service_name(ctx))
    }
}

/// Creates a recreated service again once its deletion has finished
pub struct CreateRecreatedService;

#[async_trait]
impl AsyncExecution for CreateRecreatedService {
    fn name(&self) -> &'static str {
        "create-recreated-service"
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        let unit = ctx.state.require_service()?.clone();
        let awaited_deletion = ctx.state.service_actions.contains(ServiceAction::Recreate)
            && ctx.state.triggered_service_operations.get(&unit.name)
                == Some(&ServiceOperationType::Delete);
        if !awaited_deletion {
            return Ok(AsyncOutcome::finished());
        }

        let executor = ServiceActionExecutor::new(Arc::clone(&ctx.platform), ctx.state.flags.clone());
        let report = executor.complete_recreation(&unit).await;
        track_operations(ctx, report)?;
        Ok(AsyncOutcome::finished())
    }

    fn polling_error_message(&self, ctx: &StepContext) -> String {
        format!("Error recreating service \"{}\"", service_name(ctx))
    }
}

/// Creates the keys of a service once its asynchronous creation finished
pub struct CreateServiceKeys;

#[async_trait]
impl AsyncExecution for CreateServiceKeys {
    fn name(&self) -> &'static str {
        "create-service-keys"
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        let created = ctx.state.service_actions.contains(ServiceAction::Create)
            || ctx.state.service_actions.contains(ServiceAction::Recreate);
        let unit = ctx.state.require_service()?.clone();
        if !created || unit.service_keys.is_empty() {
            return Ok(AsyncOutcome::finished());
        }

        let existing = ctx
            .platform
            .get_service_instance(&unit.name)
            .await
            .map_err(|e| {
                DeployError::platform(format!("Error retrieving service \"{}\"", unit.name), e)
            })?;
        let Some(existing) = existing else {
            return Ok(AsyncOutcome::finished());
        };
        // An optional service whose creation failed was already reported
        if existing.last_operation_failed(ServiceOperationType::Create) {
            return Ok(AsyncOutcome::finished());
        }

        let missing = unit
            .service_keys
            .iter()
            .filter(|key| !existing.keys.iter().any(|k| k.name == key.name));
        for key in missing {
            ctx.platform
                .create_service_key(&unit.name, key)
                .await
                .map_err(|e| {
                    DeployError::platform(
                        format!("Error creating key \"{}\" of service \"{}\"", key.name, unit.name),
                        e,
                    )
                })?;
            log_service_operation("create-key", &unit.name, "created", Some(&key.name));
        }
        Ok(AsyncOutcome::finished())
    }

    fn polling_error_message(&self, ctx: &StepContext) -> String {
        format!("Error creating keys of service \"{}\"", service_name(ctx))
    }
}

/// Deletes the services the deployment no longer declares
pub struct DeleteServicesStep;

#[async_trait]
impl Step for DeleteServicesStep {
    fn name(&self) -> &'static str {
        "delete-services"
    }

    #[instrument(skip_all, fields(process_id = %ctx.process_id))]
    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        if ctx.state.services_to_delete.is_empty() {
            return Ok(StepPhase::Done);
        }
        let executor = ServiceActionExecutor::new(Arc::clone(&ctx.platform), ctx.state.flags.clone());
        let report = executor.delete_services(&ctx.state.services_to_delete).await;
        track_operations(ctx, report)
    }

    fn async_executions(&self) -> Vec<Box<dyn AsyncExecution>> {
        vec![Box::new(PollServiceOperations)]
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error deleting services".to_string()
    }
}

/// Record warnings and in-flight operations; poll when anything is in flight
fn track_operations(ctx: &mut StepContext, mut report: ExecutionReport) -> DeployResult<StepPhase> {
    ctx.state.extend_warnings(std::mem::take(&mut report.warnings));
    report.take_failures()?;

    ctx.state.services_to_poll = report.triggered_operations.keys().cloned().collect();
    ctx.state
        .triggered_service_operations
        .extend(report.triggered_operations);

    if ctx.state.services_to_poll.is_empty() {
        Ok(StepPhase::Done)
    } else {
        Ok(StepPhase::Poll)
    }
}

fn service_name(ctx: &StepContext) -> &str {
    ctx.state
        .service_to_process
        .as_ref()
        .map_or("", |service| service.name.as_str())
}
