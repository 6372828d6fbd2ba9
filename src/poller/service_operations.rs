use super::{AsyncExecution, AsyncOutcome};
use crate::error::{DeployError, DeployResult};
use crate::logging::log_service_operation;
use crate::models::{ExistingServiceInstance, ServiceOperationState, ServiceOperationType};
use crate::state_machine::StepContext;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOperationStatus {
    InProgress,
    Done,
    Failed(String),
}

/// Classify the last operation of a service whose `triggered` operation is
/// being awaited. A service missing after a deletion was deleted, possibly by
/// hand, and counts as done.
pub fn classify_service_operation(
    triggered: Option<ServiceOperationType>,
    instance: Option<&ExistingServiceInstance>,
    default_description: &str,
) -> ServiceOperationStatus {
    let Some(instance) = instance else {
        return match triggered {
            Some(ServiceOperationType::Delete) => ServiceOperationStatus::Done,
            _ => ServiceOperationStatus::Failed("service instance no longer exists".to_string()),
        };
    };
    let Some(operation) = &instance.last_operation else {
        return ServiceOperationStatus::Done;
    };

    match operation.state {
        ServiceOperationState::InProgress => ServiceOperationStatus::InProgress,
        ServiceOperationState::Succeeded => ServiceOperationStatus::Done,
        ServiceOperationState::Failed => ServiceOperationStatus::Failed(format!(
            "{} operation failed: {}",
            operation.operation_type,
            operation
                .description
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or(default_description)
        )),
    }
}

/// Waits for triggered create/update/delete operations of managed services
pub struct PollServiceOperations;

#[async_trait]
impl AsyncExecution for PollServiceOperations {
    fn name(&self) -> &'static str {
        "poll-service-operations"
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        let names: Vec<String> = ctx.state.services_to_poll.iter().cloned().collect();
        if names.is_empty() {
            return Ok(AsyncOutcome::finished());
        }

        let platform = Arc::clone(&ctx.platform);
        let results = join_all(names.iter().map(|name| platform.get_service_instance(name))).await;

        let mut remaining = BTreeSet::new();
        let mut failures = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            let instance = result.map_err(|e| {
                DeployError::platform(format!("Error polling last operation of service \"{name}\""), e)
            })?;
            let triggered = ctx.state.triggered_service_operations.get(&name).copied();

            match classify_service_operation(
                triggered,
                instance.as_ref(),
                &ctx.config.services.default_failed_operation_description,
            ) {
                ServiceOperationStatus::InProgress => {
                    remaining.insert(name);
                }
                ServiceOperationStatus::Done => {
                    log_service_operation("poll", &name, "done", None);
                }
                ServiceOperationStatus::Failed(reason) => {
                    let message = format!("Service \"{name}\": {reason}");
                    if ctx.state.is_optional_service(&name) {
                        ctx.state.add_warning(format!("{message} (service is optional)"));
                    } else {
                        failures.push(message);
                    }
                }
            }
        }

        ctx.state.services_to_poll = remaining;
        if !failures.is_empty() {
            return Ok(AsyncOutcome::error(failures.join("; ")));
        }
        if ctx.state.services_to_poll.is_empty() {
            Ok(AsyncOutcome::finished())
        } else {
            Ok(AsyncOutcome::running())
        }
    }

    fn polling_error_message(&self, _ctx: &StepContext) -> String {
        "Error waiting for service operations".to_string()
    }
}
