use super::{AsyncExecution, AsyncOutcome};
use crate::error::{DeployError, DeployResult};
use crate::logging::log_application_operation;
use crate::models::{ApplicationStateAction, InstanceInfo, InstanceState};
use crate::state_machine::{AsyncExecutionState, StepContext};
use async_trait::async_trait;

/// Aggregate instance states into a start outcome.
///
/// All expected instances running finishes the start. Flapping instances fail
/// it unless others are still starting, and crashed instances without any
/// running one fail it when `fail_on_crashed` is set. Anything else is still
/// starting.
pub fn classify_start(
    instances: &[InstanceInfo],
    expected_instances: u32,
    fail_on_crashed: bool,
) -> AsyncExecutionState {
    let count = |state: InstanceState| instances.iter().filter(|i| i.state == state).count();
    let running = count(InstanceState::Running);

    if running >= expected_instances as usize && (running > 0 || expected_instances == 0) {
        return AsyncExecutionState::Finished;
    }
    if count(InstanceState::Flapping) > 0 && count(InstanceState::Starting) == 0 {
        return AsyncExecutionState::Error;
    }
    if fail_on_crashed && running == 0 && count(InstanceState::Crashed) > 0 {
        return AsyncExecutionState::Error;
    }
    AsyncExecutionState::Running
}

/// Waits until the started application's instances are running
pub struct PollStartStatus;

#[async_trait]
impl AsyncExecution for PollStartStatus {
    fn name(&self) -> &'static str {
        "poll-start-status"
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        if !ctx.state.app_state_actions.contains(&ApplicationStateAction::Start) {
            return Ok(AsyncOutcome::finished());
        }
        let app = ctx.state.require_app()?;
        let (name, expected) = (app.name.clone(), app.instances);

        let instances = ctx.platform.get_instances(&name).await.map_err(|e| {
            DeployError::platform(format!("Error checking instances of application \"{name}\""), e)
        })?;

        Ok(
            match classify_start(&instances, expected, ctx.state.flags.fail_on_crashed) {
                AsyncExecutionState::Finished => {
                    log_application_operation("start", &name, "started", None);
                    AsyncOutcome::finished()
                }
                AsyncExecutionState::Running => AsyncOutcome::running(),
                AsyncExecutionState::Error => {
                    let reason = if instances.iter().any(|i| i.state == InstanceState::Flapping) {
                        "some instances are flapping"
                    } else {
                        "all instances have crashed"
                    };
                    AsyncOutcome::error(format!("Application \"{name}\" failed to start: {reason}"))
                }
            },
        )
    }

    fn polling_error_message(&self, ctx: &StepContext) -> String {
        format!(
            "Error starting application \"{}\"",
            ctx.state.app_to_process.as_ref().map_or("", |app| app.name.as_str())
        )
    }
}
