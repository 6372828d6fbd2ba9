use super::{AsyncExecution, AsyncOutcome};
use crate::error::{DeployError, DeployResult};
use crate::logging::log_application_operation;
use crate::models::BuildState;
use crate::state_machine::{AsyncExecutionState, StepContext};
use async_trait::async_trait;

pub fn classify_build(state: BuildState) -> AsyncExecutionState {
    match state {
        BuildState::Staged => AsyncExecutionState::Finished,
        BuildState::Pending | BuildState::Staging => AsyncExecutionState::Running,
        BuildState::Failed => AsyncExecutionState::Error,
    }
}

pub struct PollStagingStatus;

#[async_trait]
impl AsyncExecution for PollStagingStatus {
    fn name(&self) -> &'static str {
        "poll-staging-status"
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        let app = ctx.state.require_app()?.name.clone();
        let Some(build_guid) = ctx.state.build_guid else {
            // Nothing was staged in this invocation of the step
            return Ok(AsyncOutcome::finished());
        };

        let build = ctx.platform.get_build(build_guid).await.map_err(|e| {
            DeployError::platform(format!("Error checking staging status of application \"{app}\""), e)
        })?;

        Ok(match classify_build(build.state) {
            AsyncExecutionState::Finished => {
                log_application_operation("stage", &app, "staged", None);
                AsyncOutcome::finished()
            }
            AsyncExecutionState::Running => AsyncOutcome::running(),
            AsyncExecutionState::Error => AsyncOutcome::error(format!(
                "Staging of application \"{app}\" failed: {}",
                build.error.as_deref().unwrap_or("no details reported")
            )),
        })
    }

    fn polling_error_message(&self, ctx: &StepContext) -> String {
        format!(
            "Error staging application \"{}\"",
            ctx.state.app_to_process.as_ref().map_or("", |app| app.name.as_str())
        )
    }
}
