use super::{AsyncExecution, AsyncOutcome};
use crate::error::{DeployError, DeployResult};
use crate::logging::log_application_operation;
use crate::models::UploadState;
use crate::state_machine::{AsyncExecutionState, StepContext};
use async_trait::async_trait;

pub fn classify_upload(state: UploadState) -> AsyncExecutionState {
    match state {
        UploadState::Ready => AsyncExecutionState::Finished,
        UploadState::AwaitingUpload | UploadState::ProcessingUpload => AsyncExecutionState::Running,
        UploadState::Failed | UploadState::Expired => AsyncExecutionState::Error,
    }
}

/// Waits for uploaded application bits to be processed into a package
pub struct PollUploadStatus;

#[async_trait]
impl AsyncExecution for PollUploadStatus {
    fn name(&self) -> &'static str {
        "poll-upload-status"
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        if ctx.state.flags.skip_upload {
            return Ok(AsyncOutcome::finished());
        }

        let app = ctx.state.require_app()?.name.clone();
        let token = ctx.state.upload_token.clone().ok_or_else(|| {
            DeployError::configuration(format!("No upload was started for application \"{app}\""))
        })?;

        let status = ctx
            .platform
            .get_upload_status(&app, &token)
            .await
            .map_err(|e| {
                DeployError::platform(format!("Error checking upload status of application \"{app}\""), e)
            })?;

        Ok(match classify_upload(status.state) {
            AsyncExecutionState::Finished => {
                ctx.state.package_guid = status.package_guid;
                ctx.state.app_content_changed = true;
                log_application_operation("upload", &app, "ready", None);
                AsyncOutcome::finished()
            }
            AsyncExecutionState::Running => AsyncOutcome::running(),
            AsyncExecutionState::Error => AsyncOutcome::error(format!(
                "Upload of application \"{app}\" failed: {}",
                status.error.unwrap_or_else(|| format!("{:?}", status.state))
            )),
        })
    }

    fn polling_error_message(&self, ctx: &StepContext) -> String {
        format!(
            "Error uploading application \"{}\"",
            ctx.state.app_to_process.as_ref().map_or("", |app| app.name.as_str())
        )
    }
}
