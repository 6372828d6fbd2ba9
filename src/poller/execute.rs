//! Log-watch polling for applications that run to completion.

use super::{AsyncExecution, AsyncOutcome};
use crate::constants::{APP_LOG_SOURCE_PREFIX, MARKER_TYPE_DELIMITER};
use crate::error::{DeployError, DeployResult};
use crate::logging::log_application_operation;
use crate::models::{ApplicationLog, ApplicationStateAction, MessageType};
use crate::state_machine::StepContext;
use async_trait::async_trait;

/// Substring to look for in log messages, optionally restricted to one
/// message type through a `STDOUT:` or `STDERR:` prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub message_type: Option<MessageType>,
    pub text: String,
}

impl Marker {
    pub fn parse(raw: &str) -> Self {
        if let Some((prefix, text)) = raw.split_once(MARKER_TYPE_DELIMITER) {
            if let Ok(message_type) = prefix.parse::<MessageType>() {
                return Self {
                    message_type: Some(message_type),
                    text: text.to_string(),
                };
            }
        }
        Self {
            message_type: None,
            text: raw.to_string(),
        }
    }

    pub fn matches(&self, log: &ApplicationLog) -> bool {
        self.message_type.map_or(true, |t| t == log.message_type) && log.message.contains(&self.text)
    }
}

fn is_application_log(log: &ApplicationLog) -> bool {
    log.source_name
        .to_ascii_uppercase()
        .starts_with(APP_LOG_SOURCE_PREFIX)
}

pub struct PollExecuteStatus;

#[async_trait]
impl AsyncExecution for PollExecuteStatus {
    fn name(&self) -> &'static str {
        "poll-execute-status"
    }

    async fn poll(&self, ctx: &mut StepContext) -> DeployResult<AsyncOutcome> {
        if !ctx.state.app_state_actions.contains(&ApplicationStateAction::Execute) {
            return Ok(AsyncOutcome::finished());
        }
        let app = ctx.state.require_app()?.clone();
        let success = Marker::parse(app.success_marker.as_deref().unwrap_or(&ctx.config.markers.success));
        let failure = Marker::parse(app.failure_marker.as_deref().unwrap_or(&ctx.config.markers.failure));

        let start_time = ctx.state.start_time;
        let offset = ctx.state.logs_offset;
        let logs = ctx
            .logs
            .recent_logs(&app.name, offset.or(start_time))
            .await
            .map_err(|e| {
                DeployError::platform(format!("Error reading logs of application \"{}\"", app.name), e)
            })?;

        let mut outcome = AsyncOutcome::running();
        let fresh = logs.iter().filter(|log| {
            is_application_log(log)
                && start_time.map_or(true, |start| log.timestamp >= start)
                && offset.map_or(true, |seen| log.timestamp > seen)
        });
        for log in fresh {
            if success.matches(log) {
                log_application_operation("execute", &app.name, "succeeded", Some(&log.message));
                outcome = AsyncOutcome::finished().with_message(log.message.clone());
                break;
            }
            if failure.matches(log) {
                outcome = AsyncOutcome::error(format!(
                    "Execution of application \"{}\" failed: {}",
                    app.name, log.message
                ));
                break;
            }
        }

        if let Some(newest) = logs.iter().map(|log| log.timestamp).max() {
            ctx.state.logs_offset = Some(offset.map_or(newest, |seen| seen.max(newest)));
        }

        if outcome.state.is_terminal() && app.stop_after_execution {
            ctx.platform.stop_application(&app.name).await.map_err(|e| {
                DeployError::platform(format!("Error stopping application \"{}\"", app.name), e)
            })?;
        }

        Ok(outcome)
    }

    fn polling_error_message(&self, ctx: &StepContext) -> String {
        format!(
            "Error executing application \"{}\"",
            ctx.state.app_to_process.as_ref().map_or("", |app| app.name.as_str())
        )
    }
}
