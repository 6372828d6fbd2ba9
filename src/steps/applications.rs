//! Application steps: creation and attribute updates, upload, bindings, state
//! reconciliation, staging and start.

use crate::diff::{needs_restaging, ApplicationAttribute, DiffEngine};
use crate::error::{DeployError, DeployResult};
use crate::executor::{ApplicationServiceBinder, ApplicationStateExecutor};
use crate::logging::log_application_operation;
use crate::models::{ApplicationStartupState, ApplicationStateAction};
use crate::poller::{AsyncExecution, PollExecuteStatus, PollStagingStatus, PollStartStatus, PollUploadStatus};
use crate::state_machine::{Step, StepContext, StepPhase};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Creates the selected application or brings its attributes in line with
/// the module. Any change that affects the droplet marks the application
/// content as changed, so it is staged again.
pub struct CreateOrUpdateAppStep {
    diff: Arc<dyn DiffEngine>,
}

impl CreateOrUpdateAppStep {
    pub fn new(diff: Arc<dyn DiffEngine>) -> Self {
        Self { diff }
    }
}

#[async_trait]
impl Step for CreateOrUpdateAppStep {
    fn name(&self) -> &'static str {
        "create-or-update-app"
    }

    #[instrument(skip_all, fields(process_id = %ctx.process_id))]
    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let app = ctx.state.require_app()?.clone();
        ctx.state.app_content_changed = false;

        let existing = ctx.platform.get_application(&app.name).await.map_err(|e| {
            DeployError::platform(format!("Error retrieving application \"{}\"", app.name), e)
        })?;
        let Some(existing) = existing else {
            ctx.platform.create_application(&app).await.map_err(|e| {
                DeployError::platform(format!("Error creating application \"{}\"", app.name), e)
            })?;
            ctx.state.app_content_changed = true;
            log_application_operation("create", &app.name, "created", None);
            return Ok(StepPhase::Done);
        };

        let updates = self.diff.application_updates(&app, &existing);
        if updates.is_empty() {
            debug!(app = %app.name, "Application attributes are up to date");
            return Ok(StepPhase::Done);
        }

        if updates.iter().any(|attr| *attr != ApplicationAttribute::Env) {
            ctx.platform.update_application(&app).await.map_err(|e| {
                DeployError::platform(format!("Error updating application \"{}\"", app.name), e)
            })?;
        }
        if updates.contains(&ApplicationAttribute::Env) {
            let mut env = existing.env.clone();
            env.extend(app.env.clone());
            ctx.platform
                .update_application_env(&app.name, &env)
                .await
                .map_err(|e| {
                    DeployError::platform(
                        format!("Error updating environment of application \"{}\"", app.name),
                        e,
                    )
                })?;
        }
        ctx.state.app_content_changed = updates.iter().any(ApplicationAttribute::requires_restage);

        let changed: Vec<String> = updates.iter().map(ToString::to_string).collect();
        log_application_operation("update", &app.name, "updated", Some(&changed.join(", ")));
        Ok(StepPhase::Done)
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!("Error creating or updating application \"{}\"", app_name(ctx))
    }
}

/// Waits for the package upload the orchestrator started.
///
/// The upload token is placed in the process state before this step runs.
pub struct UploadAppStep;

#[async_trait]
impl Step for UploadAppStep {
    fn name(&self) -> &'static str {
        "upload-app"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let app = ctx.state.require_app()?.name.clone();
        if ctx.state.flags.skip_upload {
            debug!(app = %app, "Upload skipped");
            return Ok(StepPhase::Done);
        }
        if ctx.state.upload_token.is_none() {
            return Err(DeployError::configuration(format!(
                "No upload was started for application \"{app}\""
            )));
        }
        if ctx.state.upload_start_time.is_none() {
            ctx.state.upload_start_time = Some(Utc::now());
        }
        log_application_operation("upload", &app, "uploading", None);
        Ok(StepPhase::Poll)
    }

    fn async_executions(&self) -> Vec<Box<dyn AsyncExecution>> {
        vec![Box::new(PollUploadStatus)]
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!("Error uploading application \"{}\"", app_name(ctx))
    }
}

/// Binds the application to its services and injects requested service keys
/// into its environment
pub struct BindServicesStep;

#[async_trait]
impl Step for BindServicesStep {
    fn name(&self) -> &'static str {
        "bind-services"
    }

    #[instrument(skip_all, fields(process_id = %ctx.process_id))]
    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let app = ctx.state.require_app()?.clone();
        let existing = ctx.platform.get_application(&app.name).await.map_err(|e| {
            DeployError::platform(format!("Error retrieving application \"{}\"", app.name), e)
        })?;

        let binder = ApplicationServiceBinder::new(Arc::clone(&ctx.platform));
        let mut report = binder.bind_services(&app, existing.as_ref()).await;
        ctx.state.extend_warnings(std::mem::take(&mut report.warnings));
        report.take_failures()?;

        let key_env = binder.resolve_service_key_env(&app).await?;
        if key_env.is_empty() {
            return Ok(StepPhase::Done);
        }
        let current_env = existing.map(|existing| existing.env).unwrap_or_default();
        let mut env: BTreeMap<String, String> = current_env.clone();
        env.extend(app.env.clone());
        env.extend(key_env);
        if env != current_env {
            ctx.platform
                .update_application_env(&app.name, &env)
                .await
                .map_err(|e| {
                    DeployError::platform(
                        format!("Error updating environment of application \"{}\"", app.name),
                        e,
                    )
                })?;
            ctx.state.app_content_changed = true;
            log_application_operation("inject-service-keys", &app.name, "updated", None);
        }
        Ok(StepPhase::Done)
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!("Error binding services of application \"{}\"", app_name(ctx))
    }
}

/// Computes the STOP/STAGE/START/EXECUTE actions for the selected application
pub struct DetermineApplicationActionsStep {
    diff: Arc<dyn DiffEngine>,
}

impl DetermineApplicationActionsStep {
    pub fn new(diff: Arc<dyn DiffEngine>) -> Self {
        Self { diff }
    }
}

#[async_trait]
impl Step for DetermineApplicationActionsStep {
    fn name(&self) -> &'static str {
        "determine-application-actions"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let app = ctx.state.require_app()?.clone();
        let existing = ctx.platform.get_application(&app.name).await.map_err(|e| {
            DeployError::platform(format!("Error retrieving application \"{}\"", app.name), e)
        })?;

        let (current, staging_required) = match &existing {
            Some(existing) => {
                let builds = ctx.platform.list_builds(&app.name).await.map_err(|e| {
                    DeployError::platform(format!("Error retrieving builds of application \"{}\"", app.name), e)
                })?;
                (existing.startup_state(), needs_restaging(&builds))
            }
            None => (ApplicationStartupState::Stopped, true),
        };
        if staging_required {
            debug!(app = %app.name, "No successful build of the current package, staging again");
        }

        let actions = self.diff.application_actions(
            current,
            app.desired_state,
            ctx.state.app_content_changed,
            staging_required,
        );
        log_application_operation(
            "determine-actions",
            &app.name,
            &current.to_string(),
            Some(&format!("{actions:?}")),
        );
        ctx.state.app_state_actions = actions;
        Ok(StepPhase::Done)
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!("Error determining actions for application \"{}\"", app_name(ctx))
    }
}

/// Stops the application when required, then stages the uploaded package
pub struct StageAppStep;

#[async_trait]
impl Step for StageAppStep {
    fn name(&self) -> &'static str {
        "stage-app"
    }

    #[instrument(skip_all, fields(process_id = %ctx.process_id))]
    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let app = ctx.state.require_app()?.clone();
        let actions = ctx.state.app_state_actions.clone();
        let executor = ApplicationStateExecutor::new(Arc::clone(&ctx.platform));

        executor.stop_if_required(&app, &actions).await?;
        let build = executor
            .stage_if_required(&app, &actions, ctx.state.package_guid)
            .await?;
        ctx.state.build_guid = build;
        Ok(if build.is_some() {
            StepPhase::Poll
        } else {
            StepPhase::Done
        })
    }

    fn async_executions(&self) -> Vec<Box<dyn AsyncExecution>> {
        vec![Box::new(PollStagingStatus)]
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!("Error staging application \"{}\"", app_name(ctx))
    }
}

/// Starts the application and, for executed modules, watches its logs for
/// the success or failure marker
pub struct StartAppStep;

#[async_trait]
impl Step for StartAppStep {
    fn name(&self) -> &'static str {
        "start-app"
    }

    #[instrument(skip_all, fields(process_id = %ctx.process_id))]
    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let app = ctx.state.require_app()?.clone();
        let actions = ctx.state.app_state_actions.clone();
        let executor = ApplicationStateExecutor::new(Arc::clone(&ctx.platform));

        let started = executor.start_if_required(&app, &actions).await?;
        if !started && !actions.contains(&ApplicationStateAction::Execute) {
            return Ok(StepPhase::Done);
        }
        ctx.state.start_time = Some(Utc::now());
        ctx.state.logs_offset = None;
        Ok(StepPhase::Poll)
    }

    fn async_executions(&self) -> Vec<Box<dyn AsyncExecution>> {
        vec![Box::new(PollStartStatus), Box::new(PollExecuteStatus)]
    }

    fn error_message(&self, ctx: &StepContext) -> String {
        format!("Error starting application \"{}\"", app_name(ctx))
    }
}

fn app_name(ctx: &StepContext) -> &str {
    ctx.state
        .app_to_process
        .as_ref()
        .map_or("", |app| app.name.as_str())
}
