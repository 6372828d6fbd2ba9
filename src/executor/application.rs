use super::with_context;
use crate::error::{DeployError, DeployResult};
use crate::logging::log_application_operation;
use crate::models::{ApplicationStateAction, ModuleDeploymentUnit};
use crate::platform::PlatformClient;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Performs the synchronous parts of application state actions. Steps call
/// these in STOP, STAGE, START order and poll in between.
pub struct ApplicationStateExecutor {
    client: Arc<dyn PlatformClient>,
}

impl ApplicationStateExecutor {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    pub async fn stop_if_required(
        &self,
        app: &ModuleDeploymentUnit,
        actions: &BTreeSet<ApplicationStateAction>,
    ) -> DeployResult<bool> {
        if !actions.contains(&ApplicationStateAction::Stop) {
            return Ok(false);
        }
        with_context(self.client.stop_application(&app.name).await, || {
            format!("Error stopping application \"{}\"", app.name)
        })?;
        log_application_operation("stop", &app.name, "stopped", None);
        Ok(true)
    }

    /// Start staging; returns the build to poll, if any
    pub async fn stage_if_required(
        &self,
        app: &ModuleDeploymentUnit,
        actions: &BTreeSet<ApplicationStateAction>,
        package_guid: Option<Uuid>,
    ) -> DeployResult<Option<Uuid>> {
        if !actions.contains(&ApplicationStateAction::Stage) {
            return Ok(None);
        }

        let package_guid = match package_guid {
            Some(guid) => guid,
            None => with_context(self.client.get_application(&app.name).await, || {
                format!("Error retrieving application \"{}\"", app.name)
            })?
            .and_then(|existing| existing.package_guid)
            .ok_or_else(|| {
                DeployError::configuration(format!(
                    "Application \"{}\" has no package to stage",
                    app.name
                ))
            })?,
        };

        let build = with_context(self.client.create_build(&app.name, package_guid).await, || {
            format!("Error staging application \"{}\"", app.name)
        })?;
        log_application_operation("stage", &app.name, "staging", Some(&build.guid.to_string()));
        Ok(Some(build.guid))
    }

    pub async fn start_if_required(
        &self,
        app: &ModuleDeploymentUnit,
        actions: &BTreeSet<ApplicationStateAction>,
    ) -> DeployResult<bool> {
        if !actions.contains(&ApplicationStateAction::Start) {
            return Ok(false);
        }
        with_context(self.client.start_application(&app.name).await, || {
            format!("Error starting application \"{}\"", app.name)
        })?;
        log_application_operation("start", &app.name, "starting", None);
        Ok(true)
    }
}
