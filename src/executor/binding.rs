//! Service bindings and service-key injection for one application.

use super::{ignore_not_found, run_isolated, with_context, ExecutionReport};
use crate::error::{DeployError, DeployResult};
use crate::logging::log_application_operation;
use crate::models::{ExistingApplication, ModuleDeploymentUnit, ServiceBindingRequest};
use crate::platform::PlatformClient;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

pub struct ApplicationServiceBinder {
    client: Arc<dyn PlatformClient>,
}

impl ApplicationServiceBinder {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    /// Bind the desired services and unbind those no longer declared.
    ///
    /// A binding to a missing optional service is skipped without a call; a
    /// missing mandatory service is a binding error naming both ends.
    pub async fn bind_services(
        &self,
        app: &ModuleDeploymentUnit,
        existing: Option<&ExistingApplication>,
    ) -> ExecutionReport {
        let bound: BTreeSet<&str> = existing
            .map(|a| a.bound_services.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut report = run_isolated(
            app.service_bindings
                .iter()
                .filter(|request| !bound.contains(request.service.as_str()))
                .map(|request| self.bind(&app.name, request)),
        )
        .await;

        let desired: BTreeSet<&str> = app.service_bindings.iter().map(|b| b.service.as_str()).collect();
        let obsolete = bound.iter().filter(|service| !desired.contains(*service));
        let unbound = run_isolated(obsolete.map(|service| self.unbind(&app.name, service))).await;
        report.merge(unbound);
        report
    }

    async fn bind(&self, app: &str, request: &ServiceBindingRequest) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let service = request.service.as_str();

        let instance = match self.client.get_service_instance(service).await {
            Ok(instance) => instance,
            Err(e) => {
                report.failures.push(DeployError::binding(app, service, e.to_string()));
                return report;
            }
        };
        if instance.is_none() {
            if request.optional {
                debug!(app = %app, service = %service, "Optional service does not exist; binding skipped");
            } else {
                report
                    .failures
                    .push(DeployError::binding(app, service, "service does not exist"));
            }
            return report;
        }

        match self
            .client
            .bind_service(app, service, request.parameters.as_ref())
            .await
        {
            Ok(()) => log_application_operation("bind", app, "bound", Some(service)),
            Err(e) if request.optional => report.warn(format!(
                "Could not bind application \"{app}\" to optional service \"{service}\": {e}"
            )),
            Err(e) => report.failures.push(DeployError::binding(app, service, e.to_string())),
        }
        report
    }

    async fn unbind(&self, app: &str, service: &str) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let result = with_context(self.client.unbind_service(app, service).await, || {
            format!("Error unbinding application \"{app}\" from service \"{service}\"")
        })
        .or_else(ignore_not_found);
        if let Err(err) = result {
            report.failures.push(err);
        }
        report
    }

    /// Environment variables holding the credentials of the requested service
    /// keys. A requested key that does not exist is always fatal.
    pub async fn resolve_service_key_env(
        &self,
        app: &ModuleDeploymentUnit,
    ) -> DeployResult<BTreeMap<String, String>> {
        let mut env = BTreeMap::new();
        for request in &app.service_keys_to_inject {
            let keys = with_context(self.client.get_service_keys(&request.service).await, || {
                format!("Error retrieving keys of service \"{}\"", request.service)
            })
            .or_else(|err| if err.is_not_found() { Ok(Vec::new()) } else { Err(err) })?;

            let key = keys
                .iter()
                .find(|key| key.name == request.key)
                .ok_or_else(|| {
                    DeployError::service_key_not_found(&request.key, &request.service, &app.name)
                })?;
            env.insert(
                request.env_var_name.clone(),
                serde_json::to_string(&key.credentials)?,
            );
        }
        Ok(env)
    }
}
