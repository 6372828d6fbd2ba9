use super::{run_isolated, ExecutionReport};
use crate::error::DeployError;
use crate::logging::log_service_operation;
use crate::models::ServiceBrokerSpec;
use crate::platform::{PlatformClient, PlatformError};
use std::sync::Arc;

/// Creates, updates and deletes the service brokers modules register.
///
/// With `no_fail_on_missing_permissions`, a 403 from the platform is reported
/// as a warning for that broker and the remaining brokers are still processed.
pub struct ServiceBrokerSynchronizer {
    client: Arc<dyn PlatformClient>,
    no_fail_on_missing_permissions: bool,
}

impl ServiceBrokerSynchronizer {
    pub fn new(client: Arc<dyn PlatformClient>, no_fail_on_missing_permissions: bool) -> Self {
        Self {
            client,
            no_fail_on_missing_permissions,
        }
    }

    pub async fn create_or_update_all(&self, brokers: &[ServiceBrokerSpec]) -> ExecutionReport {
        run_isolated(brokers.iter().map(|broker| self.create_or_update(broker))).await
    }

    pub async fn create_or_update(&self, broker: &ServiceBrokerSpec) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let result = match self.client.get_service_broker(&broker.name).await {
            Ok(None) => self
                .client
                .create_service_broker(broker)
                .await
                .map(|()| "created"),
            Ok(Some(existing)) if existing != *broker => self
                .client
                .update_service_broker(broker)
                .await
                .map(|()| "updated"),
            Ok(Some(_)) => Ok("unchanged"),
            Err(e) => Err(e),
        };

        match result {
            Ok(status) => log_service_operation("broker", &broker.name, status, None),
            Err(e) => self.handle_failure(&mut report, "create or update", &broker.name, e),
        }
        report
    }

    pub async fn delete_all(&self, names: &[String]) -> ExecutionReport {
        run_isolated(names.iter().map(|name| self.delete(name))).await
    }

    pub async fn delete(&self, name: &str) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        match self.client.delete_service_broker(name).await {
            Ok(()) => log_service_operation("broker", name, "deleted", None),
            Err(e) if e.is_not_found() => {}
            Err(e) => self.handle_failure(&mut report, "delete", name, e),
        }
        report
    }

    fn handle_failure(
        &self,
        report: &mut ExecutionReport,
        operation: &str,
        name: &str,
        error: PlatformError,
    ) {
        if error.is_forbidden() {
            let message = format!(
                "Could not {operation} service broker \"{name}\" because of missing permissions"
            );
            if self.no_fail_on_missing_permissions {
                report.warn(message);
            } else {
                report.failures.push(DeployError::permission(message));
            }
            return;
        }
        report.failures.push(DeployError::platform(
            format!("Error trying to {operation} service broker \"{name}\""),
            error,
        ));
    }
}
