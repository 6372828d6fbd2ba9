//! Service broker steps.

use crate::error::DeployResult;
use crate::executor::ServiceBrokerSynchronizer;
use crate::models::ServiceBrokerSpec;
use crate::state_machine::{Step, StepContext, StepPhase};
use async_trait::async_trait;
use std::sync::Arc;

/// Registers the brokers declared by the deployed applications
pub struct CreateOrUpdateServiceBrokersStep;

#[async_trait]
impl Step for CreateOrUpdateServiceBrokersStep {
    fn name(&self) -> &'static str {
        "create-or-update-service-brokers"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        let brokers: Vec<ServiceBrokerSpec> = ctx
            .state
            .apps_to_deploy
            .iter()
            .filter_map(|app| app.service_broker.clone())
            .collect();
        if brokers.is_empty() {
            return Ok(StepPhase::Done);
        }

        let synchronizer = ServiceBrokerSynchronizer::new(
            Arc::clone(&ctx.platform),
            ctx.state.flags.no_fail_on_missing_permissions,
        );
        let mut report = synchronizer.create_or_update_all(&brokers).await;
        ctx.state.extend_warnings(std::mem::take(&mut report.warnings));
        report.take_failures()?;
        Ok(StepPhase::Done)
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error creating or updating service brokers".to_string()
    }
}

/// Removes brokers of the MTA that no application declares anymore
pub struct DeleteServiceBrokersStep;

#[async_trait]
impl Step for DeleteServiceBrokersStep {
    fn name(&self) -> &'static str {
        "delete-service-brokers"
    }

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase> {
        if ctx.state.service_brokers_to_delete.is_empty() {
            return Ok(StepPhase::Done);
        }
        let synchronizer = ServiceBrokerSynchronizer::new(
            Arc::clone(&ctx.platform),
            ctx.state.flags.no_fail_on_missing_permissions,
        );
        let mut report = synchronizer
            .delete_all(&ctx.state.service_brokers_to_delete)
            .await;
        ctx.state.extend_warnings(std::mem::take(&mut report.warnings));
        report.take_failures()?;
        Ok(StepPhase::Done)
    }

    fn error_message(&self, _ctx: &StepContext) -> String {
        "Error deleting service brokers".to_string()
    }
}
