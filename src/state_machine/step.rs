//! Step contract and the context a step executes in.

use super::process_state::DeploymentProcessState;
use super::states::StepPhase;
use crate::config::DeployerConfig;
use crate::error::DeployResult;
use crate::platform::{LogStreamReader, PlatformClient, PlatformClientProvider};
use crate::poller::AsyncExecution;
use crate::subscriptions::ConfigurationStore;
use async_trait::async_trait;
use std::sync::Arc;

/// External collaborators shared by every step of a process
#[derive(Clone)]
pub struct Collaborators {
    /// Client scoped to the deploying user and space
    pub platform: Arc<dyn PlatformClient>,
    pub clients: Arc<dyn PlatformClientProvider>,
    pub logs: Arc<dyn LogStreamReader>,
    pub configuration_store: Arc<dyn ConfigurationStore>,
    pub config: Arc<DeployerConfig>,
}

/// Everything one step invocation may read or mutate
pub struct StepContext {
    pub process_id: String,
    pub state: DeploymentProcessState,
    pub platform: Arc<dyn PlatformClient>,
    pub clients: Arc<dyn PlatformClientProvider>,
    pub logs: Arc<dyn LogStreamReader>,
    pub configuration_store: Arc<dyn ConfigurationStore>,
    pub config: Arc<DeployerConfig>,
}

impl StepContext {
    pub fn new(
        process_id: impl Into<String>,
        state: DeploymentProcessState,
        collaborators: &Collaborators,
    ) -> Self {
        Self {
            process_id: process_id.into(),
            state,
            platform: Arc::clone(&collaborators.platform),
            clients: Arc::clone(&collaborators.clients),
            logs: Arc::clone(&collaborators.logs),
            configuration_store: Arc::clone(&collaborators.configuration_store),
            config: Arc::clone(&collaborators.config),
        }
    }
}

/// One resumable unit of a deployment process.
///
/// `execute` performs the step's side effects and returns [`StepPhase::Poll`]
/// when it started asynchronous work; subsequent invocations then run the
/// step's [`AsyncExecution`]s in order until all of them finished. A step keeps
/// no in-memory state between invocations.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut StepContext) -> DeployResult<StepPhase>;

    fn async_executions(&self) -> Vec<Box<dyn AsyncExecution>> {
        Vec::new()
    }

    /// Prefix for the message recorded when the step fails
    fn error_message(&self, ctx: &StepContext) -> String;
}
