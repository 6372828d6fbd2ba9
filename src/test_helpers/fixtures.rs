//! Fixture builders for process state, platform resources and step contexts.

use super::fake_platform::{FakeClientProvider, FakeLogReader, FakePlatform};
use crate::config::DeployerConfig;
use crate::models::{
    AppState, ApplicationLog, CloudTarget, ExistingApplication, ExistingServiceInstance,
    MessageType, MtaMetadata, ServiceDeploymentUnit,
};
use crate::state_machine::{Collaborators, DeploymentFlags, DeploymentProcessState, StepContext};
use crate::subscriptions::InMemoryConfigurationStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const TEST_USER: &str = "deployer";
pub const TEST_SPACE_GUID: &str = "5e1b3c8a-space-guid";

pub fn target() -> CloudTarget {
    CloudTarget::new("acme", "dev")
}

pub fn process_state(mta_id: &str) -> DeploymentProcessState {
    DeploymentProcessState::new(
        "corr-test",
        mta_id,
        TEST_USER,
        target(),
        TEST_SPACE_GUID,
        DeploymentFlags::default(),
    )
}

/// Existing application reporting `running` of `instances` instances
pub fn existing_app(name: &str, state: AppState, instances: u32, running: u32) -> ExistingApplication {
    let mut app = ExistingApplication::new(name);
    app.state = state;
    app.instances = instances;
    app.running_instances = running;
    app
}

/// Existing managed instance, optionally owned by an MTA
pub fn managed_instance(name: &str, label: &str, plan: &str, owner: Option<&str>) -> ExistingServiceInstance {
    let mut instance =
        ExistingServiceInstance::from_unit(&ServiceDeploymentUnit::managed(name, label, plan));
    instance.mta_metadata = owner.map(MtaMetadata::new);
    instance
}

pub fn app_log(source: &str, message: &str, message_type: MessageType, timestamp: DateTime<Utc>) -> ApplicationLog {
    ApplicationLog {
        source_name: source.to_string(),
        message: message.to_string(),
        message_type,
        timestamp,
    }
}

pub fn collaborators(platform: FakePlatform) -> Collaborators {
    TestEnvironment::with_platform(platform).collaborators()
}

pub fn context_for(platform: FakePlatform, state: DeploymentProcessState) -> StepContext {
    TestEnvironment::with_platform(platform).context(state)
}

/// Fakes for every collaborator of a step, kept accessible for assertions
pub struct TestEnvironment {
    pub platform: FakePlatform,
    pub clients: Arc<FakeClientProvider>,
    pub logs: Arc<FakeLogReader>,
    pub store: Arc<InMemoryConfigurationStore>,
    pub config: DeployerConfig,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_platform(FakePlatform::new())
    }

    pub fn with_platform(platform: FakePlatform) -> Self {
        Self {
            clients: Arc::new(FakeClientProvider::new().with_client(target(), platform.clone())),
            platform,
            logs: Arc::new(FakeLogReader::new()),
            store: Arc::new(InMemoryConfigurationStore::new()),
            config: DeployerConfig::default(),
        }
    }

    pub fn with_clients(mut self, clients: FakeClientProvider) -> Self {
        self.clients = Arc::new(clients);
        self
    }

    pub fn with_config(mut self, config: DeployerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            platform: Arc::new(self.platform.clone()),
            clients: self.clients.clone(),
            logs: self.logs.clone(),
            configuration_store: self.store.clone(),
            config: Arc::new(self.config.clone()),
        }
    }

    pub fn context(&self, state: DeploymentProcessState) -> StepContext {
        StepContext::new("process-test", state, &self.collaborators())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
