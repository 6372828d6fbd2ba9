//! # Platform Client Facade
//!
//! Narrow contracts the core needs from the remote application platform. The
//! HTTP client itself lives outside this crate; implementations adapt it to
//! these traits and classify failures into [`PlatformError`].

use crate::models::{
    ApplicationLog, Build, CloudTarget, ExistingApplication, ExistingServiceInstance, InstanceInfo,
    ModuleDeploymentUnit, ServiceBrokerSpec, ServiceDeploymentUnit, ServiceKey, UploadStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Classified failure of a platform call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Controller operation failed: {status} {description}")]
pub struct PlatformError {
    pub status: u16,
    pub description: String,
}

impl PlatformError {
    pub fn new(status: u16, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(404, description)
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self::new(403, description)
    }

    pub fn bad_gateway(description: impl Into<String>) -> Self {
        Self::new(502, description)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Operations against one (user, org, space) scope of the platform.
///
/// Lookups return `Ok(None)` for missing resources; mutations of missing
/// resources fail with a 404 [`PlatformError`].
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn get_application(&self, name: &str) -> PlatformResult<Option<ExistingApplication>>;

    async fn get_instances(&self, app: &str) -> PlatformResult<Vec<InstanceInfo>>;

    /// Create the application, stopped, with the module's attributes and
    /// environment
    async fn create_application(&self, app: &ModuleDeploymentUnit) -> PlatformResult<()>;

    /// Apply the module's instances, quotas, routes and staging attributes.
    /// The environment is updated separately.
    async fn update_application(&self, app: &ModuleDeploymentUnit) -> PlatformResult<()>;

    async fn update_application_env(
        &self,
        app: &str,
        env: &BTreeMap<String, String>,
    ) -> PlatformResult<()>;

    async fn stop_application(&self, app: &str) -> PlatformResult<()>;

    async fn start_application(&self, app: &str) -> PlatformResult<()>;

    async fn get_upload_status(&self, app: &str, upload_token: &str) -> PlatformResult<UploadStatus>;

    /// Start staging the package into a droplet
    async fn create_build(&self, app: &str, package_guid: Uuid) -> PlatformResult<Build>;

    async fn get_build(&self, build_guid: Uuid) -> PlatformResult<Build>;

    async fn list_builds(&self, app: &str) -> PlatformResult<Vec<Build>>;

    async fn get_service_instance(&self, name: &str)
        -> PlatformResult<Option<ExistingServiceInstance>>;

    /// Managed services are provisioned asynchronously; completion is observed
    /// through the instance's last operation.
    async fn create_service(&self, service: &ServiceDeploymentUnit) -> PlatformResult<()>;

    async fn update_service_plan(&self, service: &str, plan: &str) -> PlatformResult<()>;

    async fn update_service_tags(&self, service: &str, tags: &[String]) -> PlatformResult<()>;

    async fn update_service_credentials(&self, service: &str, credentials: &Value)
        -> PlatformResult<()>;

    async fn update_service_syslog_url(&self, service: &str, url: Option<&str>)
        -> PlatformResult<()>;

    async fn delete_service(&self, service: &str) -> PlatformResult<()>;

    async fn get_service_keys(&self, service: &str) -> PlatformResult<Vec<ServiceKey>>;

    async fn create_service_key(&self, service: &str, key: &ServiceKey) -> PlatformResult<()>;

    async fn delete_service_key(&self, service: &str, key: &str) -> PlatformResult<()>;

    async fn bind_service(
        &self,
        app: &str,
        service: &str,
        parameters: Option<&Value>,
    ) -> PlatformResult<()>;

    async fn unbind_service(&self, app: &str, service: &str) -> PlatformResult<()>;

    async fn get_service_broker(&self, name: &str) -> PlatformResult<Option<ServiceBrokerSpec>>;

    async fn create_service_broker(&self, broker: &ServiceBrokerSpec) -> PlatformResult<()>;

    async fn update_service_broker(&self, broker: &ServiceBrokerSpec) -> PlatformResult<()>;

    async fn delete_service_broker(&self, name: &str) -> PlatformResult<()>;
}

/// Hands out clients scoped to a user and target, for operations outside the
/// deploying space.
#[async_trait]
pub trait PlatformClientProvider: Send + Sync {
    async fn client_for(
        &self,
        user: &str,
        target: &CloudTarget,
    ) -> PlatformResult<Arc<dyn PlatformClient>>;

    /// Resolve a space guid to its organization and space names
    async fn resolve_space(&self, space_guid: &str) -> PlatformResult<Option<CloudTarget>>;
}

#[async_trait]
pub trait LogStreamReader: Send + Sync {
    /// Recent log lines of `app`, oldest first, not older than `since`
    async fn recent_logs(
        &self,
        app: &str,
        since: Option<DateTime<Utc>>,
    ) -> PlatformResult<Vec<ApplicationLog>>;
}
