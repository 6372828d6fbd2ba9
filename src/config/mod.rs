//! # Deployer Configuration
//!
//! Tunables for the step-execution core. Values are layered by
//! [`ConfigManager`]: built-in defaults, then an optional TOML file, then
//! `MTA_DEPLOYER__*` environment variables.
//!
//! ```rust,no_run
//! use mta_deployer::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let fail_on_crashed = manager.config().execution.fail_on_crashed;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{
    DEFAULT_FAILED_OPERATION_DESCRIPTION, DEFAULT_FAILURE_MARKER, DEFAULT_SUCCESS_MARKER,
};
use serde::{Deserialize, Serialize};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployerConfig {
    pub execution: ExecutionConfig,
    pub markers: MarkerConfig,
    pub services: ServicesConfig,
    pub conflicts: ConflictConfig,
    pub subscriptions: SubscriptionConfig,
    pub permissions: PermissionConfig,
    pub logging: LoggingConfig,
}

impl DeployerConfig {
    /// Reject values that would make steps misbehave at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        if self.markers.success.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "markers.success",
                "marker must not be empty",
            ));
        }
        if self.markers.failure.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "markers.failure",
                "marker must not be empty",
            ));
        }
        if self.markers.success == self.markers.failure {
            return Err(ConfigurationError::invalid_value(
                "markers",
                "success and failure markers must differ",
            ));
        }
        if let Some(level) = &self.logging.level {
            if tracing_subscriber::EnvFilter::try_new(level).is_err() {
                return Err(ConfigurationError::invalid_value(
                    "logging.level",
                    format!("'{level}' is not a valid filter directive"),
                ));
            }
        }
        Ok(())
    }
}

/// Step execution defaults, seeded into each new process
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Keep executing the remaining actions of an entity after one fails
    pub failsafe: bool,
    /// Treat crashed instances without any running instance as a start failure
    pub fail_on_crashed: bool,
    pub delete_services: bool,
    pub delete_service_keys: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            failsafe: false,
            fail_on_crashed: true,
            delete_services: false,
            delete_service_keys: false,
        }
    }
}

/// Log markers watched while an application executes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub success: String,
    pub failure: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            success: DEFAULT_SUCCESS_MARKER.to_string(),
            failure: DEFAULT_FAILURE_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Used when a failed service operation carries no description
    pub default_failed_operation_description: String,
    /// Tags the platform adds on its own; ignored when comparing tag sets
    pub platform_default_tags: Vec<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            default_failed_operation_description: DEFAULT_FAILED_OPERATION_DESCRIPTION.to_string(),
            platform_default_tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Proceed with a warning when a resource owned by another MTA is reused
    /// without being claimed by the deployed descriptor
    pub allow_unclaimed_foreign_resources: bool,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            allow_unclaimed_foreign_resources: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Also consult entries stored under the space-guid target encoding
    pub support_legacy_targets: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            support_legacy_targets: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PermissionConfig {
    /// Downgrade 403 responses of fan-out operations to warnings
    pub no_fail_on_missing_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to an environment-derived level
    pub level: Option<String>,
    pub json: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            json: false,
            ansi: true,
        }
    }
}
