//! Configuration Loader
//!
//! Layers defaults, an optional TOML file and environment overrides through the
//! `config` crate, then validates the merged result.

use super::error::{ConfigResult, ConfigurationError};
use super::DeployerConfig;
use crate::constants::env_vars;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "config/deployer.toml";

pub struct ConfigManager {
    config: DeployerConfig,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from the default locations and the environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = std::env::var(env_vars::CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let file = path.exists().then_some(path);
        Self::load_layers(file.as_deref(), true)
    }

    /// Load configuration from an explicit file, without environment overrides.
    /// A missing file is an error here, unlike [`ConfigManager::load`].
    pub fn load_from_file(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        if !path.exists() {
            return Err(ConfigurationError::file_not_found(path.display().to_string()));
        }
        Self::load_layers(Some(path), false)
    }

    /// Wrap an already built configuration
    pub fn from_config(config: DeployerConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source_file: None,
        }))
    }

    fn load_layers(file: Option<&Path>, with_environment: bool) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = Config::builder().add_source(Config::try_from(&DeployerConfig::default())?);

        if let Some(path) = file {
            debug!(path = %path.display(), "Loading deployer configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        if with_environment {
            builder = builder.add_source(
                Environment::with_prefix(env_vars::CONFIG_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: DeployerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            failsafe = config.execution.failsafe,
            fail_on_crashed = config.execution.fail_on_crashed,
            legacy_targets = config.subscriptions.support_legacy_targets,
            "Deployer configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            source_file: file.map(Path::to_path_buf),
        }))
    }

    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }
}
