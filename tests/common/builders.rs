//! Builders for desired units, configuration entries and subscriptions.

#![allow(dead_code)]

use mta_deployer::models::{
    ConfigurationEntry, ConfigurationFilter, ConfigurationSubscription, ConfigurationTarget,
    ExistingServiceInstance, ServiceDeploymentUnit, ServiceKey,
};
use mta_deployer::test_helpers::{target, TEST_SPACE_GUID};
use semver::Version;
use serde_json::{json, Value};

pub const MTA_ID: &str = "com.example.shop";

pub fn postgres(name: &str, plan: &str) -> ServiceDeploymentUnit {
    ServiceDeploymentUnit::managed(name, "postgresql", plan)
}

pub fn key(name: &str, parameters: Value) -> ServiceKey {
    ServiceKey::new(name).with_parameters(parameters)
}

/// What the platform reports after `unit` has been created successfully
pub fn deployed(unit: &ServiceDeploymentUnit) -> ExistingServiceInstance {
    ExistingServiceInstance::from_unit(unit)
}

pub fn current_space() -> ConfigurationTarget {
    ConfigurationTarget::Space(target())
}

pub fn legacy_space() -> ConfigurationTarget {
    ConfigurationTarget::LegacySpaceId(TEST_SPACE_GUID.to_string())
}

pub fn entry(dependency: &str, version: &str, target: ConfigurationTarget) -> ConfigurationEntry {
    ConfigurationEntry::for_mta(
        MTA_ID,
        dependency,
        Some(Version::parse(version).expect("valid version")),
        target,
        json!({ "url": format!("https://{dependency}.example.com"), "version": version }),
    )
}

pub fn subscription(
    app: &str,
    target: ConfigurationTarget,
    dependency: &str,
    env_var: &str,
) -> ConfigurationSubscription {
    ConfigurationSubscription::new(
        "com.example.consumer",
        app,
        target,
        ConfigurationFilter::new().provider_id(format!("{MTA_ID}:{dependency}")),
        env_var,
    )
}
