//! Layered configuration loading through the environment.

use mta_deployer::config::ConfigManager;
use std::io::Write;

/// Environment variables are process-wide, so every variant runs in this one test
#[test]
fn test_environment_overrides_file_and_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[execution]\nfailsafe = false\ndelete_services = true\n\n[markers]\nfailure = \"STDERR:BROKEN\""
    )
    .unwrap();

    std::env::set_var("MTA_DEPLOYER_CONFIG", file.path());
    std::env::set_var("MTA_DEPLOYER__EXECUTION__FAILSAFE", "true");
    std::env::set_var("MTA_DEPLOYER__PERMISSIONS__NO_FAIL_ON_MISSING_PERMISSIONS", "true");

    let loaded = ConfigManager::load();

    std::env::remove_var("MTA_DEPLOYER__EXECUTION__FAILSAFE");
    std::env::remove_var("MTA_DEPLOYER__PERMISSIONS__NO_FAIL_ON_MISSING_PERMISSIONS");

    let manager = loaded.unwrap();
    let config = manager.config();
    assert!(config.execution.failsafe);
    assert!(config.execution.delete_services);
    assert!(config.execution.fail_on_crashed);
    assert!(config.permissions.no_fail_on_missing_permissions);
    assert_eq!(config.markers.failure, "STDERR:BROKEN");
    assert_eq!(config.markers.success, "STDOUT:SUCCESS");
    assert_eq!(manager.source_file(), Some(file.path()));

    std::env::set_var("MTA_DEPLOYER_CONFIG", file.path().with_extension("missing"));
    let fallback = ConfigManager::load();
    std::env::remove_var("MTA_DEPLOYER_CONFIG");

    let fallback = fallback.unwrap();
    assert!(fallback.source_file().is_none());
    assert!(!fallback.config().execution.delete_services);
}
