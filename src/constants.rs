//! # Deployment Constants
//!
//! Marker strings, identifiers and default messages shared across steps.

/// Log marker signalling successful completion of an executed application
pub const DEFAULT_SUCCESS_MARKER: &str = "STDOUT:SUCCESS";

/// Log marker signalling failed completion of an executed application
pub const DEFAULT_FAILURE_MARKER: &str = "STDERR:FAILURE";

/// Separates an optional message type from the marker text
pub const MARKER_TYPE_DELIMITER: char = ':';

/// Only log lines whose source starts with this prefix belong to the app itself
pub const APP_LOG_SOURCE_PREFIX: &str = "APP";

/// Provider namespace of configuration entries published by MTAs
pub const MTA_PROVIDER_NID: &str = "mta";

/// Joins MTA id and provided dependency name into a provider id
pub const PROVIDER_ID_DELIMITER: &str = ":";

/// Joins organization and space in the current target encoding
pub const TARGET_DELIMITER: &str = " ";

pub const DEFAULT_FAILED_OPERATION_DESCRIPTION: &str =
    "Operation failed without a description from the service broker";

pub mod env_vars {
    pub const DEPLOYER_ENV: &str = "MTA_DEPLOYER_ENV";
    pub const APP_ENV: &str = "APP_ENV";
    pub const CONFIG_PATH: &str = "MTA_DEPLOYER_CONFIG";
    pub const CONFIG_PREFIX: &str = "MTA_DEPLOYER";
}
