//! # Structured Logging Module
//!
//! Environment-aware structured logging for deployment processes. Step entry
//! points emit records through the helpers below so that every line carries the
//! process, step and entity it concerns.

use crate::config::LoggingConfig;
use crate::constants::env_vars;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific defaults
pub fn init_structured_logging() {
    init_structured_logging_with(&LoggingConfig::default());
}

/// Initialize structured logging from explicit settings.
///
/// `RUST_LOG` still takes precedence over the configured level. Calling this
/// more than once is harmless; only the first call installs a subscriber.
pub fn init_structured_logging_with(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment).to_string());

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(config.ansi)
                .boxed()
        };

        // A subscriber may already be installed by the embedding orchestrator
        if tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            level = %log_level,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var(env_vars::DEPLOYER_ENV)
        .or_else(|_| std::env::var(env_vars::APP_ENV))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log structured data for step executions
pub fn log_step_operation(
    operation: &str,
    process_id: Option<&str>,
    step_name: &str,
    phase: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        process_id = process_id,
        step = %step_name,
        phase = %phase,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔧 STEP_OPERATION"
    );
}

/// Log structured data for operations against a single service instance
pub fn log_service_operation(operation: &str, service: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        service = %service,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🗄️ SERVICE_OPERATION"
    );
}

/// Log structured data for operations against a single application
pub fn log_application_operation(operation: &str, app: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        app = %app,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 APPLICATION_OPERATION"
    );
}

/// Log a user-facing warning produced during reconciliation
pub fn log_deployment_warning(component: &str, message: &str) {
    tracing::warn!(
        component = %component,
        message = %message,
        timestamp = %Utc::now().to_rfc3339(),
        "⚠️ DEPLOYMENT_WARNING"
    );
}

/// Log error with structured context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
