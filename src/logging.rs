//! # Structured Logging Module
//!
//! Environment-aware structured logging plus domain helpers that keep health,
//! recovery and audit records consistent across components.

use chrono::Utc;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing_subscriber::{
    fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` overrides the environment default. `VIGIL_LOG_FORMAT=json`
/// switches the console output to JSON lines.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let json_output = std::env::var("VIGIL_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let filter = || {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
        };

        let console = if json_output {
            fmt_layer::layer()
                .with_target(true)
                .with_level(true)
                .json()
                .with_filter(filter())
                .boxed()
        } else {
            fmt_layer::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter())
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json_output,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("VIGIL_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log the outcome of one health check tick
pub fn log_health_check(
    status: &str,
    duration_ms: u64,
    memory_percent: f64,
    cpu_percent: f64,
    average_response_time_ms: f64,
    alert_count: usize,
) {
    if status == "healthy" {
        tracing::info!(
            status = %status,
            duration_ms = duration_ms,
            memory_percent = memory_percent,
            cpu_percent = cpu_percent,
            average_response_time_ms = average_response_time_ms,
            alert_count = alert_count,
            "🩺 HEALTH_CHECK"
        );
    } else {
        tracing::warn!(
            status = %status,
            duration_ms = duration_ms,
            memory_percent = memory_percent,
            cpu_percent = cpu_percent,
            average_response_time_ms = average_response_time_ms,
            alert_count = alert_count,
            "🩺 HEALTH_CHECK"
        );
    }
}

/// Log structured data for recovery operations
pub fn log_recovery_operation(
    operation: &str,
    failure_kind: &str,
    recovery_id: Option<uuid::Uuid>,
    success: Option<bool>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        failure_kind = %failure_kind,
        recovery_id = recovery_id.map(|id| id.to_string()).as_deref(),
        success = success,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔁 RECOVERY_OPERATION"
    );
}

/// A durable audit append failed; the caller carries on
pub fn log_audit_write_failure(path: &Path, error: &dyn fmt::Display) {
    tracing::error!(
        path = %path.display(),
        error = %error,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ AUDIT_WRITE_FAILED"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
    }
}
