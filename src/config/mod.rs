//! # Vigil Configuration System
//!
//! Typed configuration for every resilience component. Each section carries
//! serde defaults so a partial file (or none at all) yields a runnable setup.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vigil_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let interval = manager.config().monitoring.check_interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::health::types::AlertThresholds;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/vigil.toml`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,
    pub monitoring: MonitoringConfig,
    pub thresholds: AlertThresholds,
    pub recovery: RecoveryConfig,
    pub audit: AuditConfig,
    pub request_monitor: RequestMonitorConfig,
    pub admission: AdmissionConfig,
    pub web: WebConfig,
    pub store: StoreConfig,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            monitoring: MonitoringConfig::default(),
            thresholds: AlertThresholds::default(),
            recovery: RecoveryConfig::default(),
            audit: AuditConfig::default(),
            request_monitor: RequestMonitorConfig::default(),
            admission: AdmissionConfig::default(),
            web: WebConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl VigilConfig {
    /// Configuration suitable for unit and integration tests
    pub fn for_test() -> Self {
        Self {
            environment: "test".to_string(),
            ..Self::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Validate value ranges across all sections
    pub fn validate(&self) -> ConfigResult<()> {
        if self.monitoring.check_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "monitoring.check_interval_ms",
                "0",
                "must be greater than zero",
            ));
        }
        if self.monitoring.log_rotation_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "monitoring.log_rotation_interval_ms",
                "0",
                "must be greater than zero",
            ));
        }
        self.thresholds
            .validate()
            .map_err(|e| ConfigurationError::invalid_value("thresholds", "", e.to_string()))?;
        if self.recovery.history_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "recovery.history_capacity",
                "0",
                "must be greater than zero",
            ));
        }
        if !(0.0..=1.0).contains(&self.recovery.memory_target_ratio) {
            return Err(ConfigurationError::invalid_value(
                "recovery.memory_target_ratio",
                self.recovery.memory_target_ratio.to_string(),
                "must be between 0.0 and 1.0",
            ));
        }
        if self.audit.capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "audit.capacity",
                "0",
                "must be greater than zero",
            ));
        }
        if self.audit.max_file_bytes == 0 {
            return Err(ConfigurationError::invalid_value(
                "audit.max_file_bytes",
                "0",
                "must be greater than zero",
            ));
        }
        if self.request_monitor.response_time_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "request_monitor.response_time_capacity",
                "0",
                "must be greater than zero",
            ));
        }
        let ceiling = self.admission.memory_ceiling_percent;
        if !ceiling.is_finite() || ceiling <= 0.0 || ceiling > 100.0 {
            return Err(ConfigurationError::invalid_value(
                "admission.memory_ceiling_percent",
                ceiling.to_string(),
                "must be within (0, 100]",
            ));
        }
        Ok(())
    }
}

/// Health check scheduling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Interval between health check ticks (milliseconds)
    pub check_interval_ms: u64,
    /// Interval between audit log rotation checks (milliseconds)
    pub log_rotation_interval_ms: u64,
    /// Timeout for the store connectivity probe (milliseconds)
    pub store_probe_timeout_ms: u64,
    /// Start the checker as part of bootstrap
    pub auto_start: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: constants::DEFAULT_CHECK_INTERVAL_MS,
            log_rotation_interval_ms: constants::DEFAULT_LOG_ROTATION_INTERVAL_MS,
            store_probe_timeout_ms: 1_000,
            auto_start: true,
        }
    }
}

impl MonitoringConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn log_rotation_interval(&self) -> Duration {
        Duration::from_millis(self.log_rotation_interval_ms)
    }

    pub fn store_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.store_probe_timeout_ms)
    }
}

/// Bounded retry policy override for a single recovery strategy
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PolicyOverride {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

/// Automatic recovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Whether automatic recovery runs at all
    pub enabled: bool,
    /// Capacity of the recovery attempt ring
    pub history_capacity: usize,
    /// Local health endpoint used by the network reachability strategy
    pub self_probe_url: String,
    /// Bounded timeout for the self-probe (milliseconds)
    pub self_probe_timeout_ms: u64,
    /// Cool-down applied by the cpu pressure strategy (milliseconds)
    pub cpu_cooldown_ms: u64,
    /// Heap ratio below which memory recovery counts as successful
    pub memory_target_ratio: f64,
    pub store: Option<PolicyOverride>,
    pub memory: Option<PolicyOverride>,
    pub cpu: Option<PolicyOverride>,
    pub network: Option<PolicyOverride>,
    pub health_check: Option<PolicyOverride>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_capacity: constants::RECOVERY_HISTORY_CAPACITY,
            self_probe_url: "http://127.0.0.1:3000/health".to_string(),
            self_probe_timeout_ms: 5_000,
            cpu_cooldown_ms: 30_000,
            memory_target_ratio: 0.8,
            store: None,
            memory: None,
            cpu: None,
            network: None,
            health_check: None,
        }
    }
}

impl RecoveryConfig {
    pub fn self_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.self_probe_timeout_ms)
    }

    pub fn cpu_cooldown(&self) -> Duration {
        Duration::from_millis(self.cpu_cooldown_ms)
    }
}

/// Security audit log settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Durable JSON-lines log file
    pub log_path: PathBuf,
    /// Capacity of the in-memory event ring
    pub capacity: usize,
    /// Size above which the durable log is rotated
    pub max_file_bytes: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("log/audit.log"),
            capacity: constants::AUDIT_EVENT_CAPACITY,
            max_file_bytes: constants::AUDIT_LOG_MAX_BYTES,
        }
    }
}

/// Per-request instrumentation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestMonitorConfig {
    /// Capacity of the rolling response time list
    pub response_time_capacity: usize,
    /// Responses slower than this are logged in production (milliseconds)
    pub slow_request_ms: u64,
}

impl Default for RequestMonitorConfig {
    fn default() -> Self {
        Self {
            response_time_capacity: constants::RESPONSE_TIME_CAPACITY,
            slow_request_ms: 1_000,
        }
    }
}

/// Admission gate and resource guard settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Route prefixes the admission gate applies to
    pub gated_route_prefixes: Vec<String>,
    /// Memory percent above which the resource guard sheds load
    pub memory_ceiling_percent: f64,
    /// Routes the resource guard always lets through
    pub allow_list: Vec<String>,
    /// Retry-After hint on rejected requests (seconds)
    pub retry_after_seconds: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            gated_route_prefixes: vec!["/api".to_string()],
            memory_ceiling_percent: constants::MEMORY_HARD_CEILING_PERCENT,
            allow_list: vec![
                "/api/auth/login".to_string(),
                "/health".to_string(),
                "/metrics".to_string(),
            ],
            retry_after_seconds: 30,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
    /// Bearer token required on admin routes when set
    pub admin_token: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            admin_token: None,
        }
    }
}

/// Persistent store connectivity probe settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URL; no store probe is installed when absent
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = VigilConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitoring.check_interval(), Duration::from_secs(30));
        assert_eq!(config.recovery.history_capacity, 50);
        assert_eq!(config.audit.capacity, 1000);
        assert_eq!(config.audit.max_file_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = VigilConfig::default();
        config.monitoring.check_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("check_interval_ms"));
    }

    #[test]
    fn test_memory_ceiling_out_of_range_rejected() {
        let mut config = VigilConfig::default();
        config.admission.memory_ceiling_percent = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: VigilConfig = serde_json::from_value(serde_json::json!({
            "environment": "production",
            "monitoring": { "check_interval_ms": 5000 }
        }))
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.monitoring.check_interval_ms, 5000);
        assert_eq!(config.monitoring.log_rotation_interval_ms, 3_600_000);
        assert_eq!(config.thresholds.memory_percent, 80.0);
    }
}
