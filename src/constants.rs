//! # System Constants
//!
//! Fixed capacities, windows and scoring thresholds shared across components.

use std::time::Duration;

pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_LOG_ROTATION_INTERVAL_MS: u64 = 3_600_000;

// Ring buffer capacities
pub const RECOVERY_HISTORY_CAPACITY: usize = 50;
pub const AUDIT_EVENT_CAPACITY: usize = 1_000;
pub const RESPONSE_TIME_CAPACITY: usize = 1_000;
pub const ALERT_HISTORY_CAPACITY: usize = 100;

/// Durable audit log rotation size (10 MiB)
pub const AUDIT_LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Resource guard: shed load above this memory percent
pub const MEMORY_HARD_CEILING_PERCENT: f64 = 95.0;

/// A measured value at or above `threshold * factor` escalates an alert to critical
pub const CRITICAL_ESCALATION_FACTOR: f64 = 1.2;

pub mod audit {
    /// Trailing window for the login-failure risk factor (minutes)
    pub const RISK_FAILURE_WINDOW_MINUTES: i64 = 5;
    /// More than this many failures inside the risk window adds the factor
    pub const RISK_FAILURE_COUNT: usize = 3;

    /// Trailing window for brute-force detection (minutes)
    pub const BRUTE_FORCE_WINDOW_MINUTES: i64 = 10;
    /// Failures at or above this count inside the window trigger detection
    pub const BRUTE_FORCE_THRESHOLD: usize = 5;

    pub const RISK_CRITICAL_SCORE: u32 = 8;
    pub const RISK_HIGH_SCORE: u32 = 5;
    pub const RISK_MEDIUM_SCORE: u32 = 3;
    pub const RISK_LOW_SCORE: u32 = 1;

    /// Number of recent critical events kept in stats output
    pub const RECENT_CRITICAL_LIMIT: usize = 10;
    /// Number of top source ips kept in stats output
    pub const TOP_IP_LIMIT: usize = 10;
}

/// Recovery policy defaults: (max_attempts, delay between attempts)
pub mod recovery {
    use super::Duration;

    pub const STORE_MAX_ATTEMPTS: u32 = 3;
    pub const STORE_DELAY: Duration = Duration::from_secs(5);

    pub const MEMORY_MAX_ATTEMPTS: u32 = 2;
    pub const MEMORY_DELAY: Duration = Duration::from_secs(10);

    pub const CPU_MAX_ATTEMPTS: u32 = 1;
    pub const CPU_DELAY: Duration = Duration::from_secs(30);

    pub const NETWORK_MAX_ATTEMPTS: u32 = 3;
    pub const NETWORK_DELAY: Duration = Duration::from_secs(2);

    pub const HEALTH_CHECK_MAX_ATTEMPTS: u32 = 2;
    pub const HEALTH_CHECK_DELAY: Duration = Duration::from_secs(5);
}
