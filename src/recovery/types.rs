//! Recovery data types: failure categories, retry policies, attempt records and
//! aggregate statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{PolicyOverride, RecoveryConfig};
use crate::constants::recovery as defaults;
use crate::error::VigilError;

/// Closed set of recoverable failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Store,
    Memory,
    Cpu,
    Network,
    HealthCheck,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Store,
        FailureKind::Memory,
        FailureKind::Cpu,
        FailureKind::Network,
        FailureKind::HealthCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::Network => "network",
            Self::HealthCheck => "health_check",
        }
    }

    /// Built-in retry policy for this category
    pub fn default_policy(&self) -> RecoveryPolicy {
        let (max_attempts, delay) = match self {
            Self::Store => (defaults::STORE_MAX_ATTEMPTS, defaults::STORE_DELAY),
            Self::Memory => (defaults::MEMORY_MAX_ATTEMPTS, defaults::MEMORY_DELAY),
            Self::Cpu => (defaults::CPU_MAX_ATTEMPTS, defaults::CPU_DELAY),
            Self::Network => (defaults::NETWORK_MAX_ATTEMPTS, defaults::NETWORK_DELAY),
            Self::HealthCheck => (
                defaults::HEALTH_CHECK_MAX_ATTEMPTS,
                defaults::HEALTH_CHECK_DELAY,
            ),
        };
        RecoveryPolicy::new(max_attempts, delay)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store" | "database" => Ok(Self::Store),
            "memory" => Ok(Self::Memory),
            "cpu" => Ok(Self::Cpu),
            "network" => Ok(Self::Network),
            "health_check" | "healthCheck" => Ok(Self::HealthCheck),
            other => Err(VigilError::recovery(format!(
                "unknown failure type '{other}'"
            ))),
        }
    }
}

/// Bounded retry policy: up to `max_attempts`, waiting `delay * attempt_number`
/// after each failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    pub max_attempts: u32,
    #[serde(with = "duration_millis")]
    pub delay: Duration,
}

impl RecoveryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Wait applied after failed attempt `attempt_number` (1-based)
    pub fn backoff_for(&self, attempt_number: u32) -> Duration {
        self.delay.saturating_mul(attempt_number)
    }

    /// Policy for `kind`, honoring configured overrides
    pub fn resolve(kind: FailureKind, config: &RecoveryConfig) -> Self {
        let override_for: Option<&PolicyOverride> = match kind {
            FailureKind::Store => config.store.as_ref(),
            FailureKind::Memory => config.memory.as_ref(),
            FailureKind::Cpu => config.cpu.as_ref(),
            FailureKind::Network => config.network.as_ref(),
            FailureKind::HealthCheck => config.health_check.as_ref(),
        };
        match override_for {
            Some(o) => Self::new(o.max_attempts, Duration::from_millis(o.delay_ms)),
            None => kind.default_policy(),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Result returned by a strategy handler for one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StrategyOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One handler invocation inside a recovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub attempt_number: u32,
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
}

/// Aggregate of a full strategy execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryExecution {
    pub success: bool,
    pub attempts_used: u32,
    pub attempts: Vec<AttemptResult>,
}

impl RecoveryExecution {
    /// Message of the final attempt, used as the run's detail
    pub fn final_message(&self) -> String {
        self.attempts
            .last()
            .map(|a| a.message.clone())
            .unwrap_or_default()
    }
}

/// Finalized record of one recovery run, kept in the history ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub id: Uuid,
    pub failure_kind: FailureKind,
    pub strategy_name: String,
    /// Attempts used by this run
    pub attempt_number: u32,
    pub max_attempts: u32,
    pub success: bool,
    pub detail: String,
    /// Error that triggered the run
    pub trigger: String,
    pub context: serde_json::Value,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Read-only aggregation over the history ring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Percentage of successful runs, 0 when history is empty
    pub success_rate: f64,
    pub by_kind: HashMap<FailureKind, KindStats>,
    pub manual_interventions: u64,
    pub in_progress: bool,
    pub enabled: bool,
}

impl RecoveryStats {
    pub fn from_history<'a>(history: impl IntoIterator<Item = &'a RecoveryAttempt>) -> Self {
        let mut stats = Self::default();
        for attempt in history {
            stats.total += 1;
            let entry = stats.by_kind.entry(attempt.failure_kind).or_default();
            entry.attempts += 1;
            if attempt.success {
                stats.successful += 1;
                entry.successes += 1;
            } else {
                stats.failed += 1;
                entry.failures += 1;
            }
        }
        if stats.total > 0 {
            stats.success_rate = stats.successful as f64 / stats.total as f64 * 100.0;
        }
        stats
    }
}
