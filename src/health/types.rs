//! # Health Status Types
//!
//! Shared types for the health monitoring subsystem: the per-tick Snapshot,
//! dependency probe results, alerts and the mutable alert thresholds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::constants::CRITICAL_ESCALATION_FACTOR;
use crate::error::{VigilError, VigilResult};
use crate::recovery::types::FailureKind;

// =============================================================================
// Status
// =============================================================================

/// Overall health status derived each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Error,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Dependency Probe Results
// =============================================================================

/// Dependencies checked on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Persistent store connection
    Store,
    /// HTTP self-reachability
    SelfReachability,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::SelfReachability => "self_reachability",
        }
    }

    /// Recovery category responsible for this dependency
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Store => FailureKind::Store,
            Self::SelfReachability => FailureKind::Network,
        }
    }
}

/// Outcome of a single dependency probe
///
/// - `Healthy`: probe succeeded
/// - `Degraded`: dependency answered but reports unhealthy (transitional
///   connection state, non-success HTTP status)
/// - `Error`: dependency unreachable, disconnected or the probe timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyState {
    Healthy,
    Degraded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub kind: DependencyKind,
    pub state: DependencyState,
    pub detail: Option<String>,
    pub duration_ms: u64,
}

impl DependencyCheck {
    pub fn healthy(kind: DependencyKind, duration_ms: u64) -> Self {
        Self {
            kind,
            state: DependencyState::Healthy,
            detail: None,
            duration_ms,
        }
    }

    pub fn degraded(kind: DependencyKind, detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            kind,
            state: DependencyState::Degraded,
            detail: Some(detail.into()),
            duration_ms,
        }
    }

    pub fn error(kind: DependencyKind, detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            kind,
            state: DependencyState::Error,
            detail: Some(detail.into()),
            duration_ms,
        }
    }
}

/// Results of all dependency probes for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub checks: Vec<DependencyCheck>,
}

impl DependencyReport {
    pub fn new(checks: Vec<DependencyCheck>) -> Self {
        Self { checks }
    }

    /// Status as a pure function of the probe results
    pub fn derive_status(&self) -> HealthStatus {
        if self
            .checks
            .iter()
            .any(|c| c.state == DependencyState::Error)
        {
            HealthStatus::Error
        } else if self
            .checks
            .iter()
            .any(|c| c.state == DependencyState::Degraded)
        {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    /// Dependencies currently in an error state
    pub fn failing(&self) -> impl Iterator<Item = &DependencyCheck> {
        self.checks
            .iter()
            .filter(|c| c.state == DependencyState::Error)
    }

    pub fn get(&self, kind: DependencyKind) -> Option<&DependencyCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used_mb: f64,
    pub total_mb: f64,
    pub percent: f64,
}

impl MemoryUsage {
    pub fn from_bytes(used: u64, total: u64) -> Self {
        let used_mb = used as f64 / (1024.0 * 1024.0);
        let total_mb = total as f64 / (1024.0 * 1024.0);
        let percent = if total == 0 {
            0.0
        } else {
            used as f64 / total as f64 * 100.0
        };
        Self {
            used_mb,
            total_mb,
            percent,
        }
    }

    /// Used/total as a 0.0..=1.0 ratio
    pub fn ratio(&self) -> f64 {
        self.percent / 100.0
    }
}

/// Point-in-time aggregate of process health, replaced wholesale each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    /// `(previous + latest) / 2` blend, not a windowed average
    pub average_response_time_ms: f64,
    pub memory: MemoryUsage,
    pub cpu_percent: f64,
    /// Request counts keyed by `"METHOD /path"`
    pub request_counters: HashMap<String, u64>,
    /// Response counts keyed by status code
    pub status_counters: HashMap<u16, u64>,
    pub dependencies: DependencyReport,
    pub last_check_duration_ms: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            status: HealthStatus::Healthy,
            uptime_seconds: 0,
            average_response_time_ms: 0.0,
            memory: MemoryUsage::default(),
            cpu_percent: 0.0,
            request_counters: HashMap::new(),
            status_counters: HashMap::new(),
            dependencies: DependencyReport::default(),
            last_check_duration_ms: 0,
        }
    }
}

/// Cheap response time smoothing: `(previous + latest) / 2`, fed with each
/// check's own duration.
pub fn blend_response_time(previous: f64, latest: f64) -> f64 {
    (previous + latest) / 2.0
}

// =============================================================================
// Alerts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Memory,
    Cpu,
    ResponseTime,
    ErrorRate,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::ResponseTime => "response_time",
            Self::ErrorRate => "error_rate",
        }
    }

    /// Recovery category invoked for a critical alert of this kind
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Memory => Some(FailureKind::Memory),
            Self::Cpu => Some(FailureKind::Cpu),
            Self::ResponseTime => Some(FailureKind::Network),
            Self::ErrorRate => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// Threshold breach, produced and logged each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    pub measured_value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Build an alert for a breach, escalating to critical at
    /// `threshold * CRITICAL_ESCALATION_FACTOR` (percentages capped at 100).
    pub fn for_breach(kind: AlertKind, measured_value: f64, threshold: f64) -> Self {
        let mut critical_at = threshold * CRITICAL_ESCALATION_FACTOR;
        if kind != AlertKind::ResponseTime {
            critical_at = critical_at.min(100.0);
        }
        let level = if measured_value >= critical_at {
            AlertLevel::Critical
        } else {
            AlertLevel::Warning
        };
        let unit = match kind {
            AlertKind::ResponseTime => "ms",
            _ => "%",
        };
        Self {
            kind,
            level,
            message: format!(
                "{} at {:.1}{unit} exceeds threshold {:.1}{unit}",
                kind.as_str(),
                measured_value,
                threshold
            ),
            measured_value,
            threshold,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Thresholds
// =============================================================================

/// Alert thresholds read by every tick, updated only by administrative calls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub memory_percent: f64,
    pub cpu_percent: f64,
    pub response_time_ms: f64,
    pub error_rate_percent: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            memory_percent: 80.0,
            cpu_percent: 80.0,
            response_time_ms: 1_000.0,
            error_rate_percent: 5.0,
        }
    }
}

/// Partial threshold update; absent keys keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdUpdate {
    #[serde(alias = "memory")]
    pub memory_percent: Option<f64>,
    #[serde(alias = "cpu")]
    pub cpu_percent: Option<f64>,
    #[serde(alias = "responseTime", alias = "response_time")]
    pub response_time_ms: Option<f64>,
    #[serde(alias = "errorRate", alias = "error_rate")]
    pub error_rate_percent: Option<f64>,
}

impl ThresholdUpdate {
    pub fn is_empty(&self) -> bool {
        self.memory_percent.is_none()
            && self.cpu_percent.is_none()
            && self.response_time_ms.is_none()
            && self.error_rate_percent.is_none()
    }
}

fn validate_percent(field: &str, value: f64) -> VigilResult<()> {
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(VigilError::validation(format!(
            "{field} must be within (0, 100], got {value}"
        )));
    }
    Ok(())
}

fn validate_positive(field: &str, value: f64) -> VigilResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(VigilError::validation(format!(
            "{field} must be a positive number, got {value}"
        )));
    }
    Ok(())
}

impl AlertThresholds {
    pub fn validate(&self) -> VigilResult<()> {
        validate_percent("memory_percent", self.memory_percent)?;
        validate_percent("cpu_percent", self.cpu_percent)?;
        validate_positive("response_time_ms", self.response_time_ms)?;
        validate_percent("error_rate_percent", self.error_rate_percent)?;
        Ok(())
    }

    /// Merge a partial update. Every supplied value is validated before any is
    /// applied; on rejection `self` is left untouched.
    pub fn merge(&mut self, update: &ThresholdUpdate) -> VigilResult<()> {
        if update.is_empty() {
            return Err(VigilError::validation("threshold update contains no values"));
        }

        let mut candidate = *self;
        if let Some(v) = update.memory_percent {
            candidate.memory_percent = v;
        }
        if let Some(v) = update.cpu_percent {
            candidate.cpu_percent = v;
        }
        if let Some(v) = update.response_time_ms {
            candidate.response_time_ms = v;
        }
        if let Some(v) = update.error_rate_percent {
            candidate.error_rate_percent = v;
        }
        candidate.validate()?;

        *self = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(kind: DependencyKind, state: DependencyState) -> DependencyCheck {
        DependencyCheck {
            kind,
            state,
            detail: None,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_status_derivation() {
        let healthy = DependencyReport::new(vec![
            check(DependencyKind::Store, DependencyState::Healthy),
            check(DependencyKind::SelfReachability, DependencyState::Healthy),
        ]);
        assert_eq!(healthy.derive_status(), HealthStatus::Healthy);

        let degraded = DependencyReport::new(vec![
            check(DependencyKind::Store, DependencyState::Degraded),
            check(DependencyKind::SelfReachability, DependencyState::Healthy),
        ]);
        assert_eq!(degraded.derive_status(), HealthStatus::Warning);

        let failing = DependencyReport::new(vec![
            check(DependencyKind::Store, DependencyState::Degraded),
            check(DependencyKind::SelfReachability, DependencyState::Error),
        ]);
        assert_eq!(failing.derive_status(), HealthStatus::Error);
        assert_eq!(failing.failing().count(), 1);
    }

    #[test]
    fn test_empty_report_is_healthy() {
        assert_eq!(
            DependencyReport::default().derive_status(),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn test_blend_is_pairwise_average() {
        // No warm-up special case: a fresh snapshot starts from zero
        assert_eq!(blend_response_time(0.0, 120.0), 60.0);
        assert_eq!(blend_response_time(100.0, 200.0), 150.0);
        // Older samples lose weight geometrically
        let blended = [400.0, 0.0, 0.0]
            .iter()
            .fold(0.0, |acc, v| blend_response_time(acc, *v));
        assert_eq!(blended, 50.0);
    }

    #[test]
    fn test_alert_level_escalation() {
        let warning = Alert::for_breach(AlertKind::Memory, 85.0, 80.0);
        assert_eq!(warning.level, AlertLevel::Warning);

        let critical = Alert::for_breach(AlertKind::Memory, 96.0, 80.0);
        assert_eq!(critical.level, AlertLevel::Critical);

        // 90 * 1.2 = 108, capped to 100
        let capped = Alert::for_breach(AlertKind::Cpu, 100.0, 90.0);
        assert_eq!(capped.level, AlertLevel::Critical);

        let slow = Alert::for_breach(AlertKind::ResponseTime, 1500.0, 1000.0);
        assert_eq!(slow.level, AlertLevel::Critical);
        assert!(slow.message.contains("ms"));
    }

    #[test]
    fn test_threshold_merge_applies_partial_update() {
        let mut thresholds = AlertThresholds::default();
        thresholds
            .merge(&ThresholdUpdate {
                memory_percent: Some(70.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(thresholds.memory_percent, 70.0);
        assert_eq!(thresholds.cpu_percent, 80.0);
    }

    #[test]
    fn test_threshold_merge_is_all_or_nothing() {
        let mut thresholds = AlertThresholds::default();
        let result = thresholds.merge(&ThresholdUpdate {
            memory_percent: Some(60.0),
            cpu_percent: Some(150.0),
            ..Default::default()
        });
        assert!(matches!(result, Err(VigilError::Validation(_))));
        assert_eq!(thresholds, AlertThresholds::default());
    }

    #[test]
    fn test_threshold_update_rejects_unknown_keys() {
        let parsed: Result<ThresholdUpdate, _> =
            serde_json::from_value(serde_json::json!({ "disk": 50.0 }));
        assert!(parsed.is_err());

        let aliased: ThresholdUpdate =
            serde_json::from_value(serde_json::json!({ "memory": 75.0, "responseTime": 800.0 }))
                .unwrap();
        assert_eq!(aliased.memory_percent, Some(75.0));
        assert_eq!(aliased.response_time_ms, Some(800.0));
    }

    #[test]
    fn test_empty_update_rejected() {
        let mut thresholds = AlertThresholds::default();
        assert!(thresholds.merge(&ThresholdUpdate::default()).is_err());
    }
}
