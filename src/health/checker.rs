//! # Health Checker
//!
//! Periodic orchestrator for the health subsystem. Every tick it reads the
//! metrics source, runs the dependency probes, replaces the cached
//! [`Snapshot`], evaluates alert thresholds and hands failures to the
//! [`RecoveryOrchestrator`].
//!
//! ## Lifecycle
//!
//! ```ignore
//! let checker = Arc::new(HealthChecker::new(config, thresholds, metrics, probes, recovery));
//! checker.start();      // spawns the tick and the log rotation timers
//! checker.start();      // no-op, logged
//! checker.stop().await; // cancels both timers, lets a running tick finish
//! ```
//!
//! A failing tick never ends the loop: the error is contained, the snapshot is
//! forced to `error` and a `health_check` recovery is requested.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::alerts::{evaluate_thresholds, AlertHistory};
use super::metrics_source::MetricsSource;
use super::probes::DependencyProbes;
use super::snapshot_cache::SnapshotCache;
use super::types::{
    blend_response_time, Alert, AlertLevel, AlertThresholds, HealthStatus, Snapshot,
    ThresholdUpdate,
};
use crate::audit::AuditLog;
use crate::config::MonitoringConfig;
use crate::constants;
use crate::error::{VigilError, VigilResult};
use crate::logging::log_health_check;
use crate::monitor::RequestMonitor;
use crate::recovery::{BackgroundThrottle, FailureKind, RecoveryOrchestrator};
use crate::utils::ScheduledTask;

/// Current snapshot plus run-state flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringMetrics {
    pub snapshot: Snapshot,
    pub is_running: bool,
    /// Recoveries requested by the checker since start-up
    pub retry_attempts: u64,
    /// Ticks that failed before producing a snapshot
    pub error_count: u64,
    pub check_interval_ms: u64,
}

struct Timers {
    tick: ScheduledTask,
    rotation: ScheduledTask,
}

pub struct HealthChecker {
    config: MonitoringConfig,
    metrics: Arc<dyn MetricsSource>,
    probes: DependencyProbes,
    recovery: Arc<RecoveryOrchestrator>,
    audit: Option<Arc<AuditLog>>,
    requests: Option<Arc<RequestMonitor>>,
    throttle: BackgroundThrottle,
    cache: SnapshotCache,
    thresholds: RwLock<AlertThresholds>,
    alerts: AlertHistory,
    timers: Mutex<Option<Timers>>,
    error_count: AtomicU64,
    retry_attempts: AtomicU64,
    started_at: Instant,
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("check_interval_ms", &self.config.check_interval_ms)
            .field("is_running", &self.is_running())
            .field("has_audit_log", &self.audit.is_some())
            .field("has_request_monitor", &self.requests.is_some())
            .finish()
    }
}

impl HealthChecker {
    pub fn new(
        config: MonitoringConfig,
        thresholds: AlertThresholds,
        metrics: Arc<dyn MetricsSource>,
        probes: DependencyProbes,
        recovery: Arc<RecoveryOrchestrator>,
    ) -> Self {
        Self {
            config,
            metrics,
            probes,
            recovery,
            audit: None,
            requests: None,
            throttle: BackgroundThrottle::new(),
            cache: SnapshotCache::new(),
            thresholds: RwLock::new(thresholds),
            alerts: AlertHistory::new(constants::ALERT_HISTORY_CAPACITY),
            timers: Mutex::new(None),
            error_count: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Audit log rotated by the hourly timer
    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Source of response times, request counters and the error rate
    pub fn with_request_monitor(mut self, requests: Arc<RequestMonitor>) -> Self {
        self.requests = Some(requests);
        self
    }

    /// Share the throttle the cpu strategy pauses
    pub fn with_throttle(mut self, throttle: BackgroundThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Cache handle for request-path readers
    pub fn snapshot_cache(&self) -> SnapshotCache {
        self.cache.clone()
    }

    pub fn is_running(&self) -> bool {
        self.timers.lock().is_some()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawn the tick and log rotation timers. A second call while running is
    /// a logged no-op.
    pub fn start(self: &Arc<Self>) {
        let mut timers = self.timers.lock();
        if timers.is_some() {
            warn!("Health checker already running, ignoring start request");
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let tick = ScheduledTask::spawn(
            "health_check",
            self.config.check_interval(),
            true,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(checker) = weak.upgrade() {
                        checker.tick().await;
                    }
                }
            },
        );

        let weak: Weak<Self> = Arc::downgrade(self);
        let rotation = ScheduledTask::spawn(
            "audit_log_rotation",
            self.config.log_rotation_interval(),
            false,
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(checker) = weak.upgrade() {
                        checker.rotate_audit_log().await;
                    }
                }
            },
        );

        *timers = Some(Timers { tick, rotation });
        info!(
            check_interval_ms = self.config.check_interval_ms,
            log_rotation_interval_ms = self.config.log_rotation_interval_ms,
            "🩺 Health checker started"
        );
    }

    /// Cancel both timers. An in-flight tick (and any recovery it started)
    /// runs to completion. Safe to call repeatedly.
    pub async fn stop(&self) {
        let timers = self.timers.lock().take();
        let Some(timers) = timers else {
            debug!("Health checker not running, nothing to stop");
            return;
        };

        timers.tick.cancel().await;
        timers.rotation.cancel().await;
        info!("🛑 Health checker stopped");
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Run one health check cycle
    pub async fn tick(&self) {
        if let Err(e) = self.run_check().await {
            self.handle_check_failure(e).await;
        }
    }

    async fn run_check(&self) -> VigilResult<()> {
        let started = Instant::now();

        // 1. Runtime metrics
        let runtime = self.metrics.sample()?;

        // 2. Dependency probes
        let dependencies = self.probes.run().await;

        // 3. Own duration
        let duration_ms = started.elapsed().as_millis() as u64;

        // 4. Rebuild the snapshot
        let previous = self.cache.get().await;
        let average_response_time_ms =
            blend_response_time(previous.average_response_time_ms, duration_ms as f64);
        let (request_counters, status_counters) = match &self.requests {
            Some(requests) => (requests.request_counters(), requests.status_counters()),
            None => Default::default(),
        };

        let snapshot = Snapshot {
            timestamp: chrono::Utc::now(),
            status: dependencies.derive_status(),
            uptime_seconds: runtime.uptime.as_secs(),
            average_response_time_ms,
            memory: runtime.memory,
            cpu_percent: runtime.cpu_percent,
            request_counters,
            status_counters,
            dependencies,
            last_check_duration_ms: duration_ms,
        };
        self.cache.replace(snapshot.clone()).await;

        // 5. Thresholds
        let thresholds = *self.thresholds.read();
        let aggregates = self.requests.as_ref().map(|r| r.aggregates());
        let alerts = evaluate_thresholds(&snapshot, &thresholds, aggregates);
        for alert in &alerts {
            self.handle_alert(alert).await;
        }

        // Failing dependencies are handed to their recovery strategy
        for check in snapshot.dependencies.failing() {
            let kind = check.kind.failure_kind();
            let detail = check.detail.clone().unwrap_or_default();
            self.request_recovery(
                kind,
                &format!("{} probe failed: {detail}", check.kind.as_str()),
                json!({ "dependency": check }),
            )
            .await;
        }

        // 6. Outcome
        log_health_check(
            snapshot.status.as_str(),
            duration_ms,
            snapshot.memory.percent,
            snapshot.cpu_percent,
            snapshot.average_response_time_ms,
            alerts.len(),
        );
        Ok(())
    }

    async fn handle_check_failure(&self, e: VigilError) {
        let errors = self.error_count.fetch_add(1, Ordering::SeqCst) + 1;
        error!(error = %e, error_count = errors, "Health check failed");

        let mut snapshot = self.cache.get().await;
        snapshot.status = HealthStatus::Error;
        snapshot.timestamp = chrono::Utc::now();
        self.cache.replace(snapshot).await;

        self.request_recovery(
            FailureKind::HealthCheck,
            &e.to_string(),
            json!({ "error_count": errors }),
        )
        .await;
    }

    /// Record and log an alert; critical alerts with a matching strategy
    /// trigger recovery
    pub async fn handle_alert(&self, alert: &Alert) {
        self.alerts.record(alert.clone());

        match alert.level {
            AlertLevel::Warning => warn!(
                alert_kind = alert.kind.as_str(),
                measured = alert.measured_value,
                threshold = alert.threshold,
                "⚠️ {}",
                alert.message
            ),
            AlertLevel::Critical => error!(
                alert_kind = alert.kind.as_str(),
                measured = alert.measured_value,
                threshold = alert.threshold,
                "🚨 {}",
                alert.message
            ),
        }

        if alert.level != AlertLevel::Critical {
            return;
        }
        match alert.kind.failure_kind() {
            Some(kind) => {
                self.request_recovery(kind, &alert.message, json!({ "alert": alert }))
                    .await;
            }
            None => debug!(
                alert_kind = alert.kind.as_str(),
                "No recovery strategy for alert kind"
            ),
        }
    }

    async fn request_recovery(&self, kind: FailureKind, error: &str, context: serde_json::Value) {
        self.retry_attempts.fetch_add(1, Ordering::SeqCst);
        let recovered = self.recovery.attempt_recovery(kind, error, context).await;
        debug!(failure_kind = %kind, recovered = recovered, "Recovery request finished");
    }

    async fn rotate_audit_log(&self) {
        let Some(audit) = &self.audit else {
            return;
        };
        // Rotation is non-critical work and yields to a cpu throttle
        self.throttle.wait_until_resumed().await;

        match audit.rotate_if_needed() {
            Ok(Some(backup)) => debug!(backup = %backup.display(), "Audit log rotation complete"),
            Ok(None) => debug!("Audit log below rotation size"),
            Err(e) => warn!(error = %e, "Audit log rotation failed"),
        }
    }

    // =========================================================================
    // Reads and administration
    // =========================================================================

    pub async fn get_metrics(&self) -> MonitoringMetrics {
        let mut snapshot = self.cache.get().await;
        if snapshot.uptime_seconds == 0 {
            snapshot.uptime_seconds = self.started_at.elapsed().as_secs();
        }
        MonitoringMetrics {
            snapshot,
            is_running: self.is_running(),
            retry_attempts: self.retry_attempts.load(Ordering::SeqCst),
            error_count: self.error_count.load(Ordering::SeqCst),
            check_interval_ms: self.config.check_interval_ms,
        }
    }

    pub fn thresholds(&self) -> AlertThresholds {
        *self.thresholds.read()
    }

    /// Merge a partial update; rejected updates leave the thresholds untouched
    pub fn update_thresholds(&self, update: &ThresholdUpdate) -> VigilResult<AlertThresholds> {
        let mut thresholds = self.thresholds.write();
        thresholds.merge(update)?;
        info!(
            memory_percent = thresholds.memory_percent,
            cpu_percent = thresholds.cpu_percent,
            response_time_ms = thresholds.response_time_ms,
            error_rate_percent = thresholds.error_rate_percent,
            "Alert thresholds updated"
        );
        Ok(*thresholds)
    }

    /// Newest first
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.recent(limit)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyOverride, RecoveryConfig};
    use crate::health::probes::{StoreConnectionState, StoreProbe};
    use crate::health::types::AlertKind;
    use crate::recovery::RecoveryDependencies;
    use crate::testing::{MockSelfProbe, MockStoreProbe, StaticMetricsSource};
    use std::time::Duration;

    fn quick_policy() -> Option<PolicyOverride> {
        Some(PolicyOverride {
            max_attempts: 1,
            delay_ms: 0,
        })
    }

    fn recovery(
        metrics: Arc<StaticMetricsSource>,
        store: Option<Arc<MockStoreProbe>>,
    ) -> Arc<RecoveryOrchestrator> {
        let config = RecoveryConfig {
            store: quick_policy(),
            health_check: quick_policy(),
            memory: quick_policy(),
            ..RecoveryConfig::default()
        };
        let mut deps = RecoveryDependencies::new(metrics);
        deps.store = store.map(|s| s as Arc<dyn StoreProbe>);
        let orchestrator = RecoveryOrchestrator::new(config, deps);
        orchestrator.initialize();
        Arc::new(orchestrator)
    }

    fn checker(
        metrics: Arc<StaticMetricsSource>,
        store: Option<Arc<MockStoreProbe>>,
    ) -> HealthChecker {
        let mut probes =
            DependencyProbes::new(Duration::from_millis(100), Duration::from_millis(100));
        if let Some(store) = &store {
            probes = probes.with_store(store.clone());
        }
        HealthChecker::new(
            MonitoringConfig::default(),
            AlertThresholds::default(),
            metrics.clone(),
            probes,
            recovery(metrics, store),
        )
    }

    #[tokio::test]
    async fn test_healthy_tick_replaces_snapshot() {
        let metrics = Arc::new(StaticMetricsSource::default());
        let store = Arc::new(MockStoreProbe::connected());
        let checker = checker(metrics, Some(store.clone()));

        checker.tick().await;

        let snapshot = checker.get_metrics().await.snapshot;
        assert_eq!(snapshot.status, HealthStatus::Healthy);
        assert_eq!(snapshot.memory.percent, 40.0);
        assert_eq!(store.health_calls(), 1);
        assert!(checker.recent_alerts(10).is_empty());
    }

    #[tokio::test]
    async fn test_response_time_blends_check_duration() {
        let metrics = Arc::new(StaticMetricsSource::default());
        let own = Arc::new(MockSelfProbe::with_status(200));
        own.set_delay(Duration::from_millis(40));
        let probes = DependencyProbes::new(Duration::from_millis(100), Duration::from_secs(1))
            .with_self_probe(own.clone());
        let checker = HealthChecker::new(
            MonitoringConfig::default(),
            AlertThresholds::default(),
            metrics.clone(),
            probes,
            recovery(metrics, None),
        );

        checker.tick().await;
        let first = checker.get_metrics().await.snapshot;
        assert!(first.last_check_duration_ms >= 40);
        assert_eq!(
            first.average_response_time_ms,
            first.last_check_duration_ms as f64 / 2.0
        );

        checker.tick().await;
        let second = checker.get_metrics().await.snapshot;
        assert_eq!(
            second.average_response_time_ms,
            (first.average_response_time_ms + second.last_check_duration_ms as f64) / 2.0
        );
        assert_eq!(own.calls(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_store_sets_error_and_reconnects() {
        let metrics = Arc::new(StaticMetricsSource::default());
        let store = Arc::new(MockStoreProbe::new(StoreConnectionState::Disconnected));
        let checker = checker(metrics, Some(store.clone()));

        checker.tick().await;

        assert_eq!(checker.snapshot_cache().try_status(), HealthStatus::Error);
        assert_eq!(store.reconnect_calls(), 1);
        assert_eq!(store.state(), StoreConnectionState::Connected);

        // Status follows the latest probe result only
        checker.tick().await;
        assert_eq!(checker.snapshot_cache().try_status(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_connecting_store_reads_warning() {
        let metrics = Arc::new(StaticMetricsSource::default());
        let store = Arc::new(MockStoreProbe::new(StoreConnectionState::Connecting));
        let checker = checker(metrics, Some(store.clone()));

        checker.tick().await;

        assert_eq!(checker.snapshot_cache().try_status(), HealthStatus::Warning);
        assert_eq!(store.reconnect_calls(), 0);
    }

    #[tokio::test]
    async fn test_memory_breach_raises_one_warning_per_tick() {
        let metrics = Arc::new(StaticMetricsSource::new(85.0, 10.0));
        let checker = checker(metrics, None);

        checker.tick().await;
        checker.tick().await;

        let alerts = checker.recent_alerts(10);
        assert_eq!(alerts.len(), 2);
        assert!(alerts
            .iter()
            .all(|a| a.kind == AlertKind::Memory && a.level == AlertLevel::Warning));
        // Warnings never trigger recovery
        assert!(checker.recovery.get_recovery_history().is_empty());
    }

    #[tokio::test]
    async fn test_critical_memory_alert_triggers_recovery() {
        let metrics = Arc::new(StaticMetricsSource::new(99.0, 10.0));
        metrics.enable_gc_hint(50.0);
        let checker = checker(metrics.clone(), None);

        checker.tick().await;

        let history = checker.recovery.get_recovery_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].failure_kind, FailureKind::Memory);
        assert!(history[0].success);
        assert_eq!(metrics.reclaim_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_sample_forces_error_and_health_check_recovery() {
        let metrics = Arc::new(StaticMetricsSource::default());
        let checker = checker(metrics.clone(), None);
        checker.tick().await;
        assert_eq!(checker.snapshot_cache().try_status(), HealthStatus::Healthy);

        metrics.set_failing(true);
        checker.tick().await;

        let state = checker.get_metrics().await;
        assert_eq!(state.snapshot.status, HealthStatus::Error);
        assert_eq!(state.error_count, 1);
        let history = checker.recovery.get_recovery_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].failure_kind, FailureKind::HealthCheck);
        assert!(!history[0].success);
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let metrics = Arc::new(StaticMetricsSource::default());
        let checker = Arc::new(checker(metrics, None));

        checker.start();
        checker.start();
        assert!(checker.is_running());

        checker.stop().await;
        checker.stop().await;
        assert!(!checker.is_running());
    }

    #[test]
    fn test_rejected_threshold_update_keeps_values() {
        let metrics = Arc::new(StaticMetricsSource::default());
        let checker = checker(metrics, None);

        let updated = checker
            .update_thresholds(&ThresholdUpdate {
                memory_percent: Some(70.0),
                ..ThresholdUpdate::default()
            })
            .unwrap();
        assert_eq!(updated.memory_percent, 70.0);
        assert_eq!(updated.cpu_percent, 80.0);

        let result = checker.update_thresholds(&ThresholdUpdate {
            cpu_percent: Some(50.0),
            response_time_ms: Some(-1.0),
            ..ThresholdUpdate::default()
        });
        assert!(result.is_err());
        assert_eq!(checker.thresholds().cpu_percent, 80.0);
    }
}
