//! # Recovery Orchestrator
//!
//! Holds the strategy registry and runs at most one recovery at a time.
//!
//! ## Flow
//!
//! 1. Disabled orchestrator or unknown failure kind: return `false`, no history
//! 2. Another recovery in flight: reject immediately (never queued)
//! 3. Otherwise run the strategy with bounded retries and linear backoff,
//!    record exactly one [`RecoveryAttempt`], clear the in-progress flag
//! 4. Exhausted attempts are escalated as `manual_intervention_required`

use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::strategies::{
    CpuThrottleStrategy, HealthCheckStrategy, MemoryPressureStrategy,
    NetworkReachabilityStrategy, RecoveryStrategy, StoreReconnectStrategy,
};
use super::throttle::{BackgroundThrottle, ReclaimableCache};
use super::types::{
    AttemptResult, FailureKind, RecoveryAttempt, RecoveryExecution, RecoveryPolicy,
    RecoveryStats,
};
use crate::audit::types::{AuditCategory, AuditLevel, NewAuditEvent};
use crate::audit::AuditLog;
use crate::config::RecoveryConfig;
use crate::health::metrics_source::MetricsSource;
use crate::health::probes::{SelfProbe, StoreProbe};
use crate::logging::log_recovery_operation;
use crate::utils::RingBuffer;

/// Collaborators the built-in strategies act on
#[derive(Debug, Clone)]
pub struct RecoveryDependencies {
    pub metrics: Arc<dyn MetricsSource>,
    pub store: Option<Arc<dyn StoreProbe>>,
    pub self_probe: Option<Arc<dyn SelfProbe>>,
    pub caches: Vec<Arc<dyn ReclaimableCache>>,
    pub throttle: BackgroundThrottle,
}

impl RecoveryDependencies {
    pub fn new(metrics: Arc<dyn MetricsSource>) -> Self {
        Self {
            metrics,
            store: None,
            self_probe: None,
            caches: Vec::new(),
            throttle: BackgroundThrottle::new(),
        }
    }
}

/// Clears the in-progress flag however the run ends
struct InProgressGuard<'a>(&'a AtomicBool);

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug)]
pub struct RecoveryOrchestrator {
    config: RecoveryConfig,
    dependencies: RecoveryDependencies,
    registry: RwLock<HashMap<FailureKind, Arc<dyn RecoveryStrategy>>>,
    initialized: AtomicBool,
    in_progress: AtomicBool,
    enabled: AtomicBool,
    history: Mutex<RingBuffer<RecoveryAttempt>>,
    manual_interventions: AtomicU64,
    audit: Option<Arc<AuditLog>>,
}

impl RecoveryOrchestrator {
    pub fn new(config: RecoveryConfig, dependencies: RecoveryDependencies) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            history: Mutex::new(RingBuffer::new(config.history_capacity)),
            config,
            dependencies,
            registry: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            in_progress: AtomicBool::new(false),
            manual_interventions: AtomicU64::new(0),
            audit: None,
        }
    }

    /// Escalate exhausted recoveries into the audit trail
    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Populate the registry with the built-in strategies. Runs once; later
    /// calls are no-ops.
    pub fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Recovery orchestrator already initialized");
            return;
        }

        let deps = &self.dependencies;
        let policy = |kind| RecoveryPolicy::resolve(kind, &self.config);

        if let Some(store) = &deps.store {
            self.register(Arc::new(StoreReconnectStrategy::new(
                store.clone(),
                policy(FailureKind::Store),
            )));
        }
        self.register(Arc::new(MemoryPressureStrategy::new(
            deps.metrics.clone(),
            deps.caches.clone(),
            self.config.memory_target_ratio,
            policy(FailureKind::Memory),
        )));
        self.register(Arc::new(CpuThrottleStrategy::new(
            deps.throttle.clone(),
            self.config.cpu_cooldown(),
            policy(FailureKind::Cpu),
        )));
        if let Some(probe) = &deps.self_probe {
            self.register(Arc::new(NetworkReachabilityStrategy::new(
                probe.clone(),
                self.config.self_probe_timeout(),
                policy(FailureKind::Network),
            )));
        }
        self.register(Arc::new(HealthCheckStrategy::new(
            deps.store.clone(),
            deps.metrics.clone(),
            policy(FailureKind::HealthCheck),
        )));

        let mut kinds: Vec<_> = self.registry.read().keys().copied().collect();
        kinds.sort();
        info!(
            strategies = ?kinds,
            enabled = self.is_enabled(),
            "🩺 Recovery orchestrator initialized"
        );
    }

    /// Register or replace the strategy for its failure kind
    pub fn register(&self, strategy: Arc<dyn RecoveryStrategy>) {
        let kind = strategy.kind();
        debug!(failure_kind = %kind, strategy = strategy.name(), "Registering recovery strategy");
        self.registry.write().insert(kind, strategy);
    }

    pub fn has_strategy(&self, kind: FailureKind) -> bool {
        self.registry.read().contains_key(&kind)
    }

    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled = enabled, "Automatic recovery toggled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Parse a failure type name and attempt recovery. Unknown names are
    /// logged and rejected without touching history.
    pub async fn attempt_recovery_by_name(
        &self,
        failure_type: &str,
        error: &str,
        context: serde_json::Value,
    ) -> bool {
        match failure_type.parse::<FailureKind>() {
            Ok(kind) => self.attempt_recovery(kind, error, context).await,
            Err(e) => {
                error!(failure_type = failure_type, error = %e, "Unknown recovery failure type");
                false
            }
        }
    }

    pub async fn attempt_recovery(
        &self,
        kind: FailureKind,
        error: &str,
        context: serde_json::Value,
    ) -> bool {
        if !self.is_enabled() {
            info!(failure_kind = %kind, "Automatic recovery disabled, skipping");
            return false;
        }

        let strategy = match self.registry.read().get(&kind).cloned() {
            Some(strategy) => strategy,
            None => {
                error!(failure_kind = %kind, "No recovery strategy registered");
                return false;
            }
        };

        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                failure_kind = %kind,
                "Recovery already in progress, rejecting concurrent request"
            );
            return false;
        }
        let _guard = InProgressGuard(&self.in_progress);

        let recovery_id = Uuid::new_v4();
        let policy = strategy.policy();
        log_recovery_operation("start", kind.as_str(), Some(recovery_id), None, Some(error));

        let started = Instant::now();
        let execution = self.execute_recovery_strategy(strategy.as_ref()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let attempt = RecoveryAttempt {
            id: recovery_id,
            failure_kind: kind,
            strategy_name: strategy.name().to_string(),
            attempt_number: execution.attempts_used,
            max_attempts: policy.max_attempts,
            success: execution.success,
            detail: execution.final_message(),
            trigger: error.to_string(),
            context,
            duration_ms,
            timestamp: chrono::Utc::now(),
        };
        self.history.lock().push(attempt.clone());

        log_recovery_operation(
            "finish",
            kind.as_str(),
            Some(recovery_id),
            Some(execution.success),
            Some(&attempt.detail),
        );

        if !execution.success {
            self.escalate(&attempt);
        }

        execution.success
    }

    /// Sequential attempts up to the policy limit, stopping at the first
    /// success and sleeping `delay * attempt_number` after each failure
    pub async fn execute_recovery_strategy(
        &self,
        strategy: &dyn RecoveryStrategy,
    ) -> RecoveryExecution {
        let policy = strategy.policy();
        let mut attempts = Vec::with_capacity(policy.max_attempts as usize);

        for attempt_number in 1..=policy.max_attempts {
            let started = Instant::now();
            let (success, message) = match strategy.execute().await {
                Ok(outcome) => (outcome.success, outcome.message),
                Err(e) => (false, e.to_string()),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            debug!(
                strategy = strategy.name(),
                attempt = attempt_number,
                max_attempts = policy.max_attempts,
                success = success,
                message = %message,
                "Recovery attempt finished"
            );
            attempts.push(AttemptResult {
                attempt_number,
                success,
                message,
                duration_ms,
            });

            if success {
                return RecoveryExecution {
                    success: true,
                    attempts_used: attempt_number,
                    attempts,
                };
            }
            if attempt_number < policy.max_attempts {
                tokio::time::sleep(policy.backoff_for(attempt_number)).await;
            }
        }

        RecoveryExecution {
            success: false,
            attempts_used: policy.max_attempts,
            attempts,
        }
    }

    fn escalate(&self, attempt: &RecoveryAttempt) {
        self.manual_interventions.fetch_add(1, Ordering::SeqCst);
        error!(
            recovery_id = %attempt.id,
            failure_kind = %attempt.failure_kind,
            strategy = %attempt.strategy_name,
            attempts = attempt.attempt_number,
            detail = %attempt.detail,
            "🚨 manual_intervention_required: recovery attempts exhausted"
        );

        if let Some(audit) = &self.audit {
            audit.log_event(
                NewAuditEvent::new(
                    AuditLevel::Critical,
                    AuditCategory::System,
                    "manual_intervention_required",
                )
                .details(json!({
                    "recovery_id": attempt.id,
                    "failure_kind": attempt.failure_kind,
                    "strategy": attempt.strategy_name,
                    "attempts": attempt.attempt_number,
                    "detail": attempt.detail,
                    "trigger": attempt.trigger,
                })),
            );
        }
    }

    /// Oldest first
    pub fn get_recovery_history(&self) -> Vec<RecoveryAttempt> {
        self.history.lock().to_vec()
    }

    pub fn get_recovery_stats(&self) -> RecoveryStats {
        let mut stats = RecoveryStats::from_history(self.history.lock().iter());
        stats.manual_interventions = self.manual_interventions.load(Ordering::SeqCst);
        stats.in_progress = self.is_in_progress();
        stats.enabled = self.is_enabled();
        stats
    }
}
