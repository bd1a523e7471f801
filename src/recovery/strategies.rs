//! # Recovery Strategies
//!
//! One [`RecoveryStrategy`] implementation per [`FailureKind`]. Each carries its
//! own bounded policy and reports a [`StrategyOutcome`] per attempt; retrying
//! and backoff belong to the orchestrator.

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::throttle::{BackgroundThrottle, ReclaimableCache};
use super::types::{FailureKind, RecoveryPolicy, StrategyOutcome};
use crate::error::{VigilError, VigilResult};
use crate::health::metrics_source::MetricsSource;
use crate::health::probes::{SelfProbe, StoreProbe};

/// Bounded-retry procedure bound to one failure category
#[async_trait]
pub trait RecoveryStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> FailureKind;

    fn name(&self) -> &str;

    fn policy(&self) -> RecoveryPolicy;

    /// Run one mitigation attempt. Errors count as a failed attempt.
    async fn execute(&self) -> VigilResult<StrategyOutcome>;
}

// =============================================================================
// Store connectivity
// =============================================================================

/// Reconnect the store when it is not connected; success iff it ends connected
#[derive(Debug)]
pub struct StoreReconnectStrategy {
    store: Arc<dyn StoreProbe>,
    policy: RecoveryPolicy,
}

impl StoreReconnectStrategy {
    pub fn new(store: Arc<dyn StoreProbe>, policy: RecoveryPolicy) -> Self {
        Self { store, policy }
    }
}

#[async_trait]
impl RecoveryStrategy for StoreReconnectStrategy {
    fn kind(&self) -> FailureKind {
        FailureKind::Store
    }

    fn name(&self) -> &str {
        "store_reconnect"
    }

    fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    async fn execute(&self) -> VigilResult<StrategyOutcome> {
        let before = self.store.health().await;
        if before.is_connected() {
            return Ok(StrategyOutcome::success("store already connected"));
        }

        info!(state = %before, "🔌 Reconnecting store");
        let after = self.store.reconnect().await?;
        let details = json!({ "before": before, "after": after });
        if after.is_connected() {
            Ok(StrategyOutcome::success("store reconnected").with_details(details))
        } else {
            Ok(StrategyOutcome::failure(format!("store still {after} after reconnect"))
                .with_details(details))
        }
    }
}

// =============================================================================
// Memory pressure
// =============================================================================

/// GC hint (when the host has one), clear in-process caches, then re-measure
#[derive(Debug)]
pub struct MemoryPressureStrategy {
    metrics: Arc<dyn MetricsSource>,
    caches: Vec<Arc<dyn ReclaimableCache>>,
    target_ratio: f64,
    policy: RecoveryPolicy,
}

impl MemoryPressureStrategy {
    pub fn new(
        metrics: Arc<dyn MetricsSource>,
        caches: Vec<Arc<dyn ReclaimableCache>>,
        target_ratio: f64,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            metrics,
            caches,
            target_ratio,
            policy,
        }
    }
}

#[async_trait]
impl RecoveryStrategy for MemoryPressureStrategy {
    fn kind(&self) -> FailureKind {
        FailureKind::Memory
    }

    fn name(&self) -> &str {
        "memory_reclaim"
    }

    fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    async fn execute(&self) -> VigilResult<StrategyOutcome> {
        let gc_hint = self.metrics.reclaim_memory();
        if !gc_hint {
            debug!("No GC hint available, continuing with cache eviction");
        }

        let mut released = 0usize;
        for cache in &self.caches {
            let cleared = cache.clear();
            debug!(cache = cache.name(), entries = cleared, "Cache cleared");
            released += cleared;
        }

        let ratio = self.metrics.sample()?.memory.ratio();
        let details = json!({
            "gc_hint": gc_hint,
            "caches_cleared": self.caches.len(),
            "entries_released": released,
            "memory_ratio": ratio,
            "target_ratio": self.target_ratio,
        });

        if ratio < self.target_ratio {
            Ok(StrategyOutcome::success(format!(
                "memory ratio {:.2} below target {:.2}",
                ratio, self.target_ratio
            ))
            .with_details(details))
        } else {
            Ok(StrategyOutcome::failure(format!(
                "memory ratio {:.2} still at or above target {:.2}",
                ratio, self.target_ratio
            ))
            .with_details(details))
        }
    }
}

// =============================================================================
// CPU pressure
// =============================================================================

/// Pause non-critical background work for a cool-down. Always succeeds.
#[derive(Debug)]
pub struct CpuThrottleStrategy {
    throttle: BackgroundThrottle,
    cooldown: Duration,
    policy: RecoveryPolicy,
}

impl CpuThrottleStrategy {
    pub fn new(throttle: BackgroundThrottle, cooldown: Duration, policy: RecoveryPolicy) -> Self {
        Self {
            throttle,
            cooldown,
            policy,
        }
    }
}

#[async_trait]
impl RecoveryStrategy for CpuThrottleStrategy {
    fn kind(&self) -> FailureKind {
        FailureKind::Cpu
    }

    fn name(&self) -> &str {
        "cpu_throttle"
    }

    fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    async fn execute(&self) -> VigilResult<StrategyOutcome> {
        info!(
            cooldown_ms = self.cooldown.as_millis() as u64,
            "⏸️ Pausing background work for cpu cool-down"
        );
        self.throttle.pause();
        tokio::time::sleep(self.cooldown).await;
        self.throttle.resume();
        info!("▶️ Background work resumed");

        Ok(StrategyOutcome::success("background work throttled for cool-down")
            .with_details(json!({ "cooldown_ms": self.cooldown.as_millis() as u64 })))
    }
}

// =============================================================================
// Network reachability
// =============================================================================

/// Bounded self-probe GET; success iff a 2xx arrives within the timeout
#[derive(Debug)]
pub struct NetworkReachabilityStrategy {
    probe: Arc<dyn SelfProbe>,
    timeout: Duration,
    policy: RecoveryPolicy,
}

impl NetworkReachabilityStrategy {
    pub fn new(probe: Arc<dyn SelfProbe>, timeout: Duration, policy: RecoveryPolicy) -> Self {
        Self {
            probe,
            timeout,
            policy,
        }
    }
}

#[async_trait]
impl RecoveryStrategy for NetworkReachabilityStrategy {
    fn kind(&self) -> FailureKind {
        FailureKind::Network
    }

    fn name(&self) -> &str {
        "network_self_probe"
    }

    fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    async fn execute(&self) -> VigilResult<StrategyOutcome> {
        let result = tokio::time::timeout(self.timeout, self.probe.probe(self.timeout))
            .await
            .map_err(|_| {
                VigilError::probe(format!(
                    "self-probe timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        if (200..300).contains(&result) {
            Ok(StrategyOutcome::success(format!("self-probe returned {result}")))
        } else {
            Ok(StrategyOutcome::failure(format!("self-probe returned {result}")))
        }
    }
}

// =============================================================================
// Health check re-verification
// =============================================================================

/// Re-verify dependencies after a failed tick: reconnect the store if needed and
/// confirm metrics are readable
#[derive(Debug)]
pub struct HealthCheckStrategy {
    store: Option<Arc<dyn StoreProbe>>,
    metrics: Arc<dyn MetricsSource>,
    policy: RecoveryPolicy,
}

impl HealthCheckStrategy {
    pub fn new(
        store: Option<Arc<dyn StoreProbe>>,
        metrics: Arc<dyn MetricsSource>,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            store,
            metrics,
            policy,
        }
    }
}

#[async_trait]
impl RecoveryStrategy for HealthCheckStrategy {
    fn kind(&self) -> FailureKind {
        FailureKind::HealthCheck
    }

    fn name(&self) -> &str {
        "health_check_reverify"
    }

    fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    async fn execute(&self) -> VigilResult<StrategyOutcome> {
        if let Some(store) = &self.store {
            let mut state = store.health().await;
            if !state.is_connected() {
                state = store.reconnect().await?;
            }
            if !state.is_connected() {
                return Ok(StrategyOutcome::failure(format!("store {state}")));
            }
        }

        match self.metrics.sample() {
            Ok(_) => Ok(StrategyOutcome::success("dependencies re-verified")),
            Err(e) => {
                warn!(error = %e, "Metrics still unreadable");
                Ok(StrategyOutcome::failure(format!("metrics unreadable: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probes::StoreConnectionState;
    use crate::testing::{MockSelfProbe, MockStoreProbe, StaticMetricsSource};
    use parking_lot::Mutex;

    fn policy() -> RecoveryPolicy {
        RecoveryPolicy::new(1, Duration::ZERO)
    }

    #[derive(Debug, Default)]
    struct CountingCache {
        entries: Mutex<usize>,
    }

    impl ReclaimableCache for CountingCache {
        fn name(&self) -> &str {
            "counting"
        }

        fn clear(&self) -> usize {
            std::mem::take(&mut *self.entries.lock())
        }
    }

    #[tokio::test]
    async fn test_store_strategy_reconnects_when_disconnected() {
        let store = Arc::new(MockStoreProbe::new(StoreConnectionState::Disconnected));
        let strategy = StoreReconnectStrategy::new(store.clone(), policy());

        let outcome = strategy.execute().await.unwrap();
        assert!(outcome.success);
        assert_eq!(store.reconnect_calls(), 1);
        assert_eq!(store.state(), StoreConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_store_strategy_fails_when_still_disconnected() {
        let store = Arc::new(MockStoreProbe::new(StoreConnectionState::Disconnected));
        store.set_reconnect_result(Some(StoreConnectionState::Connecting));
        let strategy = StoreReconnectStrategy::new(store, policy());
        assert!(!strategy.execute().await.unwrap().success);
    }

    #[tokio::test]
    async fn test_store_strategy_skips_reconnect_when_connected() {
        let store = Arc::new(MockStoreProbe::connected());
        let strategy = StoreReconnectStrategy::new(store.clone(), policy());
        assert!(strategy.execute().await.unwrap().success);
        assert_eq!(store.reconnect_calls(), 0);
    }

    #[tokio::test]
    async fn test_memory_strategy_without_gc_hint_judges_on_ratio() {
        let metrics = Arc::new(StaticMetricsSource::new(70.0, 10.0));
        let cache = Arc::new(CountingCache {
            entries: Mutex::new(12),
        });
        let strategy =
            MemoryPressureStrategy::new(metrics.clone(), vec![cache.clone()], 0.8, policy());

        let outcome = strategy.execute().await.unwrap();
        assert!(outcome.success);
        assert_eq!(metrics.reclaim_calls(), 1);
        assert_eq!(cache.clear(), 0);
        let details = outcome.details.unwrap();
        assert_eq!(details["gc_hint"], false);
        assert_eq!(details["entries_released"], 12);
    }

    #[tokio::test]
    async fn test_memory_strategy_fails_above_target() {
        let metrics = Arc::new(StaticMetricsSource::new(92.0, 10.0));
        let strategy = MemoryPressureStrategy::new(metrics, Vec::new(), 0.8, policy());
        assert!(!strategy.execute().await.unwrap().success);
    }

    #[tokio::test]
    async fn test_memory_strategy_uses_gc_hint() {
        let metrics = Arc::new(StaticMetricsSource::new(92.0, 10.0));
        metrics.enable_gc_hint(50.0);
        let strategy = MemoryPressureStrategy::new(metrics, Vec::new(), 0.8, policy());
        assert!(strategy.execute().await.unwrap().success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cpu_strategy_pauses_then_resumes() {
        let throttle = BackgroundThrottle::new();
        let strategy = Arc::new(CpuThrottleStrategy::new(
            throttle.clone(),
            Duration::from_secs(30),
            policy(),
        ));

        let handle = {
            let strategy = strategy.clone();
            tokio::spawn(async move { strategy.execute().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(throttle.is_paused());

        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.success);
        assert!(!throttle.is_paused());
    }

    #[tokio::test]
    async fn test_network_strategy_requires_success_status() {
        let probe = Arc::new(MockSelfProbe::with_status(200));
        let strategy =
            NetworkReachabilityStrategy::new(probe.clone(), Duration::from_secs(1), policy());
        assert!(strategy.execute().await.unwrap().success);

        probe.set_status(500);
        assert!(!strategy.execute().await.unwrap().success);

        probe.set_unreachable();
        assert!(strategy.execute().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_strategy_bounded_by_timeout() {
        let probe = Arc::new(MockSelfProbe::with_status(200));
        probe.set_delay(Duration::from_secs(120));
        let strategy = NetworkReachabilityStrategy::new(probe, Duration::from_secs(5), policy());
        assert!(strategy.execute().await.is_err());
    }

    #[tokio::test]
    async fn test_health_check_strategy() {
        let store = Arc::new(MockStoreProbe::new(StoreConnectionState::Disconnected));
        let metrics = Arc::new(StaticMetricsSource::default());
        let strategy = HealthCheckStrategy::new(Some(store.clone()), metrics.clone(), policy());
        assert!(strategy.execute().await.unwrap().success);
        assert_eq!(store.reconnect_calls(), 1);

        metrics.set_failing(true);
        assert!(!strategy.execute().await.unwrap().success);
    }
}
