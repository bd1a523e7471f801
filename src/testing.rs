//! # Test Doubles
//!
//! Controllable implementations of the collaborator interfaces, shared by unit
//! tests and the integration suites under `tests/`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use crate::error::{VigilError, VigilResult};
use crate::health::metrics_source::{MetricsSource, RuntimeMetrics};
use crate::health::probes::{SelfProbe, StoreConnectionState, StoreProbe};
use crate::health::types::MemoryUsage;
use crate::recovery::strategies::RecoveryStrategy;
use crate::recovery::types::{FailureKind, RecoveryPolicy, StrategyOutcome};

const TOTAL_MB: f64 = 1024.0;

/// Metrics source returning pinned values
#[derive(Debug)]
pub struct StaticMetricsSource {
    metrics: Mutex<RuntimeMetrics>,
    failing: AtomicBool,
    gc_hint: AtomicBool,
    /// Memory percent reported after a successful `reclaim_memory`
    reclaimed_percent: Mutex<Option<f64>>,
    reclaim_calls: AtomicU32,
}

impl Default for StaticMetricsSource {
    fn default() -> Self {
        Self::new(40.0, 10.0)
    }
}

impl StaticMetricsSource {
    pub fn new(memory_percent: f64, cpu_percent: f64) -> Self {
        Self {
            metrics: Mutex::new(RuntimeMetrics {
                memory: memory_at(memory_percent),
                cpu_percent,
                uptime: Duration::from_secs(60),
            }),
            failing: AtomicBool::new(false),
            gc_hint: AtomicBool::new(false),
            reclaimed_percent: Mutex::new(None),
            reclaim_calls: AtomicU32::new(0),
        }
    }

    pub fn set_memory_percent(&self, percent: f64) {
        self.metrics.lock().memory = memory_at(percent);
    }

    pub fn set_cpu_percent(&self, percent: f64) {
        self.metrics.lock().cpu_percent = percent;
    }

    /// Make `sample()` fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Expose a GC hint that drops memory to `percent` when invoked
    pub fn enable_gc_hint(&self, percent: f64) {
        self.gc_hint.store(true, Ordering::SeqCst);
        *self.reclaimed_percent.lock() = Some(percent);
    }

    pub fn reclaim_calls(&self) -> u32 {
        self.reclaim_calls.load(Ordering::SeqCst)
    }
}

fn memory_at(percent: f64) -> MemoryUsage {
    MemoryUsage {
        used_mb: TOTAL_MB * percent / 100.0,
        total_mb: TOTAL_MB,
        percent,
    }
}

impl MetricsSource for StaticMetricsSource {
    fn sample(&self) -> VigilResult<RuntimeMetrics> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VigilError::probe("metrics source unavailable"));
        }
        Ok(*self.metrics.lock())
    }

    fn reclaim_memory(&self) -> bool {
        self.reclaim_calls.fetch_add(1, Ordering::SeqCst);
        if !self.gc_hint.load(Ordering::SeqCst) {
            return false;
        }
        if let Some(percent) = *self.reclaimed_percent.lock() {
            self.set_memory_percent(percent);
        }
        true
    }
}

/// Store probe with a settable connection state
#[derive(Debug)]
pub struct MockStoreProbe {
    state: Mutex<StoreConnectionState>,
    /// State adopted after `reconnect()`; `None` makes reconnect fail
    reconnect_to: Mutex<Option<StoreConnectionState>>,
    health_calls: AtomicU32,
    reconnect_calls: AtomicU32,
}

impl MockStoreProbe {
    pub fn new(state: StoreConnectionState) -> Self {
        Self {
            state: Mutex::new(state),
            reconnect_to: Mutex::new(Some(StoreConnectionState::Connected)),
            health_calls: AtomicU32::new(0),
            reconnect_calls: AtomicU32::new(0),
        }
    }

    pub fn connected() -> Self {
        Self::new(StoreConnectionState::Connected)
    }

    pub fn set_state(&self, state: StoreConnectionState) {
        *self.state.lock() = state;
    }

    pub fn state(&self) -> StoreConnectionState {
        *self.state.lock()
    }

    pub fn set_reconnect_result(&self, result: Option<StoreConnectionState>) {
        *self.reconnect_to.lock() = result;
    }

    pub fn health_calls(&self) -> u32 {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn reconnect_calls(&self) -> u32 {
        self.reconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreProbe for MockStoreProbe {
    async fn connect(&self) -> VigilResult<()> {
        self.set_state(StoreConnectionState::Connected);
        Ok(())
    }

    async fn health(&self) -> StoreConnectionState {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.state()
    }

    async fn reconnect(&self) -> VigilResult<StoreConnectionState> {
        self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        let next = *self.reconnect_to.lock();
        match next {
            Some(state) => {
                self.set_state(state);
                Ok(state)
            }
            None => Err(VigilError::probe("reconnect refused")),
        }
    }
}

/// Self-probe with a settable status code, failure and latency
#[derive(Debug)]
pub struct MockSelfProbe {
    status: Mutex<Option<u16>>,
    delay: Mutex<Duration>,
    calls: AtomicU32,
}

impl MockSelfProbe {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Mutex::new(Some(status)),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set_status(&self, status: u16) {
        *self.status.lock() = Some(status);
    }

    pub fn set_unreachable(&self) {
        *self.status.lock() = None;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelfProbe for MockSelfProbe {
    async fn probe(&self, timeout: Duration) -> VigilResult<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(VigilError::probe("self-probe timed out"));
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let status = *self.status.lock();
        status.ok_or_else(|| VigilError::probe("connection refused"))
    }
}

/// Recovery strategy replaying a fixed sequence of outcomes.
///
/// Once the script is exhausted every further attempt fails.
#[derive(Debug)]
pub struct ScriptedStrategy {
    kind: FailureKind,
    policy: RecoveryPolicy,
    outcomes: Mutex<VecDeque<bool>>,
    delay: Duration,
    error: Option<String>,
    calls: AtomicU32,
}

impl ScriptedStrategy {
    pub fn new(kind: FailureKind, policy: RecoveryPolicy, outcomes: Vec<bool>) -> Self {
        Self {
            kind,
            policy,
            outcomes: Mutex::new(outcomes.into()),
            delay: Duration::ZERO,
            error: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Sleep this long inside every attempt
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every attempt return an error
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecoveryStrategy for ScriptedStrategy {
    fn kind(&self) -> FailureKind {
        self.kind
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    async fn execute(&self) -> VigilResult<StrategyOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(message) = &self.error {
            return Err(VigilError::recovery(message.clone()));
        }
        let next = self.outcomes.lock().pop_front().unwrap_or(false);
        if next {
            Ok(StrategyOutcome::success(format!("attempt {call} succeeded")))
        } else {
            Ok(StrategyOutcome::failure(format!("attempt {call} failed")))
        }
    }
}
