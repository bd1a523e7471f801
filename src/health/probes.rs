//! # Dependency Probes
//!
//! Narrow collaborator interfaces for the persistent store and the HTTP
//! self-reachability check, plus [`DependencyProbes`], which runs them under
//! bounded timeouts and maps outcomes to [`DependencyCheck`] results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::types::{DependencyCheck, DependencyKind, DependencyReport};
use crate::error::{VigilError, VigilResult};

/// Connection state reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreConnectionState {
    Connected,
    Connecting,
    Disconnecting,
    Disconnected,
}

impl StoreConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for StoreConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Connecting => "connecting",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

/// Persistent store connectivity
#[async_trait]
pub trait StoreProbe: Send + Sync + fmt::Debug {
    async fn connect(&self) -> VigilResult<()>;

    /// Current connection state; must not fail, unreachable reads as disconnected
    async fn health(&self) -> StoreConnectionState;

    /// Drop the current connection and establish a new one
    async fn reconnect(&self) -> VigilResult<StoreConnectionState>;
}

/// HTTP self-reachability
#[async_trait]
pub trait SelfProbe: Send + Sync + fmt::Debug {
    /// GET the local health endpoint, returning the response status code
    async fn probe(&self, timeout: Duration) -> VigilResult<u16>;
}

// =============================================================================
// Probe runner
// =============================================================================

/// Runs every configured dependency probe for one tick
#[derive(Debug, Clone)]
pub struct DependencyProbes {
    store: Option<Arc<dyn StoreProbe>>,
    self_probe: Option<Arc<dyn SelfProbe>>,
    store_timeout: Duration,
    self_probe_timeout: Duration,
}

impl DependencyProbes {
    pub fn new(store_timeout: Duration, self_probe_timeout: Duration) -> Self {
        Self {
            store: None,
            self_probe: None,
            store_timeout,
            self_probe_timeout,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn StoreProbe>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_self_probe(mut self, probe: Arc<dyn SelfProbe>) -> Self {
        self.self_probe = Some(probe);
        self
    }

    pub fn store(&self) -> Option<&Arc<dyn StoreProbe>> {
        self.store.as_ref()
    }

    pub fn self_probe(&self) -> Option<&Arc<dyn SelfProbe>> {
        self.self_probe.as_ref()
    }

    /// Probe all configured dependencies. Unconfigured ones are omitted.
    pub async fn run(&self) -> DependencyReport {
        let mut checks = Vec::with_capacity(2);
        if let Some(store) = &self.store {
            checks.push(check_store(store.as_ref(), self.store_timeout).await);
        }
        if let Some(probe) = &self.self_probe {
            checks.push(check_self(probe.as_ref(), self.self_probe_timeout).await);
        }
        DependencyReport::new(checks)
    }
}

async fn check_store(store: &dyn StoreProbe, timeout: Duration) -> DependencyCheck {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, store.health()).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(StoreConnectionState::Connected) => {
            debug!(duration_ms = duration_ms, "Store probe successful");
            DependencyCheck::healthy(DependencyKind::Store, duration_ms)
        }
        Ok(state @ (StoreConnectionState::Connecting | StoreConnectionState::Disconnecting)) => {
            DependencyCheck::degraded(DependencyKind::Store, state.to_string(), duration_ms)
        }
        Ok(StoreConnectionState::Disconnected) => {
            warn!(duration_ms = duration_ms, "Store probe reports disconnected");
            DependencyCheck::error(DependencyKind::Store, "disconnected", duration_ms)
        }
        Err(_elapsed) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Store probe timed out"
            );
            DependencyCheck::error(
                DependencyKind::Store,
                format!("probe timed out after {}ms", timeout.as_millis()),
                duration_ms,
            )
        }
    }
}

async fn check_self(probe: &dyn SelfProbe, timeout: Duration) -> DependencyCheck {
    let start = Instant::now();
    // The probe carries its own timeout; the outer one guards misbehaving impls
    let result = tokio::time::timeout(timeout, probe.probe(timeout)).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(code)) if (200..300).contains(&code) => {
            DependencyCheck::healthy(DependencyKind::SelfReachability, duration_ms)
        }
        Ok(Ok(code)) => DependencyCheck::degraded(
            DependencyKind::SelfReachability,
            format!("status {code}"),
            duration_ms,
        ),
        Ok(Err(e)) => {
            warn!(error = %e, "Self-reachability probe failed");
            DependencyCheck::error(DependencyKind::SelfReachability, e.to_string(), duration_ms)
        }
        Err(_elapsed) => DependencyCheck::error(
            DependencyKind::SelfReachability,
            format!("probe timed out after {}ms", timeout.as_millis()),
            duration_ms,
        ),
    }
}

// =============================================================================
// HTTP self-probe
// =============================================================================

/// `reqwest`-backed self-probe against a local health URL
#[derive(Debug, Clone)]
pub struct HttpSelfProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpSelfProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SelfProbe for HttpSelfProbe {
    async fn probe(&self, timeout: Duration) -> VigilResult<u16> {
        let response = self
            .client
            .get(&self.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| VigilError::probe(format!("self-probe to {} failed: {e}", self.url)))?;
        Ok(response.status().as_u16())
    }
}

// =============================================================================
// PostgreSQL store probe
// =============================================================================

#[cfg(feature = "postgres")]
pub use pg::PgStoreProbe;

#[cfg(feature = "postgres")]
mod pg {
    use super::*;
    use parking_lot::RwLock;
    use sqlx::postgres::{PgPool, PgPoolOptions};
    use tracing::info;

    /// Store probe over a lazily created `sqlx` PostgreSQL pool
    pub struct PgStoreProbe {
        url: String,
        max_connections: u32,
        timeout: Duration,
        pool: RwLock<Option<PgPool>>,
    }

    impl fmt::Debug for PgStoreProbe {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("PgStoreProbe")
                .field("max_connections", &self.max_connections)
                .field("timeout", &self.timeout)
                .field("connected", &self.pool.read().is_some())
                .finish()
        }
    }

    impl PgStoreProbe {
        pub fn new(url: impl Into<String>, max_connections: u32, timeout: Duration) -> Self {
            Self {
                url: url.into(),
                max_connections,
                timeout,
                pool: RwLock::new(None),
            }
        }

        async fn open_pool(&self) -> VigilResult<PgPool> {
            PgPoolOptions::new()
                .max_connections(self.max_connections)
                .acquire_timeout(self.timeout)
                .connect(&self.url)
                .await
                .map_err(|e| VigilError::probe(format!("store connection failed: {e}")))
        }
    }

    #[async_trait]
    impl StoreProbe for PgStoreProbe {
        async fn connect(&self) -> VigilResult<()> {
            let pool = self.open_pool().await?;
            *self.pool.write() = Some(pool);
            info!("🗄️ Store connection established");
            Ok(())
        }

        async fn health(&self) -> StoreConnectionState {
            let pool = match self.pool.read().clone() {
                Some(pool) => pool,
                None => return StoreConnectionState::Disconnected,
            };
            if pool.is_closed() {
                return StoreConnectionState::Disconnected;
            }

            let check = sqlx::query("SELECT 1").execute(&pool);
            match tokio::time::timeout(self.timeout, check).await {
                Ok(Ok(_)) => StoreConnectionState::Connected,
                Ok(Err(e)) => {
                    debug!(error = %e, "Store health query failed");
                    StoreConnectionState::Disconnected
                }
                Err(_elapsed) => StoreConnectionState::Disconnected,
            }
        }

        async fn reconnect(&self) -> VigilResult<StoreConnectionState> {
            let previous = self.pool.write().take();
            if let Some(pool) = previous {
                pool.close().await;
            }
            self.connect().await?;
            Ok(self.health().await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::{DependencyState, HealthStatus};
    use crate::testing::{MockSelfProbe, MockStoreProbe};

    fn probes() -> DependencyProbes {
        DependencyProbes::new(Duration::from_millis(100), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_unconfigured_probes_report_healthy() {
        let report = probes().run().await;
        assert!(report.checks.is_empty());
        assert_eq!(report.derive_status(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_store_states_map_to_dependency_states() {
        let store = Arc::new(MockStoreProbe::new(StoreConnectionState::Connecting));
        let runner = probes().with_store(store.clone());

        let report = runner.run().await;
        assert_eq!(
            report.get(DependencyKind::Store).unwrap().state,
            DependencyState::Degraded
        );

        store.set_state(StoreConnectionState::Disconnected);
        let report = runner.run().await;
        assert_eq!(report.derive_status(), HealthStatus::Error);
    }

    #[tokio::test]
    async fn test_self_probe_status_codes() {
        let probe = Arc::new(MockSelfProbe::with_status(503));
        let runner = probes().with_self_probe(probe.clone());
        assert_eq!(runner.run().await.derive_status(), HealthStatus::Warning);

        probe.set_unreachable();
        assert_eq!(runner.run().await.derive_status(), HealthStatus::Error);

        probe.set_status(200);
        assert_eq!(runner.run().await.derive_status(), HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_self_probe_is_bounded() {
        let probe = Arc::new(MockSelfProbe::with_status(200));
        probe.set_delay(Duration::from_secs(60));
        let report = probes().with_self_probe(probe).run().await;
        let check = report.get(DependencyKind::SelfReachability).unwrap();
        assert_eq!(check.state, DependencyState::Error);
        assert!(check.detail.as_deref().unwrap().contains("timed out"));
    }
}
