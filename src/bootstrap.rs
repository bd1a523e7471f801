//! # Resilience Core Bootstrap
//!
//! Explicit construction and lifecycle for every resilience component. The
//! process owns one [`ResilienceCore`] and passes handles by reference; there
//! are no global instances.
//!
//! ```rust,no_run
//! use vigil_core::bootstrap::ResilienceCore;
//! use vigil_core::config::ConfigManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let core = ResilienceCore::bootstrap(ConfigManager::load()?);
//! core.start().await;
//! let app = vigil_core::web::create_app(core.app_state());
//! # let _ = app;
//! core.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::config::{ConfigManager, VigilConfig};
use crate::health::{
    DependencyProbes, HealthChecker, HttpSelfProbe, MetricsSource, SelfProbe, StoreProbe,
    SysinfoMetricsSource,
};
use crate::monitor::RequestMonitor;
use crate::recovery::{
    BackgroundThrottle, ReclaimableCache, RecoveryDependencies, RecoveryOrchestrator,
};
use crate::web::state::{AppState, WebServerConfig};

/// External collaborators consumed through narrow interfaces
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub metrics: Arc<dyn MetricsSource>,
    pub store: Option<Arc<dyn StoreProbe>>,
    pub self_probe: Option<Arc<dyn SelfProbe>>,
    pub caches: Vec<Arc<dyn ReclaimableCache>>,
    /// Replaces the file-backed audit log built from configuration
    pub audit: Option<Arc<AuditLog>>,
}

impl Collaborators {
    pub fn new(metrics: Arc<dyn MetricsSource>) -> Self {
        Self {
            metrics,
            store: None,
            self_probe: None,
            caches: Vec::new(),
            audit: None,
        }
    }

    /// Production collaborators: sysinfo metrics, the HTTP self-probe and a
    /// Postgres store probe when a store url is configured
    pub fn from_config(config: &VigilConfig) -> Self {
        let mut collaborators = Self::new(Arc::new(SysinfoMetricsSource::new()));
        collaborators.self_probe = Some(Arc::new(HttpSelfProbe::new(
            config.recovery.self_probe_url.clone(),
        )));

        collaborators.store = store_probe(config);

        collaborators
    }

    pub fn with_store(mut self, store: Arc<dyn StoreProbe>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_self_probe(mut self, probe: Arc<dyn SelfProbe>) -> Self {
        self.self_probe = Some(probe);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ReclaimableCache>) -> Self {
        self.caches.push(cache);
        self
    }

    pub fn with_audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }
}

#[cfg(feature = "postgres")]
fn store_probe(config: &VigilConfig) -> Option<Arc<dyn StoreProbe>> {
    let url = config.store.url.as_ref()?;
    Some(Arc::new(crate::health::PgStoreProbe::new(
        url.clone(),
        config.store.max_connections,
        config.monitoring.store_probe_timeout(),
    )))
}

#[cfg(not(feature = "postgres"))]
fn store_probe(config: &VigilConfig) -> Option<Arc<dyn StoreProbe>> {
    if config.store.url.is_some() {
        warn!("Store url configured but the postgres feature is disabled, no store probe installed");
    }
    None
}

/// Owner of the health checker, recovery orchestrator, audit log and request
/// monitor
#[derive(Debug)]
pub struct ResilienceCore {
    config_manager: Arc<ConfigManager>,
    store: Option<Arc<dyn StoreProbe>>,
    audit: Arc<AuditLog>,
    requests: Arc<RequestMonitor>,
    recovery: Arc<RecoveryOrchestrator>,
    checker: Arc<HealthChecker>,
    throttle: BackgroundThrottle,
}

impl ResilienceCore {
    /// Build the core with production collaborators derived from configuration
    pub fn bootstrap(config_manager: Arc<ConfigManager>) -> Self {
        let collaborators = Collaborators::from_config(config_manager.config());
        Self::with_collaborators(config_manager, collaborators)
    }

    pub fn with_collaborators(
        config_manager: Arc<ConfigManager>,
        collaborators: Collaborators,
    ) -> Self {
        let config = config_manager.config();
        let throttle = BackgroundThrottle::new();

        let audit = collaborators
            .audit
            .unwrap_or_else(|| Arc::new(AuditLog::new(&config.audit)));
        let requests = Arc::new(RequestMonitor::new(
            &config.request_monitor,
            config.is_production(),
        ));

        let recovery_dependencies = RecoveryDependencies {
            metrics: collaborators.metrics.clone(),
            store: collaborators.store.clone(),
            self_probe: collaborators.self_probe.clone(),
            caches: collaborators.caches,
            throttle: throttle.clone(),
        };
        let recovery = RecoveryOrchestrator::new(config.recovery.clone(), recovery_dependencies)
            .with_audit_log(audit.clone());
        recovery.initialize();
        let recovery = Arc::new(recovery);

        let mut probes = DependencyProbes::new(
            config.monitoring.store_probe_timeout(),
            config.recovery.self_probe_timeout(),
        );
        if let Some(store) = &collaborators.store {
            probes = probes.with_store(store.clone());
        }
        if let Some(probe) = &collaborators.self_probe {
            probes = probes.with_self_probe(probe.clone());
        }

        let checker = HealthChecker::new(
            config.monitoring.clone(),
            config.thresholds,
            collaborators.metrics,
            probes,
            recovery.clone(),
        )
        .with_audit_log(audit.clone())
        .with_request_monitor(requests.clone())
        .with_throttle(throttle.clone());

        if admin_routes_unprotected(config) {
            warn!(
                environment = %config.environment,
                "Admin routes are served without a token, set web.admin_token"
            );
        }

        info!(
            environment = config_manager.environment(),
            store_probe = collaborators.store.is_some(),
            recovery_enabled = recovery.is_enabled(),
            "🏗️ Resilience core bootstrapped"
        );

        Self {
            store: collaborators.store,
            config_manager,
            audit,
            requests,
            recovery,
            checker: Arc::new(checker),
            throttle,
        }
    }

    /// Connect the store (failures are left to the health checker) and start
    /// monitoring when `monitoring.auto_start` is set
    pub async fn start(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.connect().await {
                warn!(error = %e, "Initial store connection failed, health checks will retry");
            }
        }
        if self.config().monitoring.auto_start {
            self.checker.start();
        }
    }

    /// Stop monitoring. An in-flight recovery is allowed to finish.
    pub async fn stop(&self) {
        self.checker.stop().await;
        self.throttle.resume();
        info!("🛑 Resilience core stopped");
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            WebServerConfig::new(self.config().admission.clone(), &self.config().web),
            self.checker.clone(),
            self.recovery.clone(),
            self.audit.clone(),
            self.requests.clone(),
        )
    }

    pub fn config(&self) -> &VigilConfig {
        self.config_manager.config()
    }

    pub fn checker(&self) -> &Arc<HealthChecker> {
        &self.checker
    }

    pub fn recovery(&self) -> &Arc<RecoveryOrchestrator> {
        &self.recovery
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn requests(&self) -> &Arc<RequestMonitor> {
        &self.requests
    }
}

/// Admin routes accept any caller when no token is set; only development
/// tolerates that silently.
fn admin_routes_unprotected(config: &VigilConfig) -> bool {
    let has_token = config
        .web
        .admin_token
        .as_deref()
        .is_some_and(|t| !t.is_empty());
    !has_token && config.environment != "development"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::FailureKind;
    use crate::testing::{MockStoreProbe, StaticMetricsSource};

    fn core(store: Option<Arc<MockStoreProbe>>) -> ResilienceCore {
        let manager = ConfigManager::from_config(VigilConfig::for_test()).unwrap();
        let mut collaborators = Collaborators::new(Arc::new(StaticMetricsSource::default()))
            .with_audit_log(Arc::new(AuditLog::in_memory(100)));
        if let Some(store) = store {
            collaborators = collaborators.with_store(store);
        }
        ResilienceCore::with_collaborators(manager, collaborators)
    }

    #[test]
    fn test_store_strategy_registered_only_with_store() {
        let without = core(None);
        assert!(!without.recovery().has_strategy(FailureKind::Store));
        assert!(without.recovery().has_strategy(FailureKind::Memory));

        let with = core(Some(Arc::new(MockStoreProbe::connected())));
        assert!(with.recovery().has_strategy(FailureKind::Store));
    }

    #[test]
    fn test_admin_routes_unprotected_outside_development() {
        let mut config = VigilConfig::for_test();
        config.environment = "production".to_string();
        config.web.admin_token = None;
        assert!(admin_routes_unprotected(&config));

        config.web.admin_token = Some(String::new());
        assert!(admin_routes_unprotected(&config));

        config.web.admin_token = Some("secret".to_string());
        assert!(!admin_routes_unprotected(&config));

        config.environment = "development".to_string();
        config.web.admin_token = None;
        assert!(!admin_routes_unprotected(&config));
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let core = core(None);
        core.start().await;
        assert!(core.checker().is_running());

        core.stop().await;
        core.stop().await;
        assert!(!core.checker().is_running());
    }
}
