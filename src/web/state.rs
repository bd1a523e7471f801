//! # Web API Application State
//!
//! Shared handles passed to every handler and middleware. Everything here is
//! cheap to clone; the components themselves are owned by
//! [`crate::bootstrap::ResilienceCore`].

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::config::{AdmissionConfig, WebConfig};
use crate::health::{HealthChecker, SnapshotCache};
use crate::monitor::RequestMonitor;
use crate::recovery::RecoveryOrchestrator;

/// Web server configuration relevant to request handling
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    pub admission: AdmissionConfig,
    /// Bearer token required on admin routes when set
    pub admin_token: Option<String>,
}

impl WebServerConfig {
    pub fn new(admission: AdmissionConfig, web: &WebConfig) -> Self {
        Self {
            admission,
            admin_token: web.admin_token.clone().filter(|t| !t.is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<WebServerConfig>,
    pub checker: Arc<HealthChecker>,
    pub recovery: Arc<RecoveryOrchestrator>,
    pub audit: Arc<AuditLog>,
    pub requests: Arc<RequestMonitor>,
    /// Read side of the health snapshot; never triggers probes
    pub snapshot: SnapshotCache,
}

impl AppState {
    pub fn new(
        config: WebServerConfig,
        checker: Arc<HealthChecker>,
        recovery: Arc<RecoveryOrchestrator>,
        audit: Arc<AuditLog>,
        requests: Arc<RequestMonitor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            snapshot: checker.snapshot_cache(),
            checker,
            recovery,
            audit,
            requests,
        }
    }
}
