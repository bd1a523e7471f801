//! # Health Check Handlers
//!
//! Health and metrics endpoints. They read the cached snapshot and aggregates
//! only; no probe runs on the request path.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::health::{DependencyState, HealthStatus, MemoryUsage, Snapshot};
use crate::monitor::RequestMetrics;
use crate::recovery::RecoveryStats;
use crate::web::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    /// Dependency name to its latest probe state
    pub dependencies: BTreeMap<String, DependencyState>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    pub memory: MemoryUsage,
    pub cpu_percent: f64,
    pub average_response_time_ms: f64,
    pub last_check_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringState {
    pub is_running: bool,
    pub check_errors: u64,
    pub retry_attempts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub system: SystemMetrics,
    pub requests: RequestMetrics,
    pub recovery: RecoveryStats,
    pub monitoring: MonitoringState,
}

/// Overall health: GET /health
///
/// 200 for healthy and warning, 503 for error.
pub async fn health(State(state): State<AppState>) -> Response {
    let metrics = state.checker.get_metrics().await;
    let snapshot = metrics.snapshot;

    let dependencies = snapshot
        .dependencies
        .checks
        .iter()
        .map(|check| (check.kind.as_str().to_string(), check.state))
        .collect();

    let status_code = match snapshot.status {
        HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Warning => StatusCode::OK,
    };

    let response = HealthResponse {
        status: snapshot.status,
        timestamp: Utc::now(),
        uptime_seconds: snapshot.uptime_seconds,
        dependencies,
        snapshot,
    };
    (status_code, Json(response)).into_response()
}

/// Liveness probe: GET /health/live
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
        timestamp: Utc::now(),
    })
}

/// Aggregated metrics: GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let monitoring = state.checker.get_metrics().await;
    let snapshot = monitoring.snapshot;

    Json(MetricsResponse {
        timestamp: Utc::now(),
        system: SystemMetrics {
            status: snapshot.status,
            uptime_seconds: snapshot.uptime_seconds,
            memory: snapshot.memory,
            cpu_percent: snapshot.cpu_percent,
            average_response_time_ms: snapshot.average_response_time_ms,
            last_check_duration_ms: snapshot.last_check_duration_ms,
        },
        requests: state.requests.metrics(),
        recovery: state.recovery.get_recovery_stats(),
        monitoring: MonitoringState {
            is_running: monitoring.is_running,
            check_errors: monitoring.error_count,
            retry_attempts: monitoring.retry_attempts,
        },
    })
}
