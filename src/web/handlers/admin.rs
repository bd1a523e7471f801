//! # Administrative Handlers
//!
//! Privileged operations: monitoring lifecycle, alert thresholds, the recovery
//! switch, manual recovery and read access to alert, recovery and audit
//! history. Every mutating call is written to the audit log.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::audit::{
    AuditCategory, AuditEvent, AuditFilter, AuditLevel, AuditStats, NewAuditEvent,
};
use crate::health::{Alert, AlertThresholds, ThresholdUpdate};
use crate::recovery::{FailureKind, RecoveryAttempt, RecoveryStats};
use crate::web::errors::ApiError;
use crate::web::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonitoringStatusResponse {
    pub running: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecoveryToggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualRecoveryResponse {
    pub failure_kind: FailureKind,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

fn record_admin_action(state: &AppState, action: &str, details: serde_json::Value) {
    state.audit.log_event(
        NewAuditEvent::new(AuditLevel::Info, AuditCategory::System, action)
            .actor("admin")
            .details(details),
    );
}

/// POST /admin/monitoring/start
pub async fn start_monitoring(State(state): State<AppState>) -> Json<MonitoringStatusResponse> {
    state.checker.start();
    record_admin_action(&state, "monitoring_started", json!({}));
    Json(MonitoringStatusResponse {
        running: state.checker.is_running(),
    })
}

/// POST /admin/monitoring/stop
pub async fn stop_monitoring(State(state): State<AppState>) -> Json<MonitoringStatusResponse> {
    state.checker.stop().await;
    record_admin_action(&state, "monitoring_stopped", json!({}));
    Json(MonitoringStatusResponse {
        running: state.checker.is_running(),
    })
}

/// GET /admin/thresholds
pub async fn get_thresholds(State(state): State<AppState>) -> Json<AlertThresholds> {
    Json(state.checker.thresholds())
}

/// PUT /admin/thresholds
///
/// Partial update merged into the current thresholds. Any invalid value
/// rejects the whole update.
pub async fn update_thresholds(
    State(state): State<AppState>,
    Json(update): Json<ThresholdUpdate>,
) -> Result<Json<AlertThresholds>, ApiError> {
    let thresholds = state.checker.update_thresholds(&update)?;
    record_admin_action(&state, "thresholds_updated", json!({ "update": update }));
    Ok(Json(thresholds))
}

/// PUT /admin/recovery
pub async fn set_recovery_enabled(
    State(state): State<AppState>,
    Json(toggle): Json<RecoveryToggle>,
) -> Json<RecoveryToggle> {
    state.recovery.set_enabled(toggle.enabled);
    record_admin_action(&state, "recovery_toggled", json!({ "enabled": toggle.enabled }));
    Json(RecoveryToggle {
        enabled: state.recovery.is_enabled(),
    })
}

/// GET /admin/recovery/history (newest first)
pub async fn recovery_history(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<RecoveryAttempt>> {
    let history = state
        .recovery
        .get_recovery_history()
        .into_iter()
        .rev()
        .take(query.limit())
        .collect();
    Json(history)
}

/// GET /admin/recovery/stats
pub async fn recovery_stats(State(state): State<AppState>) -> Json<RecoveryStats> {
    Json(state.recovery.get_recovery_stats())
}

/// POST /admin/recovery/:kind
pub async fn trigger_recovery(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<ManualRecoveryResponse>, ApiError> {
    let failure_kind: FailureKind = kind.parse()?;
    info!(failure_kind = %failure_kind, "Manual recovery requested");
    record_admin_action(
        &state,
        "manual_recovery_requested",
        json!({ "failure_kind": failure_kind }),
    );

    let success = state
        .recovery
        .attempt_recovery(
            failure_kind,
            "manual recovery requested by operator",
            json!({ "source": "admin" }),
        )
        .await;

    Ok(Json(ManualRecoveryResponse {
        failure_kind,
        success,
    }))
}

/// GET /admin/audit/events
pub async fn audit_events(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> Json<Vec<AuditEvent>> {
    Json(state.audit.get_events(&filter))
}

/// GET /admin/audit/stats
pub async fn audit_stats(State(state): State<AppState>) -> Json<AuditStats> {
    Json(state.audit.get_audit_stats())
}

/// GET /admin/alerts (newest first)
pub async fn recent_alerts(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<Alert>> {
    Json(state.checker.recent_alerts(query.limit()))
}
