//! # Web API Route Definitions
//!
//! Health and metrics routes are public; admin routes sit behind
//! [`require_admin`](crate::web::middleware::auth::require_admin).

use axum::routing::{get, post, put};
use axum::Router;

use crate::web::handlers;
use crate::web::state::AppState;

/// Health and metrics routes
///
/// - `/health` - overall status, 503 when the snapshot reads error
/// - `/health/live` - liveness probe, always 200
/// - `/metrics` - system, request, error and recovery aggregates
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/live", get(handlers::health::liveness))
        .route("/metrics", get(handlers::health::metrics))
}

/// Administrative routes, nested under `/admin`
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/monitoring/start", post(handlers::admin::start_monitoring))
        .route("/monitoring/stop", post(handlers::admin::stop_monitoring))
        .route(
            "/thresholds",
            get(handlers::admin::get_thresholds).put(handlers::admin::update_thresholds),
        )
        .route("/recovery", put(handlers::admin::set_recovery_enabled))
        .route("/recovery/history", get(handlers::admin::recovery_history))
        .route("/recovery/stats", get(handlers::admin::recovery_stats))
        .route("/recovery/:kind", post(handlers::admin::trigger_recovery))
        .route("/audit/events", get(handlers::admin::audit_events))
        .route("/audit/stats", get(handlers::admin::audit_stats))
        .route("/alerts", get(handlers::admin::recent_alerts))
}
