//! # Web API Module
//!
//! Axum-based HTTP surface of the resilience core.
//!
//! ## Core Components
//!
//! - [`routes`] - route definitions
//! - [`handlers`] - health, metrics and admin handlers
//! - [`middleware`] - request id, request monitoring, admission gate, admin auth
//! - [`state`] - shared application state
//! - [`errors`] - `ApiError` and its HTTP mapping
//!
//! ## Middleware order (outermost first)
//!
//! 1. `TraceLayer`
//! 2. Request id
//! 3. Request monitor (sees rejected requests too)
//! 4. Admission gate
//! 5. Admin auth (admin routes only)
//!
//! Application routes handed to [`create_app_with`] are mounted before the
//! layers, so they are timed, tagged with a request id and pass through the
//! admission gate like the built-in routes. Routers merged onto the returned
//! `Router` afterwards bypass all of that.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use state::AppState;

/// Create the main Axum application with the health, metrics and admin routes
pub fn create_app(app_state: AppState) -> Router {
    create_app_with(app_state, Router::new())
}

/// Create the application with the service's own routes mounted under the
/// shared middleware stack
pub fn create_app_with(app_state: AppState, app_routes: Router<AppState>) -> Router {
    let admin_routes = routes::admin_routes().layer(axum::middleware::from_fn_with_state(
        app_state.clone(),
        middleware::auth::require_admin,
    ));

    Router::new()
        .merge(routes::health_routes())
        .nest("/admin", admin_routes)
        .merge(app_routes)
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::admission::admission_gate,
        ))
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            middleware::request_monitor::track_request,
        ))
        .layer(axum::middleware::from_fn(
            middleware::request_id::add_request_id,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}
