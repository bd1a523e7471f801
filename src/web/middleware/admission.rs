//! # Admission Gate
//!
//! Request-time load shedding driven by the cached health snapshot.
//!
//! - Resource guard: above the memory ceiling every route outside the
//!   allow-list is rejected.
//! - Status gate (gated prefixes only): `error` rejects, `warning` passes with
//!   advisory headers, `healthy` passes untouched.
//!
//! Both checks read the snapshot without blocking and never run probes.
//! Rejections carry a Retry-After hint; nothing is retried server-side.

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::config::AdmissionConfig;
use crate::health::HealthStatus;
use crate::web::errors::ApiError;
use crate::web::state::AppState;

pub const HEALTH_STATUS_HEADER: &str = "x-health-status";
pub const HEALTH_ADVISORY_HEADER: &str = "x-health-advisory";

/// Outcome of evaluating one request against the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit,
    AdmitWithAdvisory,
    RejectMemoryPressure,
    RejectUnhealthy,
}

/// Pure decision over the current status and memory reading
pub fn evaluate_admission(
    config: &AdmissionConfig,
    path: &str,
    status: HealthStatus,
    memory_percent: Option<f64>,
) -> AdmissionDecision {
    let over_ceiling = memory_percent.is_some_and(|p| p > config.memory_ceiling_percent);
    if over_ceiling && !matches_any(path, &config.allow_list) {
        return AdmissionDecision::RejectMemoryPressure;
    }

    if !matches_any(path, &config.gated_route_prefixes) {
        return AdmissionDecision::Admit;
    }
    match status {
        HealthStatus::Error => AdmissionDecision::RejectUnhealthy,
        HealthStatus::Warning => AdmissionDecision::AdmitWithAdvisory,
        HealthStatus::Healthy => AdmissionDecision::Admit,
    }
}

/// `path` equals a prefix or continues it at a segment boundary
fn matches_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| {
        path == prefix
            || path
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/') || prefix.ends_with('/'))
    })
}

pub async fn admission_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let config = &state.config.admission;
    let status = state.snapshot.try_status();
    let memory_percent = state.snapshot.try_memory_percent();
    let path = request.uri().path().to_string();

    match evaluate_admission(config, &path, status, memory_percent) {
        AdmissionDecision::Admit => next.run(request).await,
        AdmissionDecision::AdmitWithAdvisory => {
            debug!(path = %path, "Admitting request with degraded-health advisory");
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(HEALTH_STATUS_HEADER, HeaderValue::from_static("warning"));
            headers.insert(
                HEALTH_ADVISORY_HEADER,
                HeaderValue::from_static("service degraded, responses may be slow"),
            );
            response
        }
        AdmissionDecision::RejectMemoryPressure => {
            warn!(
                path = %path,
                memory_percent = memory_percent.unwrap_or_default(),
                ceiling = config.memory_ceiling_percent,
                "Shedding request under memory pressure"
            );
            ApiError::service_unavailable("memory pressure", config.retry_after_seconds)
                .into_response()
        }
        AdmissionDecision::RejectUnhealthy => {
            warn!(path = %path, "Rejecting request while health status is error");
            ApiError::service_unavailable("health status error", config.retry_after_seconds)
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdmissionConfig {
        AdmissionConfig::default()
    }

    #[test]
    fn test_status_gate_applies_to_gated_prefixes_only() {
        let config = config();
        assert_eq!(
            evaluate_admission(&config, "/api/events", HealthStatus::Error, Some(40.0)),
            AdmissionDecision::RejectUnhealthy
        );
        assert_eq!(
            evaluate_admission(&config, "/health", HealthStatus::Error, Some(40.0)),
            AdmissionDecision::Admit
        );
        assert_eq!(
            evaluate_admission(&config, "/apiary", HealthStatus::Error, Some(40.0)),
            AdmissionDecision::Admit
        );
        assert_eq!(
            evaluate_admission(&config, "/api/events", HealthStatus::Warning, None),
            AdmissionDecision::AdmitWithAdvisory
        );
        assert_eq!(
            evaluate_admission(&config, "/api/events", HealthStatus::Healthy, None),
            AdmissionDecision::Admit
        );
    }

    #[test]
    fn test_resource_guard_spares_allow_list() {
        let config = config();
        assert_eq!(
            evaluate_admission(&config, "/api/events", HealthStatus::Healthy, Some(96.0)),
            AdmissionDecision::RejectMemoryPressure
        );
        assert_eq!(
            evaluate_admission(&config, "/admin/thresholds", HealthStatus::Healthy, Some(96.0)),
            AdmissionDecision::RejectMemoryPressure
        );
        assert_eq!(
            evaluate_admission(&config, "/api/auth/login", HealthStatus::Healthy, Some(96.0)),
            AdmissionDecision::Admit
        );
        assert_eq!(
            evaluate_admission(&config, "/health/live", HealthStatus::Healthy, Some(96.0)),
            AdmissionDecision::Admit
        );
        // At the ceiling is still admitted
        assert_eq!(
            evaluate_admission(&config, "/api/events", HealthStatus::Healthy, Some(95.0)),
            AdmissionDecision::Admit
        );
    }
}
