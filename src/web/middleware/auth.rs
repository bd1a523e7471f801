//! # Admin Authentication Middleware
//!
//! Static bearer-token check for the administrative routes. Rejections are
//! written to the audit log so repeated attempts surface in the detectors.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use tracing::{debug, warn};

use crate::audit::{AuditCategory, AuditLevel, NewAuditEvent};
use crate::web::errors::ApiError;
use crate::web::state::AppState;

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        debug!("Admin token not configured - allowing request");
        return Ok(next.run(request).await);
    };

    let presented = extract_bearer_token(request.headers()).map(|token| token == expected);
    if presented == Some(true) {
        return Ok(next.run(request).await);
    }

    let reason = if presented.is_some() {
        "invalid admin token"
    } else {
        "missing admin token"
    };
    warn!(path = %request.uri().path(), reason = reason, "Admin request rejected");

    let headers = request.headers();
    let mut event = NewAuditEvent::new(
        AuditLevel::Warning,
        AuditCategory::Authorization,
        "admin_access_denied",
    )
    .request(request.method().as_str(), request.uri().path())
    .status(401)
    .details(json!({ "reason": reason }));
    if let Some(ip) = client_ip(headers) {
        event = event.ip(ip);
    }
    if let Some(agent) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        event = event.user_agent(agent);
    }
    state.audit.log_event(event);

    Err(ApiError::Unauthorized)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// First hop of `x-forwarded-for`, else `x-real-ip`
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(extract_bearer_token(&headers), Some("s3cret"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.2"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("1.2.3.4"));
    }
}
