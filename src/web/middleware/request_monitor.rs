//! # Request Monitoring Middleware
//!
//! Feeds every request into the [`RequestMonitor`](crate::monitor::RequestMonitor).
//! If the inner future is dropped before a response exists the timer records
//! a transport error.
//!
//! Requests are counted under axum's [`MatchedPath`] template so path
//! parameters never create new counter keys.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::request_id::RequestId;
use crate::web::state::AppState;

pub async fn track_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default();

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());

    let timer = state
        .requests
        .begin(request_id, request.method().as_str(), route.as_deref());

    let response = next.run(request).await;
    timer.complete(response.status().as_u16());
    response
}
