//! Per-request instrumentation.
//!
//! Resolves the correlation ID, hands a request-bound logger to handlers and
//! records every completed request into the metrics recorder, whatever the
//! outcome (handler error, timeout, body limit, panic or unmatched route).

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::http::request::{resolve_request_id, RequestContext, X_REQUEST_ID};
use crate::http::server::AppState;

pub async fn observe_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let request_id = resolve_request_id(request.headers());
    // Written back so the id is echoed on the response.
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        request.headers_mut().insert(X_REQUEST_ID, value);
    }

    let logger = state.logger.for_request(request_id.as_str());
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    request.extensions_mut().insert(RequestContext {
        request_id,
        logger: logger.clone(),
    });

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = state
        .metrics
        .record_request(&method, &route, status.as_u16(), started);

    let fields = json!({
        "method": method,
        "route": route,
        "status": status.as_u16(),
        "durationMs": duration_ms,
    });
    if status.is_server_error() {
        logger.warn("request_failed", &fields);
    }
    logger.debug("request_completed", &fields);

    response
}
