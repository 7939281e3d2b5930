//! Route handlers.
//!
//! Handlers receive the per-request `RequestContext` inserted by the observe
//! middleware and never record metrics themselves.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::lifecycle::uptime::process_uptime;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Seconds since process start.
    pub uptime: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventAck {
    pub received: bool,
    pub trace: String,
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        uptime: process_uptime().as_secs_f64(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Accept a client analytics event and log it.
pub async fn receive_event(Extension(ctx): Extension<RequestContext>, body: Bytes) -> Response {
    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                ctx.logger.warn("event_rejected", json!({ "error": e.to_string() }));
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "invalid JSON body" })),
                )
                    .into_response();
            }
        }
    };

    ctx.logger.info("event_received", json!({ "payload": payload }));

    (
        StatusCode::ACCEPTED,
        Json(EventAck {
            received: true,
            trace: ctx.request_id.to_string(),
        }),
    )
        .into_response()
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}
