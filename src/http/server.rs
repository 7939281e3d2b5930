//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, observability, request ID, limits)
//! - Bind server to listener and serve until shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::PropagateRequestIdLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::handlers;
use crate::http::middleware::observe_request;
use crate::observability::{MetricsRecorder, StructuredLogger};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub logger: StructuredLogger,
    pub metrics: Arc<MetricsRecorder>,
}

impl AppState {
    pub fn new(logger: StructuredLogger, metrics: Arc<MetricsRecorder>) -> Self {
        Self { logger, metrics }
    }
}

/// HTTP server hosting the health, metrics and events endpoints.
pub struct HttpServer {
    router: Router,
    logger: StructuredLogger,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig, logger: StructuredLogger, metrics: Arc<MetricsRecorder>) -> Self {
        let state = AppState::new(logger.clone(), metrics);
        let routes = Router::new()
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics))
            .route("/events", post(handlers::receive_event))
            .fallback(handlers::not_found);
        Self {
            router: apply_layers(routes, &config, state),
            logger,
        }
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let Self { router, logger } = self;

        logger.info("server_started", json!({ "address": addr.to_string() }));
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        logger.info("server_stopped", ());
        Ok(())
    }
}

/// Wrap `routes` in the middleware stack and bind the state.
///
/// Layers run outermost first; the observe middleware sits outside the
/// panic, limit and timeout layers so their responses are recorded too.
#[allow(deprecated)]
pub fn apply_layers(routes: Router<AppState>, config: &AppConfig, state: AppState) -> Router {
    routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(state.clone(), observe_request))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new())
                .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
                .layer(DefaultBodyLimit::disable())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
        .with_state(state)
}
