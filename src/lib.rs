//! SolarLink application server: request correlation, structured logging
//! and in-process Prometheus metrics behind a small Axum HTTP surface.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
