//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack)
//!     → middleware/observe.rs (request ID, bound logger, timing)
//!     → handlers.rs (/health, /metrics, /events, fallback)
//!     → middleware/observe.rs (record observation)
//!     → Send to client (x-request-id echoed)
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::{resolve_request_id, RequestContext, RequestId, X_REQUEST_ID};
pub use server::{apply_layers, AppState, HttpServer};
