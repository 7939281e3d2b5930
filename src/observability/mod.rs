//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → http::request (resolve or generate correlation ID)
//!     → logging.rs (request-bound JSON logger)
//!     → [handler runs]
//!     → metrics.rs (record method, route, status, duration)
//!
//! Consumers:
//!     → stdout (line-delimited JSON events)
//!     → GET /metrics (Prometheus scrape)
//!     → stderr (framework diagnostics via tracing.rs)
//! ```
//!
//! # Design Decisions
//! - Instrumentation is fail-open: nothing here returns an error to callers
//! - Request ID flows through every event emitted while handling a request
//! - Metrics state is a single synchronized recorder, shared via Arc

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{Fields, Level, LogSink, MemorySink, StdoutSink, StructuredLogger, SERVICE_NAME};
pub use metrics::{HistogramBucket, MetricsRecorder, Observation};
