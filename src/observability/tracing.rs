//! Diagnostic tracing.
//!
//! Application events go through `logging::StructuredLogger` on stdout.
//! Framework diagnostics (tower-http request spans, startup details) use the
//! `tracing` ecosystem and are written to stderr so stdout stays pure JSON.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVES: &str = "solarlink_server=info,tower_http=warn";

/// Install the global diagnostic subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_DIRECTIVES.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
