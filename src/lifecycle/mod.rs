//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build logger and recorder → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Trigger broadcast → Stop accepting → Drain → Exit
//!
//! Uptime (uptime.rs):
//!     Process start pinned first thing in main → reported by /health
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

pub mod shutdown;
pub mod signals;
pub mod uptime;

pub use shutdown::Shutdown;
