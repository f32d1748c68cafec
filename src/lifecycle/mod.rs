//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → crypto provider → metrics → HttpServer (CA, pipeline)
//!     → bind listener → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Listener binds last so traffic only arrives once the pipeline exists

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
