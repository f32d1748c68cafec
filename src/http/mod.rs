//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper auto connection, one task per client)
//!     → intercept pipeline (Allow / Deny)
//!     → Deny:    denial artifact written back, upstream never contacted
//!     → Allow:   forward.rs (strip hop-by-hop, send upstream, relay response)
//!     → CONNECT: connect.rs (raw tunnel, or TLS termination + inner requests
//!                back through the pipeline)
//! ```

pub mod connect;
pub mod error;
pub mod forward;
pub mod server;

pub use error::ProxyError;
pub use server::{HttpServer, ProxyState};
