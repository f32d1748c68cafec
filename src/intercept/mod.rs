//! Interception pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Transport (plain request, CONNECT, or decrypted tunnel request)
//!     → request.rs (InterceptedRequest: explicit target + Host header)
//!     → pipeline.rs (pick candidate, normalize, query AllowList)
//!     → PolicyDecision::Allow            → transport forwards unmodified
//!     → PolicyDecision::Deny             → denial.rs artifact returned instead
//! ```
//!
//! # Design Decisions
//! - Stateless per request; the allow-list and renderer are read-only
//! - Explicit target beats the Host header: it is where bytes actually go
//! - Fail closed: no usable host means Deny, never Allow

pub mod denial;
pub mod pipeline;
pub mod request;

pub use denial::{DenialArtifact, DenialFormat, DenialRenderer};
pub use pipeline::{DenyReason, Interceptor, Pipeline, PolicyDecision};
pub use request::{InterceptedRequest, RequestMode};
