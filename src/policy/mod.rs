//! Domain policy subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     policy.allowed_domains (config)
//!     → host.rs (normalize each entry)
//!     → allow_list.rs (dedup into a frozen set)
//!     → Arc<AllowList> shared with the interception pipeline
//!
//! Per request:
//!     raw authority ("Mail.Google.com:443")
//!     → host.rs (strip port, lowercase)
//!     → allow_list.rs (exact or dot-bounded suffix lookup)
//!     → bool
//! ```
//!
//! # Design Decisions
//! - Immutable after construction; no locking on the hot path
//! - One normalization routine for entries and request hosts
//! - Subdomain matching is bounded by a `.`: `evilgoogle.com` never matches `google.com`

pub mod allow_list;
pub mod host;

pub use allow_list::AllowList;
pub use host::{normalize_host, split_host_port};
