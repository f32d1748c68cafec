//! Decrypting interception support.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     mitm.ca_cert_path / ca_key_path
//!     → ca.rs (load, or generate and persist)
//!
//! Allowed CONNECT to host:port:
//!     → ca.rs (mint or reuse leaf cert for host, signed by the CA)
//!     → rustls::ServerConfig for the tunnel
//!     → TLS terminated, inner requests go back through the pipeline
//! ```
//!
//! # Design Decisions
//! - One ServerConfig per host, cached for the process lifetime
//! - The CA certificate is sent in the chain so clients only need to trust the root

pub mod ca;

pub use ca::{CaError, CertificateAuthority};

/// Install the process-wide rustls crypto provider.
///
/// Safe to call more than once; later calls are no-ops.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
