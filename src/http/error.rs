//! Transport error type.

use crate::net::ListenerError;
use crate::tls::CaError;

/// Errors raised by the proxy transport.
///
/// Per-connection errors are logged where they happen; only startup and
/// accept-loop failures propagate out of [`crate::http::HttpServer::run`].
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("certificate authority: {0}")]
    Ca(#[from] CaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upstream connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("connection error: {0}")]
    Connection(Box<dyn std::error::Error + Send + Sync>),
}
