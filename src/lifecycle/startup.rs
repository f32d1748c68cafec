//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order from a validated config
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use crate::config::ProxyConfig;
use crate::http::{HttpServer, ProxyError};
use crate::lifecycle::{signals, Shutdown};
use crate::net::Listener;
use crate::observability::metrics;
use crate::tls;

/// Start the proxy and block until it has shut down.
///
/// `config` must already be validated.
pub async fn run(config: ProxyConfig) -> Result<(), ProxyError> {
    tls::install_crypto_provider();

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    log_policy(&config);

    let server = HttpServer::new(&config).await?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await
}

fn log_policy(config: &ProxyConfig) {
    tracing::info!(
        format = ?config.denial.format,
        mitm = config.mitm.enabled,
        "Denial policy configured"
    );
}
