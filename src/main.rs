//! egress-proxy
//!
//! A forward HTTP/HTTPS proxy that only lets traffic reach an allow-list of
//! domains and their subdomains.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    EGRESS PROXY                       │
//!   Client request     │  ┌─────────┐   ┌─────────┐   ┌───────────────────┐   │
//!   ───────────────────┼─▶│   net   │──▶│  http   │──▶│    intercept      │   │
//!   (GET http://..,    │  │listener │   │ server  │   │ pipeline + policy │   │
//!    CONNECT h:443)    │  └─────────┘   └─────────┘   └─────────┬─────────┘   │
//!                      │                                  allow │ deny        │
//!                      │                     ┌──────────────────┴──────┐      │
//!                      │                     ▼                         ▼      │
//!                      │             ┌──────────────┐          ┌─────────────┐│
//!                      │             │ forward /    │          │ 403 denial  ││
//!                      │             │ connect+tls  │          │  artifact   ││
//!                      │             └──────┬───────┘          └─────────────┘│
//!                      └────────────────────┼─────────────────────────────────┘
//!                                           ▼
//!                                     Origin server
//! ```

use std::path::PathBuf;

use clap::Parser;

use egress_proxy::config::{parse_config, validate_config, ConfigError, ProxyConfig};
use egress_proxy::intercept::DenialFormat;
use egress_proxy::lifecycle::startup;
use egress_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "egress-proxy", version)]
#[command(about = "Forward HTTP/HTTPS proxy enforcing a destination allow-list", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Listen address, overrides listener.bind_address
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Additional allowed domain (repeatable)
    #[arg(short, long = "allow", value_name = "DOMAIN")]
    allow: Vec<String>,

    /// Relay CONNECT tunnels without decrypting them
    #[arg(long)]
    no_mitm: bool,

    /// Render denial pages as HTML
    #[arg(long)]
    html: bool,
}

impl Cli {
    fn apply(self, config: &mut ProxyConfig) {
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        config.policy.allowed_domains.extend(self.allow);
        if self.no_mitm {
            config.mitm.enabled = false;
        }
        if self.html {
            config.denial.format = DenialFormat::Html;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => parse_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config.observability);

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(ConfigError::Validation(errors).into());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        "egress-proxy starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
