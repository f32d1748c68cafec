//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::intercept::DenialFormat;

/// Root configuration for the egress proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Destination allow-list.
    pub policy: PolicyConfig,

    /// Response returned for blocked requests.
    pub denial: DenialConfig,

    /// Decrypting interception of CONNECT tunnels.
    pub mitm: MitmConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Domain policy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Permitted domains. Each entry also permits all of its subdomains.
    /// An empty list blocks all traffic.
    pub allowed_domains: Vec<String>,
}

/// Denial response configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DenialConfig {
    /// `text` or `html`.
    pub format: DenialFormat,

    /// Page title (HTML format only).
    pub title: String,

    /// Message template; `{host}` is replaced by the rejected host.
    pub message: String,
}

impl Default for DenialConfig {
    fn default() -> Self {
        Self {
            format: DenialFormat::Text,
            title: "Access Denied".to_string(),
            message: "Access Denied: {host} is blocked.".to_string(),
        }
    }
}

/// MITM configuration for CONNECT tunnels.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MitmConfig {
    /// Decrypt CONNECT tunnels so inner requests are checked too.
    /// When disabled, allowed tunnels are relayed as raw bytes.
    pub enabled: bool,

    /// Path to the CA certificate (PEM). Generated if missing.
    pub ca_cert_path: String,

    /// Path to the CA private key (PEM). Generated if missing.
    pub ca_key_path: String,

    /// Common name of a generated CA.
    pub ca_common_name: String,
}

impl Default for MitmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ca_cert_path: "egress-proxy-ca.crt".to_string(),
            ca_key_path: "egress-proxy-ca.key".to_string(),
            ca_common_name: "egress-proxy CA".to_string(),
        }
    }
}

/// Timeout configuration for upstream operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream request timeout (until response headers) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
