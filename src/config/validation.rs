//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject allow-list entries that are not literal domains
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Duplicate entries are not errors; the allow-list collapses them

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::policy::normalize_host;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("allowed_domains[{index}] is empty")]
    EmptyDomain { index: usize },

    #[error("allowed_domains[{index}] {entry:?}: wildcards are not supported, entries already cover subdomains")]
    WildcardDomain { index: usize, entry: String },

    #[error("allowed_domains[{index}] {entry:?}: must be a bare domain without scheme, port or path")]
    NotBareDomain { index: usize, entry: String },

    #[error("allowed_domains[{index}] {entry:?}: not a valid hostname")]
    InvalidDomain { index: usize, entry: String },

    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be set when MITM is enabled")]
    MissingPath { field: &'static str },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, entry) in config.policy.allowed_domains.iter().enumerate() {
        if let Some(error) = validate_domain(index, entry) {
            errors.push(error);
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_connections" });
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_secs" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.mitm.enabled {
        if config.mitm.ca_cert_path.trim().is_empty() {
            errors.push(ValidationError::MissingPath { field: "mitm.ca_cert_path" });
        }
        if config.mitm.ca_key_path.trim().is_empty() {
            errors.push(ValidationError::MissingPath { field: "mitm.ca_key_path" });
        }
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_domain(index: usize, entry: &str) -> Option<ValidationError> {
    let trimmed = entry.trim();
    if trimmed.is_empty() {
        return Some(ValidationError::EmptyDomain { index });
    }
    if trimmed.contains('*') {
        return Some(ValidationError::WildcardDomain { index, entry: entry.to_string() });
    }
    let bracketed = trimmed.starts_with('[');
    if trimmed.contains('/') || (trimmed.contains(':') && !bracketed) {
        return Some(ValidationError::NotBareDomain { index, entry: entry.to_string() });
    }
    if bracketed && !trimmed.ends_with(']') {
        return Some(ValidationError::NotBareDomain { index, entry: entry.to_string() });
    }
    if normalize_host(trimmed).is_none() {
        return Some(ValidationError::InvalidDomain { index, entry: entry.to_string() });
    }
    None
}
