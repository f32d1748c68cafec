//! Policy decision for each intercepted request.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use crate::intercept::denial::{DenialArtifact, DenialRenderer};
use crate::intercept::request::InterceptedRequest;
use crate::observability::metrics;
use crate::policy::{normalize_host, AllowList};

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The host is well formed but not on the allow-list.
    NotAllowed(String),
    /// Neither an explicit target nor a Host header was present.
    MissingHost,
    /// The candidate authority did not normalize to a hostname.
    MalformedHost(String),
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotAllowed(_) => "not_allowed",
            DenyReason::MissingHost => "missing_host",
            DenyReason::MalformedHost(_) => "malformed_host",
        }
    }

    /// The host value shown to the client.
    pub fn host(&self) -> &str {
        match self {
            DenyReason::NotAllowed(host) | DenyReason::MalformedHost(host) => host,
            DenyReason::MissingHost => "",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NotAllowed(host) => write!(f, "{} is not on the allow-list", host),
            DenyReason::MissingHost => write!(f, "request carries no target host"),
            DenyReason::MalformedHost(raw) => write!(f, "malformed target host {:?}", raw),
        }
    }
}

/// Outcome of intercepting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Forward unmodified. Carries the normalized host that was checked.
    Allow { host: String },
    /// Do not contact the upstream; answer with `artifact` instead.
    Deny {
        reason: DenyReason,
        artifact: DenialArtifact,
    },
}

impl PolicyDecision {
    pub fn is_forward(&self) -> bool {
        matches!(self, PolicyDecision::Allow { .. })
    }

    /// The response to send in place of forwarding, if any.
    pub fn substitute(&self) -> Option<&DenialArtifact> {
        match self {
            PolicyDecision::Allow { .. } => None,
            PolicyDecision::Deny { artifact, .. } => Some(artifact),
        }
    }

    /// Consume a denial into its response.
    pub fn into_substitute_response(self) -> Option<Response> {
        match self {
            PolicyDecision::Allow { .. } => None,
            PolicyDecision::Deny { artifact, .. } => Some(artifact.into_response()),
        }
    }
}

/// The decision hook the transport calls for every request and tunnel.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, request: &InterceptedRequest) -> PolicyDecision;
}

/// Allow-list backed interceptor.
#[derive(Debug, Clone)]
pub struct Pipeline {
    allow_list: Arc<AllowList>,
    renderer: DenialRenderer,
}

impl Pipeline {
    pub fn new(allow_list: Arc<AllowList>, renderer: DenialRenderer) -> Self {
        Self { allow_list, renderer }
    }

    fn decide(&self, request: &InterceptedRequest) -> Result<String, DenyReason> {
        let candidate = request.candidate_host().ok_or(DenyReason::MissingHost)?;
        let host = normalize_host(candidate)
            .ok_or_else(|| DenyReason::MalformedHost(candidate.to_string()))?;

        if self.allow_list.matches_normalized(&host) {
            Ok(host)
        } else {
            Err(DenyReason::NotAllowed(host))
        }
    }
}

impl Interceptor for Pipeline {
    fn intercept(&self, request: &InterceptedRequest) -> PolicyDecision {
        let mode = request.mode();
        match self.decide(request) {
            Ok(host) => {
                tracing::debug!(mode = %mode, host = %host, "Request allowed");
                metrics::record_decision(mode.as_str(), "allow");
                PolicyDecision::Allow { host }
            }
            Err(reason) => {
                tracing::info!(
                    mode = %mode,
                    host = %reason.host(),
                    reason = reason.as_str(),
                    "Request denied"
                );
                metrics::record_decision(mode.as_str(), "deny");
                let artifact = self.renderer.render(reason.host());
                PolicyDecision::Deny { reason, artifact }
            }
        }
    }
}
