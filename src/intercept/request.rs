//! Read-only request view handed to the pipeline.

use axum::http::{header, Method, Request};

/// How the request reached the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Plaintext proxied request (absolute-form or origin-form).
    Http,
    /// CONNECT tunnel establishment.
    Connect,
    /// Request decrypted from inside an intercepted CONNECT tunnel.
    Tunneled,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Http => "http",
            RequestMode::Connect => "connect",
            RequestMode::Tunneled => "tunneled",
        }
    }
}

impl std::fmt::Display for RequestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a request the policy cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    mode: RequestMode,
    explicit_target: Option<String>,
    host_header: Option<String>,
}

impl InterceptedRequest {
    pub fn new(
        mode: RequestMode,
        explicit_target: Option<String>,
        host_header: Option<String>,
    ) -> Self {
        Self {
            mode,
            explicit_target: explicit_target.filter(|t| !t.trim().is_empty()),
            host_header: host_header.filter(|h| !h.trim().is_empty()),
        }
    }

    /// View a request received directly by the proxy listener.
    ///
    /// CONNECT requests carry their target in authority-form; proxied plain
    /// requests carry it in the absolute URI. Origin-form requests only have
    /// the Host header.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let mode = if req.method() == Method::CONNECT {
            RequestMode::Connect
        } else {
            RequestMode::Http
        };
        let explicit_target = req.uri().authority().map(|a| a.as_str().to_string());
        Self::new(mode, explicit_target, host_header(req))
    }

    /// View a request decrypted from a tunnel opened to `tunnel_authority`.
    ///
    /// The tunnel authority is what the proxy will connect to, so it is the
    /// explicit target regardless of what the inner request claims.
    pub fn from_tunneled<B>(tunnel_authority: &str, req: &Request<B>) -> Self {
        Self::new(
            RequestMode::Tunneled,
            Some(tunnel_authority.to_string()),
            host_header(req),
        )
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn explicit_target(&self) -> Option<&str> {
        self.explicit_target.as_deref()
    }

    pub fn host_header(&self) -> Option<&str> {
        self.host_header.as_deref()
    }

    /// The authority the decision is taken on: explicit target first.
    pub fn candidate_host(&self) -> Option<&str> {
        self.explicit_target().or_else(|| self.host_header())
    }
}

fn host_header<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}
