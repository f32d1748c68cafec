//! Forwarding of allowed requests to their origin.
//!
//! # Responsibilities
//! - Build the absolute upstream URI for a request from the approved host
//! - Strip hop-by-hop headers in both directions
//! - Map upstream failures to 502 and timeouts to 504

use std::collections::HashSet;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, uri::Scheme, HeaderMap, HeaderValue, Request, Response, StatusCode, Uri, Version},
    response::IntoResponse,
};

use crate::http::server::ProxyState;
use crate::observability::metrics;

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Authority for a host the pipeline approved, never the raw one a client sent.
pub fn upstream_authority(host: &str, port: Option<u16>) -> String {
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

/// Absolute URI for `uri` sent to `authority` over `scheme`, keeping path and query.
pub fn upstream_uri(uri: &Uri, authority: &str, scheme: Scheme) -> Option<Uri> {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path)
        .build()
        .ok()
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: HashSet<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    for name in HOP_BY_HOP_HEADERS.iter().copied() {
        headers.remove(name);
    }
    for name in named {
        headers.remove(name.as_str());
    }
}

/// Send an allowed request upstream and relay the response.
///
/// `req` must already carry an absolute URI; its Host header is rewritten to
/// match that URI.
pub async fn forward(mut req: Request<Body>, state: &ProxyState) -> Response<Body> {
    strip_hop_by_hop(req.headers_mut());
    if let Some(host) = req
        .uri()
        .authority()
        .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    {
        req.headers_mut().insert(header::HOST, host);
    }
    // The pooled client picks h1 or h2 per origin; inbound h2 must not leak through.
    *req.version_mut() = Version::HTTP_11;

    let uri = req.uri().clone();
    let timeout = Duration::from_secs(state.timeouts.request_secs);

    match tokio::time::timeout(timeout, state.client.request(req)).await {
        Ok(Ok(response)) => {
            let status = response.status();
            tracing::debug!(uri = %uri, status = %status, "Upstream responded");
            metrics::record_upstream(status.as_u16());

            let mut response = response.map(Body::new);
            strip_hop_by_hop(response.headers_mut());
            response
        }
        Ok(Err(e)) => {
            tracing::warn!(uri = %uri, error = %e, "Upstream request failed");
            metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16());
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::warn!(uri = %uri, timeout_secs = state.timeouts.request_secs, "Upstream request timed out");
            metrics::record_upstream(StatusCode::GATEWAY_TIMEOUT.as_u16());
            (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out").into_response()
        }
    }
}
