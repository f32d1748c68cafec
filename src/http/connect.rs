//! CONNECT tunnel handling.
//!
//! # Responsibilities
//! - Answer an allowed CONNECT and take over the upgraded connection
//! - MITM enabled: terminate TLS with a minted leaf certificate and serve the
//!   decrypted requests, each one re-checked by the interception pipeline
//! - MITM disabled: relay raw bytes to the target

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{uri::Scheme, Method, Request, Response, StatusCode},
    response::IntoResponse,
};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::upgrade::Upgraded;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::http::error::ProxyError;
use crate::http::forward::{forward, upstream_authority, upstream_uri};
use crate::http::server::ProxyState;
use crate::intercept::{InterceptedRequest, PolicyDecision};
use crate::observability::metrics;
use crate::policy::split_host_port;
use crate::tls::CertificateAuthority;

const DEFAULT_TUNNEL_PORT: u16 = 443;

/// Accept an allowed CONNECT. `host` is the normalized host the pipeline approved.
///
/// The 200 response is returned immediately; hyper hands over the connection
/// once it has been written, and the tunnel runs in its own task.
pub fn handle_connect(req: Request<Incoming>, host: String, state: Arc<ProxyState>) -> Response<Body> {
    let Some((_, port)) = req.uri().authority().and_then(|a| split_host_port(a.as_str())) else {
        return (StatusCode::BAD_REQUEST, "CONNECT target must be host:port").into_response();
    };
    let port = port.unwrap_or(DEFAULT_TUNNEL_PORT);
    let guard = state.tracker.track_tunnel();

    tokio::spawn(
        async move {
            let _guard = guard;
            let upgraded = match hyper::upgrade::on(req).await {
                Ok(upgraded) => upgraded,
                Err(e) => {
                    tracing::warn!(error = %e, "CONNECT upgrade failed");
                    return;
                }
            };

            let result = match state.ca.clone() {
                Some(ca) => {
                    let tunnel_authority = upstream_authority(&host, Some(port));
                    intercept_tunnel(upgraded, tunnel_authority, &host, ca, state).await
                }
                None => {
                    let connect_timeout = Duration::from_secs(state.timeouts.connect_secs);
                    relay_tunnel(upgraded, &host, port, connect_timeout).await
                }
            };
            if let Err(e) = result {
                tracing::warn!(host = %host, error = %e, "Tunnel ended with error");
            }
        }
        .in_current_span(),
    );

    Response::new(Body::empty())
}

/// Relay bytes between the client and `host:port` without inspection.
pub async fn relay_tunnel(
    upgraded: Upgraded,
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<(), ProxyError> {
    let mut upstream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| ProxyError::ConnectTimeout(format!("{}:{}", host, port)))??;
    metrics::record_tunnel("raw");

    let mut client = TokioIo::new(upgraded);
    let (sent, received) = tokio::io::copy_bidirectional(&mut client, &mut upstream).await?;
    tracing::debug!(host = %host, port, sent, received, "Tunnel closed");
    Ok(())
}

/// Terminate TLS on the tunnel and serve the decrypted requests.
///
/// `tunnel_authority` is built from the approved host, so it is where every
/// decrypted request goes.
async fn intercept_tunnel(
    upgraded: Upgraded,
    tunnel_authority: String,
    host: &str,
    ca: Arc<CertificateAuthority>,
    state: Arc<ProxyState>,
) -> Result<(), ProxyError> {
    let acceptor = TlsAcceptor::from(ca.server_config_for(host)?);
    let stream = acceptor.accept(TokioIo::new(upgraded)).await?;
    metrics::record_tunnel("mitm");
    tracing::debug!(host = %host, "TLS intercepted");

    let tunnel_authority = Arc::new(tunnel_authority);
    let service = service_fn(move |req: Request<Incoming>| {
        let state = state.clone();
        let tunnel_authority = tunnel_authority.clone();
        async move { Ok::<_, Infallible>(handle_tunneled(req, &tunnel_authority, state).await) }
    });

    ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
        .map_err(ProxyError::Connection)
}

/// One request decrypted from an intercepted tunnel.
///
/// The tunnel authority is both the checked host and the upstream destination,
/// whatever the inner Host header says.
async fn handle_tunneled(
    req: Request<Incoming>,
    tunnel_authority: &str,
    state: Arc<ProxyState>,
) -> Response<Body> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "tunneled_request",
        %request_id,
        method = %req.method(),
        tunnel = %tunnel_authority,
    );

    async move {
        if req.method() == Method::CONNECT {
            return (StatusCode::METHOD_NOT_ALLOWED, "Nested CONNECT not supported").into_response();
        }

        let view = InterceptedRequest::from_tunneled(tunnel_authority, &req);
        if let PolicyDecision::Deny { artifact, .. } = state.interceptor.intercept(&view) {
            return artifact.into_response();
        }

        let Some(uri) = upstream_uri(req.uri(), tunnel_authority, Scheme::HTTPS) else {
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        };
        let mut req = req.map(Body::new);
        *req.uri_mut() = uri;
        forward(req, &state).await
    }
    .instrument(span)
    .await
}
