//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Accept client connections and serve HTTP/1.1 and HTTP/2 on them
//! - Run every request and CONNECT through the interception pipeline
//! - Write denial artifacts for blocked requests
//! - Forward allowed requests or open tunnels for allowed CONNECTs
//! - Drain in-flight connections on shutdown

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{uri::Scheme, Method, Request, Response, StatusCode},
    response::IntoResponse,
};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder as ConnBuilder,
};
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::{ProxyConfig, TimeoutConfig};
use crate::http::connect::handle_connect;
use crate::http::error::ProxyError;
use crate::http::forward::{forward, upstream_authority, upstream_uri};
use crate::intercept::{DenialRenderer, InterceptedRequest, Interceptor, Pipeline, PolicyDecision};
use crate::net::{ConnectionId, ConnectionTracker, Listener, ListenerError};
use crate::policy::{split_host_port, AllowList};
use crate::tls::CertificateAuthority;

/// Upstream client shared by all connections.
pub type UpstreamClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>;

/// How long shutdown waits for open connections and tunnels.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state injected into every connection task.
pub struct ProxyState {
    pub interceptor: Arc<dyn Interceptor>,
    pub client: UpstreamClient,
    pub ca: Option<Arc<CertificateAuthority>>,
    pub timeouts: TimeoutConfig,
    pub tracker: ConnectionTracker,
}

/// HTTP server for the egress proxy.
pub struct HttpServer {
    state: Arc<ProxyState>,
}

impl HttpServer {
    /// Build the server from configuration: allow-list, denial renderer and,
    /// when MITM is enabled, the certificate authority.
    pub async fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let allow_list = Arc::new(AllowList::new(&config.policy.allowed_domains));
        if allow_list.is_empty() {
            tracing::warn!("Allow-list is empty; every request will be denied");
        } else {
            tracing::info!(
                count = allow_list.len(),
                domains = %allow_list.domains().join(", "),
                "Allow-list loaded; these domains and their subdomains are permitted"
            );
        }
        let renderer = DenialRenderer::new(
            config.denial.format,
            config.denial.title.clone(),
            config.denial.message.clone(),
        );
        let pipeline = Arc::new(Pipeline::new(allow_list, renderer));

        let ca = if config.mitm.enabled {
            let ca = CertificateAuthority::load_or_generate(
                Path::new(&config.mitm.ca_cert_path),
                Path::new(&config.mitm.ca_key_path),
                &config.mitm.ca_common_name,
            )
            .await?;
            Some(Arc::new(ca))
        } else {
            None
        };

        Ok(Self::with_interceptor(config, pipeline, ca))
    }

    /// Build the server around any interceptor.
    pub fn with_interceptor(
        config: &ProxyConfig,
        interceptor: Arc<dyn Interceptor>,
        ca: Option<Arc<CertificateAuthority>>,
    ) -> Self {
        let state = ProxyState {
            interceptor,
            client: build_client(&config.timeouts),
            ca,
            timeouts: config.timeouts.clone(),
            tracker: ConnectionTracker::new(),
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// Shared state, for inspection.
    pub fn state(&self) -> &Arc<ProxyState> {
        &self.state
    }

    /// Run the accept loop until `shutdown` fires, then drain connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ProxyError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mitm = self.state.ca.is_some(),
            "HTTP proxy starting"
        );

        let builder = ConnBuilder::new(TokioExecutor::new());

        loop {
            let (stream, peer_addr, permit) = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
            };

            let guard = self.state.tracker.track();
            let connection_id = guard.id();
            let state = self.state.clone();
            let builder = builder.clone();
            let mut conn_shutdown = shutdown.resubscribe();
            let span = tracing::debug_span!("connection", id = %connection_id, peer = %peer_addr);

            tokio::spawn(
                async move {
                    let _permit = permit;
                    let _guard = guard;
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move {
                            Ok::<_, Infallible>(handle_request(req, state, connection_id).await)
                        }
                    });

                    let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                    tokio::pin!(conn);
                    let result = tokio::select! {
                        result = conn.as_mut() => result,
                        _ = conn_shutdown.recv() => {
                            // Idle keep-alive connections close now; in-flight requests finish.
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                    };
                    if let Err(e) = result {
                        tracing::debug!(error = %e, "Connection error");
                    }
                }
                .instrument(span),
            );
        }

        if self.state.tracker.drain(DRAIN_TIMEOUT).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                active = self.state.tracker.active_count(),
                "Drain timeout elapsed with connections still open"
            );
        }
        tracing::info!("HTTP proxy stopped");
        Ok(())
    }
}

fn build_client(timeouts: &TimeoutConfig) -> UpstreamClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

    let builder = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "Native root certificates unavailable, using bundled roots");
            HttpsConnectorBuilder::new().with_webpki_roots()
        }
    };
    let https = builder
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

/// Entry point for every request received on a client connection.
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ProxyState>,
    connection_id: ConnectionId,
) -> Response<Body> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        connection_id = %connection_id,
        method = %req.method(),
        uri = %req.uri(),
    );

    async move {
        let view = InterceptedRequest::from_request(&req);
        let host = match state.interceptor.intercept(&view) {
            PolicyDecision::Allow { host } => host,
            PolicyDecision::Deny { artifact, .. } => return artifact.into_response(),
        };

        if req.method() == Method::CONNECT {
            return handle_connect(req, host, state);
        }

        let Some(uri) = http_target(&req, &view, &host) else {
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        };
        let mut req = req.map(Body::new);
        *req.uri_mut() = uri;
        forward(req, &state).await
    }
    .instrument(span)
    .await
}

/// Absolute upstream URI of a plaintext request.
///
/// The authority is rebuilt from `host`, the normalized host the pipeline
/// approved, plus the port of the same candidate; the raw authority or Host
/// header as sent is never reused.
fn http_target<B>(
    req: &Request<B>,
    view: &InterceptedRequest,
    host: &str,
) -> Option<axum::http::Uri> {
    let port = view
        .candidate_host()
        .and_then(split_host_port)
        .and_then(|(_, port)| port);
    let scheme = req.uri().scheme().cloned().unwrap_or(Scheme::HTTP);
    upstream_uri(req.uri(), &upstream_authority(host, port), scheme)
}
