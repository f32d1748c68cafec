//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use egress_proxy::config::ProxyConfig;
use egress_proxy::net::Listener;
use egress_proxy::{HttpServer, Shutdown};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const BACKEND_BODY: &str = "hello from backend";

/// A mock origin that answers every request with [`BACKEND_BODY`].
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Number of connections the backend has accepted.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend() -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        let _ = read_head(&mut socket).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            BACKEND_BODY.len(),
                            BACKEND_BODY
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, hits }
}

/// An origin that accepts and reads requests but never answers.
pub async fn start_silent_backend() -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let _ = read_head(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(socket);
            });
        }
    });

    MockBackend { addr, hits }
}

/// An origin that records the first bytes of each connection, then hangs up.
pub struct RecordingBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    first_bytes: Arc<Mutex<Vec<u8>>>,
}

impl RecordingBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// First bytes received on the most recent connection.
    pub fn first_bytes(&self) -> Vec<u8> {
        self.first_bytes.lock().unwrap().clone()
    }
}

pub async fn start_recording_backend() -> RecordingBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let first_bytes = Arc::new(Mutex::new(Vec::new()));
    let (counter, recorded) = (hits.clone(), first_bytes.clone());

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 16];
            if let Ok(n) = socket.read(&mut buf).await {
                *recorded.lock().unwrap() = buf[..n].to_vec();
            }
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    RecordingBackend { addr, hits, first_bytes }
}

/// A running proxy bound to an ephemeral local port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<()>,
}

/// Default test config: ephemeral port, MITM off, given allow-list.
pub fn test_config(domains: &[&str]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.policy.allowed_domains = domains.iter().map(|d| d.to_string()).collect();
    config.mitm.enabled = false;
    config.timeouts.request_secs = 5;
    config.timeouts.connect_secs = 2;
    config
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    egress_proxy::tls::install_crypto_provider();

    let server = HttpServer::new(&config).await.unwrap();
    run_proxy(server, &config).await
}

/// Serve an already built `server` on `config.listener`.
pub async fn run_proxy(server: HttpServer, config: &ProxyConfig) -> TestProxy {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    TestProxy { addr, shutdown, handle }
}

/// HTTP client that sends plain http:// requests through `proxy`.
pub fn proxied_client(proxy: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy)).unwrap())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// HTTP client that keeps idle connections to `proxy` open.
pub fn keep_alive_client(proxy: SocketAddr) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy)).unwrap())
        .build()
        .unwrap()
}

/// Read from `stream` until the end of an HTTP head (`\r\n\r\n`) or EOF.
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> std::io::Result<String> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}
