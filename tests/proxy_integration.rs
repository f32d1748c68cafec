//! End-to-end tests through a running proxy.

use std::time::Duration;

use egress_proxy::intercept::DenialFormat;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

use common::{
    keep_alive_client, proxied_client, read_head, start_mock_backend, start_proxy,
    start_silent_backend, test_config, BACKEND_BODY,
};

/// Send a raw request head to the proxy and return the response head.
async fn raw_exchange(proxy: std::net::SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), read_head(&mut stream))
        .await
        .expect("no response")
        .unwrap()
}

#[tokio::test]
async fn test_allowed_request_is_forwarded() {
    let backend = start_mock_backend().await;
    let proxy = start_proxy(test_config(&["127.0.0.1"])).await;

    let res = proxied_client(proxy.addr)
        .get(format!("http://{}/hello", backend.addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), BACKEND_BODY);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_denied_request_gets_403_with_host() {
    let proxy = start_proxy(test_config(&["google.com", "youtube.com"])).await;

    let res = proxied_client(proxy.addr)
        .get("http://evil.test/steal")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 403);
    let content_type = res.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let body = res.text().await.unwrap();
    assert!(body.contains("evil.test"), "body was {:?}", body);
}

#[tokio::test]
async fn test_denied_request_never_reaches_upstream() {
    let backend = start_mock_backend().await;
    let proxy = start_proxy(test_config(&["allowed.test"])).await;

    let res = proxied_client(proxy.addr)
        .post(format!("http://{}/upload", backend.addr))
        .body("secret payload")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 403);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_bare_suffix_is_denied_end_to_end() {
    let proxy = start_proxy(test_config(&["google.com"])).await;

    let res = proxied_client(proxy.addr)
        .get("http://evilgoogle.com/")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 403);
}

#[tokio::test]
async fn test_html_denial_page() {
    let mut config = test_config(&["google.com"]);
    config.denial.format = DenialFormat::Html;
    config.denial.title = "Blocked".to_string();
    let proxy = start_proxy(config).await;

    let res = proxied_client(proxy.addr)
        .get("http://evil.test/")
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 403);
    assert!(res.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    let body = res.text().await.unwrap();
    assert!(body.contains("<title>Blocked</title>"));
    assert!(body.contains("evil.test"));
}

#[tokio::test]
async fn test_request_without_host_fails_closed() {
    let proxy = start_proxy(test_config(&["google.com"])).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await.unwrap();

    assert!(head.starts_with("HTTP/1.1 403"), "response was {:?}", head);
}

#[tokio::test]
async fn test_connect_to_denied_host_is_refused() {
    let proxy = start_proxy(test_config(&["onlineide.pro"])).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    stream
        .write_all(b"CONNECT evil.test:443 HTTP/1.1\r\nHost: evil.test:443\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await.unwrap();

    assert!(head.starts_with("HTTP/1.1 403"), "response was {:?}", head);
}

#[tokio::test]
async fn test_connect_to_allowed_host_relays_bytes() {
    let backend = start_mock_backend().await;
    let proxy = start_proxy(test_config(&["127.0.0.1"])).await;

    let mut stream = TcpStream::connect(proxy.addr).await.unwrap();
    let connect = format!(
        "CONNECT {addr} HTTP/1.1\r\nHost: {addr}\r\n\r\n",
        addr = backend.addr
    );
    stream.write_all(connect.as_bytes()).await.unwrap();
    let head = read_head(&mut stream).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200"), "response was {:?}", head);

    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
        .await
        .expect("tunnel timed out")
        .unwrap();

    assert!(response.contains(BACKEND_BODY), "response was {:?}", response);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_userinfo_in_absolute_uri_cannot_reach_denied_host() {
    let backend = start_mock_backend().await;
    let proxy = start_proxy(test_config(&["allowed.test"])).await;

    let request = format!(
        "GET http://allowed.test:1@{addr}/ HTTP/1.1\r\nHost: allowed.test\r\nConnection: close\r\n\r\n",
        addr = backend.addr
    );
    let head = raw_exchange(proxy.addr, &request).await;

    assert!(head.starts_with("HTTP/1.1 403"), "response was {:?}", head);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_userinfo_in_host_header_cannot_reach_denied_host() {
    let backend = start_mock_backend().await;
    let proxy = start_proxy(test_config(&["allowed.test"])).await;

    let request = format!(
        "GET / HTTP/1.1\r\nHost: allowed.test:1@{addr}\r\nConnection: close\r\n\r\n",
        addr = backend.addr
    );
    let head = raw_exchange(proxy.addr, &request).await;

    assert!(head.starts_with("HTTP/1.1 403"), "response was {:?}", head);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_userinfo_in_connect_target_is_refused() {
    let backend = start_mock_backend().await;
    let proxy = start_proxy(test_config(&["allowed.test"])).await;

    let request = format!(
        "CONNECT allowed.test:1@{addr} HTTP/1.1\r\nHost: allowed.test:443\r\n\r\n",
        addr = backend.addr
    );
    let head = raw_exchange(proxy.addr, &request).await;

    assert!(head.starts_with("HTTP/1.1 403"), "response was {:?}", head);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_upstream_failure_maps_to_502() {
    // Bind then drop to get a port with nothing listening.
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let proxy = start_proxy(test_config(&["127.0.0.1"])).await;
    let res = proxied_client(proxy.addr)
        .get(format!("http://{}/", closed_addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_upstream_timeout_maps_to_504() {
    let backend = start_silent_backend().await;
    let mut config = test_config(&["127.0.0.1"]);
    config.timeouts.request_secs = 1;
    let proxy = start_proxy(config).await;

    let res = proxied_client(proxy.addr)
        .get(format!("http://{}/slow", backend.addr))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), 504);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_idle_keep_alive_connections() {
    let proxy = start_proxy(test_config(&["google.com"])).await;

    let client = keep_alive_client(proxy.addr);
    let res = client.get("http://evil.test/").send().await.expect("Proxy unreachable");
    assert_eq!(res.status(), 403);
    let _ = res.text().await.unwrap();

    proxy.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), proxy.handle)
        .await
        .expect("server waited on an idle connection")
        .unwrap();
    drop(client);
}

#[tokio::test]
async fn test_shutdown_stops_server() {
    let proxy = start_proxy(test_config(&[])).await;

    proxy.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(15), proxy.handle)
        .await
        .expect("server did not stop")
        .unwrap();
}
