//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{body::Body, http::Request, response::Response};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use feature_proxy::config::ProxyConfig;
use feature_proxy::lifecycle::Shutdown;
use feature_proxy::proxy::handler::{Handler, SharedHandler};
use feature_proxy::HttpServer;

/// Requests whose path starts with this prefix are answered after a delay.
pub const SLOW_PREFIX: &str = "/slow";
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

/// Start a mock backend answering `{name} {method} {target}`.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(serve_one(socket, name));
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn serve_one(mut socket: TcpStream, name: &'static str) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf);
    let mut request_line = head.lines().next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    if target.starts_with(SLOW_PREFIX) {
        tokio::time::sleep(SLOW_DELAY).await;
    }

    let body = format!("{name} {method} {target}");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start the proxy on an ephemeral port. Trigger the returned handle to stop it.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

/// Config for a proxy forwarding to backends listening on `origin_port`.
pub fn proxy_config(origin_port: u16) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.origin.port = origin_port;
    config.origin.base_domain = "preview.test".to_string();
    config.admin.api_key = "admin-key".to_string();
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// POST a control event to the admin API, returning the outcome string.
pub async fn control(
    proxy: SocketAddr,
    action: &str,
    subdomain: &str,
    address: &str,
    port: u16,
) -> String {
    let response = client()
        .post(format!("http://{proxy}/proxy/admin/control"))
        .bearer_auth("admin-key")
        .json(&serde_json::json!({
            "action": action,
            "subdomain": subdomain,
            "address": address,
            "port": port,
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "control failed: {}", response.status());
    let body: serde_json::Value = response.json().await.unwrap();
    body["outcome"].as_str().unwrap().to_string()
}

/// Handler answering with a fixed label, for driving the router directly.
#[derive(Debug)]
pub struct Label(pub String);

impl Label {
    pub fn shared(label: impl Into<String>) -> SharedHandler {
        std::sync::Arc::new(Self(label.into()))
    }
}

impl Handler for Label {
    fn serve(&self, _req: Request<Body>) -> BoxFuture<'static, Response> {
        let label = self.0.clone();
        Box::pin(async move { Response::new(Body::from(label)) })
    }

    fn target(&self) -> &str {
        &self.0
    }
}
