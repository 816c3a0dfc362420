//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    routing::any,
    Json, Router,
};
use inbox_shield::config::loader::parse_policy_yaml;
use inbox_shield::{HttpServer, ProxyConfig, Shutdown};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Start a backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
        Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "host": header("host"),
            "x_forwarded_for": header("x-forwarded-for"),
            "signature": header("signature"),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(any(echo))).await.unwrap();
    });
    addr
}

/// Start a backend that takes `delay` to answer.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(any(move || async move {
        tokio::time::sleep(delay).await;
        "slow"
    }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A proxy running on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) -> std::io::Result<()> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("proxy did not stop")
            .expect("proxy task panicked")
    }
}

pub async fn start_proxy(backend: SocketAddr, policy_yaml: &str) -> TestProxy {
    start_proxy_with(ProxyConfig::new(format!("http://{backend}")), policy_yaml).await
}

pub async fn start_proxy_with(config: ProxyConfig, policy_yaml: &str) -> TestProxy {
    let policy = parse_policy_yaml(policy_yaml).unwrap();
    let server = HttpServer::new(config, policy).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestProxy { addr, shutdown, handle }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
