//! Shared utilities for integration testing: programmable mock nodes
//! answering health-check and sync-status requests over raw TCP.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start a mock node whose responder is keyed on the request path.
/// Returns the node's endpoint base URL.
pub async fn spawn_node<F, Fut>(f: F) -> String
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 2048];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let request = String::from_utf8_lossy(&buf[..n]).to_string();
                        let path = request
                            .split_whitespace()
                            .nth(1)
                            .unwrap_or("/")
                            .to_string();

                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    format!("http://{}", addr)
}

/// Health-check response body carrying a version.
pub fn health_body(version: &str) -> String {
    json!({ "data": { "version": version, "healthy": true } }).to_string()
}

/// Sync-status response body in the storage-node wire format.
#[allow(dead_code)]
pub fn sync_body(is_behind: bool, is_configured: bool) -> String {
    json!({ "data": { "isBehind": is_behind, "isConfigured": is_configured } }).to_string()
}

/// Verbose health-check body with self-reported health and disk capacity.
#[allow(dead_code)]
pub fn verbose_health_body(version: &str, healthy: bool, used: u64, size: u64) -> String {
    json!({ "data": {
        "version": version,
        "healthy": healthy,
        "storagePathUsed": used,
        "storagePathSize": size,
    }})
    .to_string()
}

/// Start a node that answers every path with a fixed status and version
/// after an artificial delay.
#[allow(dead_code)]
pub async fn spawn_health_node(status: u16, latency: Duration, version: &str) -> String {
    let version = version.to_string();
    spawn_node(move |_path| {
        let version = version.clone();
        async move {
            tokio::time::sleep(latency).await;
            (status, health_body(&version))
        }
    })
    .await
}
