//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use surrogate_key_proxy::config::ProxyConfig;
use surrogate_key_proxy::lifecycle::Shutdown;
use surrogate_key_proxy::HttpServer;

/// Request heads received by a mock origin, oldest first.
pub type SeenRequests = Arc<Mutex<Vec<String>>>;

/// Start a mock origin that answers every request with `200 OK` and, if
/// given, an `X-Drupal-Cache-Tags` header.
pub async fn start_origin(cache_tags: Option<String>) -> (SocketAddr, SeenRequests) {
    start_slow_origin(cache_tags, Duration::ZERO).await
}

/// Like `start_origin`, but waits `delay` after reading each request head
/// before answering.
pub async fn start_slow_origin(
    cache_tags: Option<String>,
    delay: Duration,
) -> (SocketAddr, SeenRequests) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: SeenRequests = Arc::new(Mutex::new(Vec::new()));
    let seen_by_origin = seen.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let cache_tags = cache_tags.clone();
                    let seen = seen_by_origin.clone();
                    tokio::spawn(async move {
                        let head = read_head(&mut socket).await;
                        seen.lock().unwrap().push(head);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }

                        let body = "ok";
                        let tags_line = match &cache_tags {
                            Some(tags) => format!("X-Drupal-Cache-Tags: {}\r\n", tags),
                            None => String::new(),
                        };
                        let response = format!(
                            "HTTP/1.1 200 OK\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            tags_line,
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

    (addr, seen)
}

/// Read up to the end of the request head.
async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Default config pointed at `origin`, metrics off.
pub fn proxy_config(origin: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.address = origin.to_string();
    config.observability.metrics_enabled = false;
    config
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config).unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// `tag:0 tag:1 ... tag:{n-1}`
pub fn tag_list(n: usize) -> String {
    (0..n).map(|i| format!("tag:{}", i)).collect::<Vec<_>>().join(" ")
}
