//! Shared test utilities for integration tests.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

use fizzbuzz_server::config::Config;
use fizzbuzz_server::server::Server;
use fizzbuzz_server::stats::FrequencyIndex;

// ============================================================================
// Server helpers
// ============================================================================

/// A server running in a background task.
#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub index: Arc<FrequencyIndex>,
    pub shutdown: broadcast::Sender<()>,
}

/// Create a test `Config` bound to loopback on an ephemeral port.
#[allow(dead_code)]
pub fn default_test_config() -> Config {
    let mut config = Config::default();
    config.server.bind = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.shutdown_timeout_secs = 1;
    config
}

/// Start a server with the default test config.
#[allow(dead_code)]
pub async fn start_test_server() -> TestServer {
    start_test_server_with(default_test_config()).await
}

/// Start a server with `config` and return its address and index.
#[allow(dead_code)]
pub async fn start_test_server_with(config: Config) -> TestServer {
    let server = Server::new(config).await.expect("server should start");
    let addr = server.local_addr().expect("should have local addr");
    let index = Arc::clone(server.index());
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    TestServer {
        addr,
        index,
        shutdown,
    }
}

// ============================================================================
// HTTP helpers
// ============================================================================

/// Minimal parsed HTTP response.
#[allow(dead_code)]
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

#[allow(dead_code)]
impl HttpResponse {
    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Send one HTTP/1.1 request on a fresh connection and read the response.
#[allow(dead_code)]
pub async fn send_request(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> HttpResponse {
    let mut stream = TcpStream::connect(addr).await.expect("should connect");

    let body = body.unwrap_or("");
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
        .await
        .expect("read should not timeout")
        .expect("read should succeed");

    parse_response(&raw)
}

fn parse_response(raw: &[u8]) -> HttpResponse {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text
        .split_once("\r\n\r\n")
        .expect("response should have a header block");

    let mut lines = head.lines();
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("status line should carry a code");
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let body = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(body).expect("body should be JSON")
    };

    HttpResponse {
        status,
        headers,
        body,
    }
}

/// Write `raw` on a fresh connection and read until the server closes it.
/// Returns `None` if the connection is still open after `wait`.
#[allow(dead_code)]
pub async fn send_raw_until_closed(addr: SocketAddr, raw: &str, wait: Duration) -> Option<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await.expect("should connect");
    stream.write_all(raw.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();

    let mut received = Vec::new();
    match tokio::time::timeout(wait, stream.read_to_end(&mut received)).await {
        // A reset also means the server dropped the connection.
        Ok(_) => Some(received),
        Err(_) => None,
    }
}

/// POST a FizzBuzz request built from its five parameters.
#[allow(dead_code)]
pub async fn post_fizzbuzz(
    addr: SocketAddr,
    int1: i64,
    int2: i64,
    limit: i64,
    str1: &str,
    str2: &str,
) -> HttpResponse {
    let body = serde_json::json!({
        "int1": int1, "int2": int2, "limit": limit, "str1": str1, "str2": str2
    })
    .to_string();
    send_request(addr, "POST", "/fizzbuzz", Some(&body)).await
}

/// Poll until the index holds at least `expected` hits in total.
/// Panics if that does not happen within ~5 seconds.
#[allow(dead_code)]
pub async fn wait_for_hits(index: &FrequencyIndex, expected: u64) {
    for _ in 0..100 {
        if index.total_hits() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "expected {expected} recorded hits, found {}",
        index.total_hits()
    );
}
