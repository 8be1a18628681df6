#![allow(clippy::unwrap_used)]
//! End-to-end server integration tests
//!
//! These tests boot a real server on an ephemeral port and exercise it over
//! TCP with plain HTTP/1.1 requests, verifying the full stack from the
//! socket down to the statistics index and back.

mod common;

use std::time::Duration;

use common::*;
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let server = start_test_server().await;

    let resp = send_request(server.addr, "GET", "/health", None).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!({ "status": "healthy" }));
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert!(resp.header("x-request-id").is_some_and(|id| id.starts_with("req-")));
}

#[tokio::test]
async fn test_classic_sequence() {
    let server = start_test_server().await;

    let resp = post_fizzbuzz(server.addr, 3, 5, 15, "fizz", "buzz").await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body["result"],
        json!([
            "1", "2", "fizz", "4", "buzz", "fizz", "7", "8", "fizz", "buzz", "11", "fizz", "13",
            "14", "fizzbuzz"
        ])
    );
}

#[tokio::test]
async fn test_same_divisors() {
    let server = start_test_server().await;

    let resp = post_fizzbuzz(server.addr, 3, 3, 6, "fizz", "buzz").await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body["result"],
        json!(["1", "2", "fizzbuzz", "4", "5", "fizzbuzz"])
    );
}

#[tokio::test]
async fn test_all_invalid() {
    let server = start_test_server().await;

    let resp = post_fizzbuzz(server.addr, 0, -1, 0, "", "").await;
    assert_eq!(resp.status, 400);
    assert!(resp.body["error"].is_string());

    let details: Vec<String> = resp.body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap().to_string())
        .collect();
    assert!(details.len() >= 4);
    for field in ["int1", "int2", "limit", "str1"] {
        assert!(
            details.iter().any(|d| d.contains(field)),
            "no detail mentions {field}: {details:?}"
        );
    }
    assert!(details.iter().any(|d| d.contains("str2")));
}

#[tokio::test]
async fn test_over_max_limit() {
    let server = start_test_server().await;

    let resp = post_fizzbuzz(server.addr, 3, 5, 20_000, "fizz", "buzz").await;
    assert_eq!(resp.status, 400);
    let details = resp.body["details"].as_array().unwrap();
    assert!(details
        .iter()
        .any(|d| d.as_str().unwrap().contains("limit")));
}

#[tokio::test]
async fn test_configured_max_limit() {
    let mut config = default_test_config();
    config.fizzbuzz.max_limit = 10;
    let server = start_test_server_with(config).await;

    let resp = post_fizzbuzz(server.addr, 3, 5, 10, "fizz", "buzz").await;
    assert_eq!(resp.status, 200);

    let resp = post_fizzbuzz(server.addr, 3, 5, 11, "fizz", "buzz").await;
    assert_eq!(resp.status, 400);
    assert!(resp.body["details"][0]
        .as_str()
        .unwrap()
        .contains("maximum allowed value of 10"));
}

#[tokio::test]
async fn test_malformed_body() {
    let server = start_test_server().await;

    let resp = send_request(server.addr, "POST", "/fizzbuzz", Some("{\"int1\": ")).await;
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body["error"], "invalid JSON body");

    let resp = send_request(server.addr, "POST", "/fizzbuzz", Some("{\"int1\": \"three\"}")).await;
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn test_empty_statistics() {
    let server = start_test_server().await;

    let resp = send_request(server.addr, "GET", "/statistics", None).await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!({ "most_frequent_request": null, "hits": 0 }));
}

#[tokio::test]
async fn test_invalid_requests_not_counted() {
    let server = start_test_server().await;

    post_fizzbuzz(server.addr, 0, 5, 15, "fizz", "buzz").await;
    post_fizzbuzz(server.addr, 3, 5, 20_000, "fizz", "buzz").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = send_request(server.addr, "GET", "/statistics", None).await;
    assert_eq!(resp.body, json!({ "most_frequent_request": null, "hits": 0 }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_hot_tuple() {
    let server = start_test_server().await;

    let requests: Vec<_> = (0..100)
        .map(|_| {
            let addr = server.addr;
            tokio::spawn(async move { post_fizzbuzz(addr, 3, 5, 10, "fizz", "buzz").await })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap().status, 200);
    }

    wait_for_hits(&server.index, 100).await;

    let resp = send_request(server.addr, "GET", "/statistics", None).await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body["most_frequent_request"],
        json!({ "int1": 3, "int2": 5, "limit": 10, "str1": "fizz", "str2": "buzz" })
    );
    assert!(resp.body["hits"].as_u64().unwrap() >= 100);
}

#[tokio::test]
async fn test_separate_tracking() {
    let server = start_test_server().await;

    for _ in 0..3 {
        post_fizzbuzz(server.addr, 3, 5, 10, "fizz", "buzz").await;
    }
    for _ in 0..2 {
        post_fizzbuzz(server.addr, 2, 7, 20, "foo", "bar").await;
    }

    wait_for_hits(&server.index, 5).await;

    let resp = send_request(server.addr, "GET", "/statistics", None).await;
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.body["most_frequent_request"],
        json!({ "int1": 3, "int2": 5, "limit": 10, "str1": "fizz", "str2": "buzz" })
    );
    assert_eq!(resp.body["hits"], 3);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let server = start_test_server().await;

    let resp = send_request(server.addr, "GET", "/does-not-exist", None).await;
    assert_eq!(resp.status, 404);

    let resp = send_request(server.addr, "DELETE", "/statistics", None).await;
    assert_eq!(resp.status, 405);
}

#[tokio::test]
async fn test_cors_preflight() {
    let server = start_test_server().await;

    let resp = send_request(server.addr, "OPTIONS", "/fizzbuzz", None).await;
    assert_eq!(resp.status, 204);
    assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
}

#[tokio::test]
async fn test_shutdown_refuses_new_connections() {
    let server = start_test_server().await;
    assert_eq!(
        send_request(server.addr, "GET", "/health", None).await.status,
        200
    );

    server.shutdown.send(()).unwrap();

    let mut refused = false;
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(server.addr).await.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(refused, "listener should close after shutdown");
}

#[tokio::test]
async fn test_unfinished_request_head_is_dropped() {
    let mut config = default_test_config();
    config.server.header_read_timeout_secs = 1;
    let server = start_test_server_with(config).await;

    let closed = send_raw_until_closed(
        server.addr,
        "GET /health HTTP/1.1\r\nHost: x\r\n",
        Duration::from_secs(5),
    )
    .await;
    assert!(closed.is_some(), "connection with an unfinished head stayed open");
}

#[tokio::test]
async fn test_idle_keep_alive_connection_is_closed() {
    let mut config = default_test_config();
    config.server.header_read_timeout_secs = 30;
    config.server.idle_timeout_secs = 1;
    let server = start_test_server_with(config).await;

    let received = send_raw_until_closed(
        server.addr,
        "GET /health HTTP/1.1\r\nHost: x\r\n\r\n",
        Duration::from_secs(5),
    )
    .await
    .expect("idle keep-alive connection stayed open");

    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200"), "unexpected response: {text}");
    assert!(text.contains("healthy"));
}
