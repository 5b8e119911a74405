//! End-to-end tests that run the `waypoint` binary and talk to it over TCP.

mod common;

use common::{Binary, get, post, send_raw, spawn_binary};
use serde_json::{Value, json};

async fn start() -> Binary {
    spawn_binary(&[]).await
}

#[tokio::test]
async fn root_greets() {
    let app = start().await;
    let addr = app.addr;
    let reply = get(addr, "/").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "Hello Dummy Express!");
    assert_eq!(reply.header("content-length"), Some("20"));
}

#[tokio::test]
async fn dummy_id_is_captured() {
    let app = start().await;
    let addr = app.addr;
    let reply = get(addr, "/dummies/42").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "Dummy with id=42");
}

#[tokio::test]
async fn query_string_does_not_affect_matching() {
    let app = start().await;
    let addr = app.addr;
    let reply = get(addr, "/dummies/abc?verbose=1").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "Dummy with id=abc");
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let app = start().await;
    let addr = app.addr;
    for path in ["/nope", "/dummies", "/dummies/1/extra"] {
        let reply = get(addr, path).await;
        assert_eq!(reply.status, 404, "path {path}");
        assert_eq!(reply.body, "Page Not Found", "path {path}");
    }
}

#[tokio::test]
async fn method_must_match() {
    let app = start().await;
    let addr = app.addr;
    let reply = send_raw(
        addr,
        "DELETE /dummies/1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 404);
}

#[tokio::test]
async fn post_echoes_json_body() {
    let app = start().await;
    let addr = app.addr;
    let reply = post(addr, "/dummies", r#"{"name":"crash test","size":3}"#).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));

    let value: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(value, json!({ "body": { "name": "crash test", "size": 3 } }));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = start().await;
    let addr = app.addr;
    let reply = post(addr, "/dummies", "{not json").await;
    assert_eq!(reply.status, 400);
    assert!(reply.body.starts_with("Error: "), "body was {:?}", reply.body);
    assert!(reply.body.len() > "Error: ".len());
}

#[tokio::test]
async fn empty_post_body_is_a_bad_request() {
    let app = start().await;
    let addr = app.addr;
    let reply = post(addr, "/dummies", "").await;
    assert_eq!(reply.status, 400);
    assert!(reply.body.starts_with("Error: "));
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = spawn_binary(&["--max-body-bytes", "8"]).await;
    let addr = app.addr;
    let reply = post(addr, "/dummies", r#"{"name":"far too long"}"#).await;
    assert_eq!(reply.status, 413);
    assert!(reply.body.starts_with("Error: "));
}

#[tokio::test]
async fn malformed_request_line_is_rejected() {
    let app = start().await;
    let addr = app.addr;
    let reply = send_raw(addr, "NOT AN HTTP REQUEST\r\n\r\n").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.header("connection"), Some("close"));
}

#[tokio::test]
async fn chunked_bodies_are_not_implemented() {
    let app = start().await;
    let addr = app.addr;
    let reply = send_raw(
        addr,
        "POST /dummies HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n0\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 501);
}

#[tokio::test]
async fn pipelined_requests_share_a_connection() {
    let app = start().await;
    let addr = app.addr;
    let reply = send_raw(
        addr,
        "GET /dummies/1 HTTP/1.1\r\nHost: localhost\r\n\r\n\
         GET /dummies/2 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    // The first reply's body runs into the second reply's status line.
    assert_eq!(reply.status, 200);
    assert!(reply.head.contains("Connection: keep-alive"));
    assert!(reply.body.starts_with("Dummy with id=1HTTP/1.1 200 OK"));
    assert!(reply.body.ends_with("Dummy with id=2"));
}

#[tokio::test]
async fn overflowing_content_length_is_answered() {
    let app = start().await;
    let reply = send_raw(
        app.addr,
        "POST /dummies HTTP/1.1\r\nHost: localhost\r\n\
         Content-Length: 18446744073709551615\r\n\r\n{}",
    )
    .await;
    assert_eq!(reply.status, 413);
    assert_eq!(reply.header("connection"), Some("close"));
}

#[tokio::test]
async fn announced_length_over_the_cap_is_rejected_up_front() {
    let app = start().await;
    // Only the head is sent; the server must answer without waiting for the body.
    let reply = send_raw(
        app.addr,
        "POST /dummies HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100000000\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 413);
    assert_eq!(reply.body, "Request entity too large");
}

#[tokio::test]
async fn body_limit_above_default_request_cap_is_honoured() {
    let app = spawn_binary(&["--max-body-bytes", "16777216"]).await;
    let filler = "a".repeat(9 * 1024 * 1024);
    let body = format!(r#"{{"filler":"{filler}"}}"#);

    let reply = post(app.addr, "/dummies", &body).await;
    assert_eq!(reply.status, 200);
    let value: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(value["body"]["filler"].as_str().map(str::len), Some(filler.len()));
}
