/*
 * transaction_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the transaction driver against a scripted loopback
 * origin: framing on the wire, connection reuse, redirects, revalidation,
 * content codings, and the Connection: close lifecycle.
 */

mod common;

use std::sync::Arc;
use std::time::Duration;

use hexwire_core::cache::FifoCache;
use hexwire_core::conn::{ConnectionPool, PoolConfig};
use hexwire_core::error::HttpError;
use hexwire_core::headers::Headers;
use hexwire_core::request::{HttpRequest, HttpVersion, Method, Target};
use hexwire_core::url::HttpUrl;
use hexwire_core::{ContentCoding, HttpCache, HttpClient, Response, Transaction};

use common::{response_with_body, response_with_headers, Origin};

#[tokio::test]
async fn put_twice_reuses_one_connection() {
    let origin = Origin::start(vec![
        response_with_body(200, "OK", "ok"),
        response_with_body(200, "OK", "ok"),
    ])
    .await;
    let client = HttpClient::new();

    for _ in 0..2 {
        let mut tx = client.new_transaction();
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        tx.set_headers(headers);
        tx.send_string("payload").unwrap();
        let mut resp = tx.make_request(Method::Put, &origin.url("/res")).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body_string().await.unwrap(), "ok");
        tx.close().await;
    }

    assert_eq!(origin.connection_count(), 1, "keep-alive must reuse the connection");
    assert_eq!(client.pool().size(), 1);
    let put = origin.request_text(0);
    assert!(put.starts_with("PUT /res HTTP/1.1\r\n"), "head was: {}", put);
    assert!(put.contains("Content-Length: 7"));
    assert!(put.ends_with("payload"));
}

#[tokio::test]
async fn host_header_carries_non_default_port() {
    let origin = Origin::start(vec![response_with_body(200, "OK", "")]).await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let resp = tx.make_request(Method::Get, &origin.url("/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    tx.close().await;
    let head = origin.request_text(0);
    assert!(head.contains(&format!("Host: {}\r\n", origin.addr())), "head was: {}", head);
}

#[tokio::test]
async fn redirect_chain_is_followed_on_one_connection() {
    let origin = Origin::start(vec![
        response_with_headers(302, "Found", &[("Location", "/redirect/1")], ""),
        response_with_headers(302, "Found", &[("Location", "/ok")], ""),
        response_with_body(200, "OK", "landed"),
    ])
    .await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut resp = tx.make_request(Method::Get, &origin.url("/redirect/2")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body_string().await.unwrap(), "landed");
    tx.close().await;

    assert_eq!(origin.request_count(), 3);
    assert!(origin.request_text(1).starts_with("GET /redirect/1 "));
    assert!(origin.request_text(2).starts_with("GET /ok "));
    // absolute-path Locations keep the connection
    assert_eq!(origin.connection_count(), 1);
}

#[tokio::test]
async fn redirect_budget_is_enforced() {
    let origin = Origin::start(vec![response_with_headers(
        302,
        "Found",
        &[("Location", "/elsewhere")],
        "",
    )])
    .await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    tx.set_max_redirects(1);
    let err = tx.make_request(Method::Get, &origin.url("/start")).await.unwrap_err();
    assert!(matches!(err, HttpError::Response(_)), "got: {:?}", err);
    tx.close().await;
}

fn fingerprint(url: &str, headers: &Headers) -> HttpRequest {
    HttpRequest::new(
        Method::Get,
        Target::Url(HttpUrl::parse(url).unwrap()),
        headers.clone(),
        HttpVersion::Http1_1,
    )
}

#[tokio::test]
async fn not_modified_is_served_from_cache() {
    let origin = Origin::start(vec![response_with_headers(
        304,
        "Not Modified",
        &[("ETag", "\"v1\"")],
        "",
    )])
    .await;

    let url = origin.url("/res");
    let mut headers = Headers::new();
    headers.set("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT");

    let cache: Arc<dyn HttpCache> = Arc::new(FifoCache::default());
    let key = fingerprint(&url, &headers);
    cache.put_status(&key, hexwire_core::StatusCode(200));
    let mut stored_headers = Headers::new();
    stored_headers.set("Content-Type", "text/plain");
    cache.put_headers(&key, &stored_headers);
    cache.put_text(&key, "cached payload");

    let mut client = HttpClient::new();
    client.set_cache(cache);
    let mut tx = client.new_transaction();
    tx.set_headers(headers);
    let mut resp = tx.make_request(Method::Get, &url).await.unwrap();
    assert_eq!(resp.status(), 200, "cached status wins over the 304");
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    assert_eq!(resp.body_string().await.unwrap(), "cached payload");
    tx.close().await;
}

#[tokio::test]
async fn not_modified_without_entry_repeats_without_conditionals() {
    let origin = Origin::start(vec![
        response_with_body(304, "Not Modified", ""),
        response_with_body(200, "OK", "fresh"),
    ])
    .await;

    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut headers = Headers::new();
    headers.set("If-Modified-Since", "Sun, 06 Nov 1994 08:49:37 GMT");
    headers.set("If-None-Match", "\"v1\"");
    tx.set_headers(headers);
    tx.set_repeat_on_not_modified(true);
    let mut resp = tx.make_request(Method::Get, &origin.url("/res")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body_string().await.unwrap(), "fresh");
    tx.close().await;

    assert_eq!(origin.request_count(), 2);
    let first = origin.request_text(0);
    assert!(first.contains("If-Modified-Since:"));
    assert!(first.contains("If-None-Match:"));
    let second = origin.request_text(1);
    assert!(!second.contains("If-Modified-Since:"), "conditionals must be stripped");
    assert!(!second.contains("If-None-Match:"));
}

#[tokio::test]
async fn repeat_budget_returns_the_not_modified_response() {
    // every request answers 304; with max_repeats = 2 the second 304 is final
    let origin = Origin::start(vec![
        response_with_body(304, "Not Modified", ""),
        response_with_body(304, "Not Modified", ""),
    ])
    .await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut headers = Headers::new();
    headers.set("If-None-Match", "\"v1\"");
    tx.set_headers(headers);
    tx.set_repeat_on_not_modified(true);
    tx.set_max_repeats(2);
    let resp = tx.make_request(Method::Get, &origin.url("/res")).await.unwrap();
    assert_eq!(resp.status(), 304);
    tx.close().await;
    assert_eq!(origin.request_count(), 2);
}

#[tokio::test]
async fn connection_close_is_honoured_on_close() {
    let origin = Origin::start(vec![
        response_with_headers(200, "OK", &[("Connection", "close")], "bye"),
        response_with_body(200, "OK", "again"),
    ])
    .await;
    let client = HttpClient::new();

    let mut tx = client.new_transaction();
    let mut resp = tx.make_request(Method::Get, &origin.url("/")).await.unwrap();
    assert_eq!(resp.body_string().await.unwrap(), "bye");
    tx.close().await;

    // the closed connection must not be reused
    let mut tx = client.new_transaction();
    let mut resp = tx.make_request(Method::Get, &origin.url("/")).await.unwrap();
    assert_eq!(resp.body_string().await.unwrap(), "again");
    tx.close().await;

    assert_eq!(origin.connection_count(), 2);
}

#[tokio::test]
async fn gzip_response_body_is_decoded() {
    let wire_body = ContentCoding::Gzip.encode(b"hello compressed world").unwrap();
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        wire_body.len()
    )
    .into_bytes();
    response.extend_from_slice(&wire_body);

    let origin = Origin::start(vec![response]).await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut resp = tx.make_request(Method::Get, &origin.url("/z")).await.unwrap();
    assert_eq!(resp.body_string().await.unwrap(), "hello compressed world");
    tx.close().await;
}

#[tokio::test]
async fn deflate_request_body_is_compressed_with_length() {
    let origin = Origin::start(vec![response_with_body(200, "OK", "")]).await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut headers = Headers::new();
    headers.set("Content-Type", "text/plain");
    headers.set("Content-Encoding", "deflate");
    tx.set_headers(headers);
    tx.send_string("squeeze me please, squeeze me please").unwrap();
    let resp = tx.make_request(Method::Post, &origin.url("/in")).await.unwrap();
    assert_eq!(resp.status(), 200);
    tx.close().await;

    let raw = origin.request(0);
    let head_end = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    let head = String::from_utf8_lossy(&raw[..head_end]).into_owned();
    let body = &raw[head_end..];
    let declared: usize = head
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(declared, body.len(), "Content-Length must match the coded body");
    let decoded = ContentCoding::Deflate.decode(body).unwrap();
    assert_eq!(decoded, b"squeeze me please, squeeze me please");
}

#[tokio::test]
async fn chunked_response_with_trailers_is_assembled() {
    let response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                     7\r\nchunked\r\n9\r\n delivery\r\n0\r\nX-Trailer: yes\r\n\r\n";
    let origin = Origin::start(vec![response.to_vec()]).await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut resp = tx.make_request(Method::Get, &origin.url("/c")).await.unwrap();
    assert_eq!(resp.body_string().await.unwrap(), "chunked delivery");
    assert_eq!(resp.header("X-Trailer"), Some("yes"), "trailers join the header set");
    tx.close().await;
}

#[tokio::test]
async fn interim_informative_responses_are_discarded() {
    let mut response = b"HTTP/1.1 100 Continue\r\n\r\n".to_vec();
    response.extend_from_slice(&response_with_body(200, "OK", "final"));
    let origin = Origin::start(vec![response]).await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut resp = tx.make_request(Method::Get, &origin.url("/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body_string().await.unwrap(), "final");
    tx.close().await;
}

#[tokio::test]
async fn version_mismatch_warns_by_default_and_fails_when_strict() {
    let origin = Origin::start(vec![
        b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec(),
        b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec(),
    ])
    .await;
    let client = HttpClient::new();

    let mut tx = client.new_transaction();
    let resp = tx.make_request(Method::Get, &origin.url("/")).await.unwrap();
    assert_eq!(resp.version_token(), "HTTP/1.0");
    tx.close().await;

    let mut tx = client.new_transaction();
    tx.set_strict_version(true);
    let err = tx.make_request(Method::Get, &origin.url("/")).await.unwrap_err();
    assert!(matches!(err, HttpError::Response(_)));
    tx.close().await;
}

#[tokio::test]
async fn a_transaction_is_single_use() {
    let origin = Origin::start(vec![response_with_body(200, "OK", "")]).await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    tx.make_request(Method::Get, &origin.url("/")).await.unwrap();
    let err = tx.make_request(Method::Get, &origin.url("/")).await.unwrap_err();
    assert!(matches!(err, HttpError::Request(_)));
    tx.close().await;
}

#[tokio::test]
async fn conflicting_body_sources_are_rejected() {
    let pool = Arc::new(ConnectionPool::new(PoolConfig::default()).unwrap());
    let mut tx = Transaction::new(pool);
    tx.send_string("text").unwrap();
    assert!(matches!(tx.send_file("/tmp/some-file"), Err(HttpError::Request(_))));
}

#[tokio::test]
async fn missing_body_file_is_an_invalid_request() {
    let origin = Origin::start(vec![]).await;
    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut headers = Headers::new();
    headers.set("Content-Type", "application/octet-stream");
    tx.set_headers(headers);
    tx.send_file("/definitely/not/a/real/file").unwrap();
    let err = tx.make_request(Method::Post, &origin.url("/up")).await.unwrap_err();
    assert!(matches!(err, HttpError::Request(_)), "got: {:?}", err);
    tx.close().await;
}

#[tokio::test]
async fn make_request_later_invokes_the_callback_once() {
    let origin = Origin::start(vec![response_with_body(200, "OK", "async")]).await;
    let client = HttpClient::new();
    let tx = client.new_transaction();

    let (sender, receiver) = tokio::sync::oneshot::channel::<(Transaction, Result<Response, HttpError>)>();
    tx.make_request_later(
        Method::Get,
        &origin.url("/later"),
        Box::new(move |tx, result| {
            let _ = sender.send((tx, result));
        }),
    );

    let (mut tx, result) = tokio::time::timeout(Duration::from_secs(5), receiver)
        .await
        .expect("callback within deadline")
        .expect("callback fired");
    let mut resp = result.expect("request succeeded");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body_string().await.unwrap(), "async");
    tx.close().await;
}

#[tokio::test]
async fn body_file_is_written_as_received() {
    let wire_body = ContentCoding::Gzip.encode(b"file payload").unwrap();
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        wire_body.len()
    )
    .into_bytes();
    response.extend_from_slice(&wire_body);
    let origin = Origin::start(vec![response]).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("body.bin");

    let client = HttpClient::new();
    let mut tx = client.new_transaction();
    let mut resp = tx.make_request(Method::Get, &origin.url("/f")).await.unwrap();
    resp.write_body_to_file(&path).await.unwrap();
    tx.close().await;

    // bytes land coded, exactly as received
    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk, wire_body);
}
