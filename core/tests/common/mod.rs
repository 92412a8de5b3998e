/*
 * common/mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Scripted local origin server shared by the integration tests: accepts
 * connections, reads complete requests (head plus content-length or chunked
 * body), records the raw bytes, and answers with pre-canned responses in
 * order. Hermetic: no network beyond loopback.
 */

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct Origin {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    responses: Arc<Mutex<VecDeque<Vec<u8>>>>,
    connections: Arc<Mutex<usize>>,
}

impl Origin {
    /// Bind a loopback listener and serve the given responses in order, one
    /// per received request, across however many connections arrive.
    pub async fn start(responses: Vec<Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
        let connections = Arc::new(Mutex::new(0usize));
        {
            let requests = requests.clone();
            let queue = queue.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                loop {
                    let (stream, _) = match listener.accept().await {
                        Ok(x) => x,
                        Err(_) => return,
                    };
                    *connections.lock().unwrap() += 1;
                    tokio::spawn(serve(stream, requests.clone(), queue.clone()));
                }
            });
        }
        Self { addr, requests, responses: queue, connections }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Raw bytes of the i-th request received (head and body).
    pub fn request(&self, i: usize) -> Vec<u8> {
        self.requests.lock().unwrap().get(i).cloned().expect("request was received")
    }

    pub fn request_text(&self, i: usize) -> String {
        String::from_utf8_lossy(&self.request(i)).into_owned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Distinct TCP connections accepted so far.
    pub fn connection_count(&self) -> usize {
        *self.connections.lock().unwrap()
    }

    pub fn responses_left(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

async fn serve(
    mut stream: TcpStream,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    responses: Arc<Mutex<VecDeque<Vec<u8>>>>,
) {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        // head
        let head_end = loop {
            if let Some(i) = find(&buf, b"\r\n\r\n") {
                break i + 4;
            }
            if !fill(&mut stream, &mut buf).await {
                return;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        // body
        let total = if head.contains("transfer-encoding: chunked") {
            loop {
                if let Some(i) = find(&buf[head_end..], b"0\r\n\r\n") {
                    break head_end + i + 5;
                }
                if !fill(&mut stream, &mut buf).await {
                    return;
                }
            }
        } else if let Some(len) = content_length(&head) {
            while buf.len() < head_end + len {
                if !fill(&mut stream, &mut buf).await {
                    return;
                }
            }
            head_end + len
        } else {
            head_end
        };
        let request: Vec<u8> = buf.drain(..total).collect();
        requests.lock().unwrap().push(request);

        let response = responses.lock().unwrap().pop_front();
        match response {
            Some(r) => {
                if stream.write_all(&r).await.is_err() {
                    return;
                }
                let _ = stream.flush().await;
            }
            None => return,
        }
    }
}

async fn fill(stream: &mut TcpStream, buf: &mut Vec<u8>) -> bool {
    let mut tmp = [0u8; 4096];
    match stream.read(&mut tmp).await {
        Ok(0) | Err(_) => false,
        Ok(n) => {
            buf.extend_from_slice(&tmp[..n]);
            true
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &str) -> Option<usize> {
    for line in head.lines() {
        if let Some(v) = line.strip_prefix("content-length:") {
            return v.trim().parse().ok();
        }
    }
    None
}

/// A listener that accepts and parks connections without speaking HTTP.
/// For pool tests that only need connects to succeed.
pub async fn parked_listener() -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        let mut parked = Vec::new();
        loop {
            match listener.accept().await {
                Ok((stream, _)) => parked.push(stream),
                Err(_) => return,
            }
        }
    });
    (addr, handle)
}

/// Simple response builders.
pub fn response_with_body(code: u16, reason: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n\r\n{}",
        code,
        reason,
        body.len(),
        body
    )
    .into_bytes()
}

pub fn response_with_headers(code: u16, reason: &str, headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut s = format!("HTTP/1.1 {} {}\r\n", code, reason);
    for (name, value) in headers {
        s.push_str(&format!("{}: {}\r\n", name, value));
    }
    s.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    s.into_bytes()
}
