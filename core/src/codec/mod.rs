/*
 * mod.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Hexwire, an HTTP/1.1 user agent library.
 *
 * Hexwire is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Hexwire is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Hexwire.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Request/response codec: request-line and header serialisation with
//! validation, response head parsing (with 1xx handling and version checks),
//! body reads per the framing rules, and chunked writes.

pub mod coding;
pub mod parser;

use tracing::warn;

use crate::codec::coding::ContentCoding;
use crate::codec::parser::{ParseState, ResponseParser, ResponseSink};
use crate::conn::Connection;
use crate::error::HttpError;
use crate::headers::Headers;
use crate::request::{HttpRequest, HttpVersion, Target};
use crate::response::StatusCode;

/// Codec behavior knobs, carried by the transaction.
#[derive(Debug, Clone, Copy)]
pub struct CodecOptions {
    /// Fail on a response version different from the request's instead of warning.
    pub strict_version: bool,
    /// 1xx responses discarded before the final response; beyond this is fatal.
    pub max_informative: u32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self { strict_version: false, max_informative: 5 }
    }
}

/// A parsed status line and header block.
#[derive(Debug)]
pub(crate) struct Head {
    pub version: Option<HttpVersion>,
    pub version_token: String,
    pub code: StatusCode,
    pub reason: Option<String>,
    pub headers: Headers,
}

/// Chunked transfer-coding wins over Content-Length when both are present.
pub(crate) fn is_chunked(headers: &Headers) -> bool {
    headers.has_token("Transfer-Encoding", "chunked")
}

pub(crate) fn content_length(headers: &Headers) -> Option<u64> {
    headers.get("Content-Length").and_then(|v| v.trim().parse().ok())
}

/// The declared content coding; unknown tokens warn and fall back to identity
/// so the bytes pass through verbatim.
pub(crate) fn content_coding(headers: &Headers) -> ContentCoding {
    match headers.get("Content-Encoding") {
        None => ContentCoding::Identity,
        Some(token) => match ContentCoding::from_token(token) {
            Some(c) => c,
            None => {
                warn!(coding = token, "unsupported content coding, passing bytes through");
                ContentCoding::Identity
            }
        },
    }
}

/// Serialise the request head: request line, headers (Host added when absent
/// and the target is concrete), terminating CRLF.
pub(crate) fn build_head(req: &HttpRequest) -> Result<String, HttpError> {
    validate_request(req)?;
    let mut head = format!(
        "{} {} {}\r\n",
        req.method.as_str(),
        req.target.request_line_form(),
        req.version.as_str()
    );
    for (name, value) in req.headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if !req.headers.contains("Host") {
        if let Target::Url(url) = &req.target {
            head.push_str("Host: ");
            head.push_str(&url.host_header());
            head.push_str("\r\n");
        }
    }
    head.push_str("\r\n");
    Ok(head)
}

fn validate_request(req: &HttpRequest) -> Result<(), HttpError> {
    if !req.method.is_supported() {
        warn!(method = req.method.as_str(), "using unsupported method");
    }
    let has_length = req.headers.contains("Content-Length")
        || req.headers.has_token("Transfer-Encoding", "chunked");
    let has_type = req.headers.contains("Content-Type");
    if req.method.requires_body() {
        if !has_length || !has_type {
            return Err(HttpError::request(format!(
                "{} requires Content-Length and Content-Type",
                req.method
            )));
        }
    } else if req.method.forbids_body() && (req.headers.contains("Content-Length") || has_type) {
        return Err(HttpError::request(format!(
            "{} must not carry Content-Length or Content-Type",
            req.method
        )));
    }
    Ok(())
}

/// Write the request head to the connection and flush it.
pub(crate) async fn write_request(conn: &Connection, req: &HttpRequest) -> Result<(), HttpError> {
    let head = build_head(req)?;
    conn.print(&head).await?;
    conn.flush().await
}

struct HeadSink {
    version_token: String,
    code: u16,
    reason: Option<String>,
    headers: Headers,
}

impl HeadSink {
    fn new() -> Self {
        Self { version_token: String::new(), code: 0, reason: None, headers: Headers::new() }
    }
}

impl ResponseSink for HeadSink {
    fn status(&mut self, version: &str, code: u16, reason: Option<&str>) {
        self.version_token = version.to_string();
        self.code = code;
        self.reason = reason.map(str::to_string);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.add(name, value);
    }

    fn body_data(&mut self, _: &[u8]) {}
    fn chunk_end(&mut self) {}
    fn trailer(&mut self, _: &str, _: &str) {}
}

/// Read the status line and headers of the final response, discarding up to
/// `max_informative` interim 1xx responses. The version is checked against
/// the request: warning by default, fatal when strict.
pub(crate) async fn read_head(
    conn: &Connection,
    req: &HttpRequest,
    opts: &CodecOptions,
) -> Result<Head, HttpError> {
    let mut informative = 0u32;
    loop {
        let mut parser = ResponseParser::new();
        let mut sink = HeadSink::new();
        {
            let mut io = conn.lock_io().await?;
            loop {
                parser.receive(&mut io.rbuf, &mut sink)?;
                if parser.state() == ParseState::HeadersComplete {
                    break;
                }
                if io.fill().await? == 0 {
                    return Err(HttpError::response("connection closed before response head"));
                }
            }
        }
        let code = StatusCode(sink.code);
        if code.is_informational() {
            informative += 1;
            if informative > opts.max_informative {
                return Err(HttpError::response(format!(
                    "more than {} informative responses",
                    opts.max_informative
                )));
            }
            warn!(code = sink.code, "discarding informative response");
            continue;
        }
        if sink.reason.is_none() {
            warn!(code = sink.code, "response status line has no reason phrase");
        }
        let version = HttpVersion::parse(&sink.version_token);
        if version != Some(req.version) {
            if opts.strict_version {
                return Err(HttpError::response(format!(
                    "response version {} does not match request version {}",
                    sink.version_token, req.version
                )));
            }
            warn!(
                response = %sink.version_token,
                request = %req.version,
                "response version does not match request version"
            );
        }
        return Ok(Head {
            version,
            version_token: sink.version_token,
            code,
            reason: sink.reason,
            headers: sink.headers,
        });
    }
}

/// Read the raw body bytes for a parsed head, per the framing rules: nothing
/// for bodyless codes or an absent length, exactly Content-Length bytes
/// otherwise, with chunked transfer-coding winning over Content-Length.
/// Trailers from a chunked body are appended to `headers`.
pub(crate) async fn read_body(
    conn: &Connection,
    code: StatusCode,
    headers: &mut Headers,
) -> Result<Vec<u8>, HttpError> {
    if !code.has_body() {
        return Ok(Vec::new());
    }
    if is_chunked(headers) {
        let (body, trailers) = conn.read_all_chunks().await?;
        for (name, value) in trailers {
            headers.add(name, value);
        }
        return Ok(body);
    }
    let len = match content_length(headers) {
        Some(n) if n > 0 => n as usize,
        _ => return Ok(Vec::new()),
    };
    let mut body = vec![0u8; len];
    let mut read = 0usize;
    while read < len {
        let n = conn.read_buf(&mut body[read..]).await?;
        if n == 0 {
            return Err(HttpError::response("connection closed inside response body"));
        }
        read += n;
    }
    Ok(body)
}

/// Frame one chunk: lowercase hex length, CRLF, payload, CRLF. The payload
/// must already carry its content coding.
pub(crate) async fn write_chunk(conn: &Connection, payload: &[u8]) -> Result<(), HttpError> {
    conn.print(&format!("{:x}\r\n", payload.len())).await?;
    conn.write(payload).await?;
    conn.print("\r\n").await?;
    conn.flush().await
}

/// Terminate a chunked body: zero-length chunk, CRLF, CRLF.
pub(crate) async fn finish_chunks(conn: &Connection) -> Result<(), HttpError> {
    conn.print("0\r\n\r\n").await?;
    conn.flush().await
}
