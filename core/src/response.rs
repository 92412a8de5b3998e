/*
 * response.rs
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

//! Response value: status, headers, and a body that is either live (bound to
//! the connection, read once on demand) or wrapped (already materialised,
//! e.g. served from the cache).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use crate::codec;
use crate::codec::coding::ContentCoding;
use crate::conn::{ChunkSink, Connection};
use crate::error::HttpError;
use crate::headers::Headers;
use crate::request::HttpVersion;

/// Response status code with the class predicates the driver needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.0)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// The redirect codes the transaction follows.
    pub fn is_followable_redirect(&self) -> bool {
        matches!(self.0, 301 | 302 | 303 | 307)
    }

    pub fn is_not_modified(&self) -> bool {
        self.0 == 304
    }

    /// 1xx, 204, and 304 responses never carry a body.
    pub fn has_body(&self) -> bool {
        !(self.is_informational() || self.0 == 204 || self.0 == 304)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<u16> for StatusCode {
    fn eq(&self, other: &u16) -> bool {
        self.0 == *other
    }
}

/// Retry-After header value: delay seconds or an absolute date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    Seconds(u64),
    Date(DateTime<FixedOffset>),
}

/// A materialised body, as the cache stores it.
#[derive(Debug, Clone)]
pub enum CachedBody {
    None,
    Text(String),
    File(PathBuf),
}

enum BodyState {
    /// Body not yet read; the connection is still positioned at it.
    Live { conn: Arc<Connection>, consumed: bool },
    Wrapped(CachedBody),
}

/// One HTTP response. Live responses read their body from the connection
/// exactly once; wrapped responses carry parts that already exist.
pub struct Response {
    version: Option<HttpVersion>,
    version_token: String,
    status: StatusCode,
    reason: Option<String>,
    headers: Headers,
    body: BodyState,
}

impl Response {
    pub(crate) fn live(head: codec::Head, conn: Arc<Connection>) -> Self {
        Self {
            version: head.version,
            version_token: head.version_token,
            status: head.code,
            reason: head.reason,
            headers: head.headers,
            body: BodyState::Live { conn, consumed: false },
        }
    }

    /// Wrap already-materialised parts (e.g. a cache entry).
    pub fn wrapped(status: StatusCode, headers: Headers, body: CachedBody) -> Self {
        Self {
            version: Some(HttpVersion::Http1_1),
            version_token: HttpVersion::Http1_1.as_str().to_string(),
            status,
            reason: None,
            headers,
            body: BodyState::Wrapped(body),
        }
    }

    pub(crate) fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn version(&self) -> Option<HttpVersion> {
        self.version
    }

    /// The version token exactly as the server sent it.
    pub fn version_token(&self) -> &str {
        &self.version_token
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The Date header value per RFC 1123.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.headers.date()
    }

    /// The Retry-After header: delay seconds or an RFC 1123 date.
    pub fn retry_after(&self) -> Option<RetryAfter> {
        let v = self.headers.get("Retry-After")?.trim();
        if let Ok(secs) = v.parse::<u64>() {
            return Some(RetryAfter::Seconds(secs));
        }
        self.headers.date_value("Retry-After").map(RetryAfter::Date)
    }

    /// True when the server asked for this connection to be closed.
    pub fn connection_close(&self) -> bool {
        self.headers.has_token("Connection", "close")
    }

    pub(crate) fn connection(&self) -> Option<&Arc<Connection>> {
        match &self.body {
            BodyState::Live { conn, .. } => Some(conn),
            BodyState::Wrapped(_) => None,
        }
    }

    fn take_live(&mut self) -> Result<Option<Arc<Connection>>, HttpError> {
        match &mut self.body {
            BodyState::Wrapped(_) => Ok(None),
            BodyState::Live { conn, consumed } => {
                if *consumed {
                    return Err(HttpError::request("response body was already read"));
                }
                *consumed = true;
                Ok(Some(conn.clone()))
            }
        }
    }

    /// Materialise the body as a string, removing the content coding. One-shot
    /// for live responses.
    pub async fn body_string(&mut self) -> Result<String, HttpError> {
        if let Some(conn) = self.take_live()? {
            let raw = codec::read_body(&conn, self.status, &mut self.headers).await?;
            let decoded = codec::content_coding(&self.headers).decode(&raw)?;
            return Ok(String::from_utf8_lossy(&decoded).into_owned());
        }
        match &self.body {
            BodyState::Wrapped(CachedBody::None) => Ok(String::new()),
            BodyState::Wrapped(CachedBody::Text(s)) => Ok(s.clone()),
            BodyState::Wrapped(CachedBody::File(p)) => Ok(tokio::fs::read_to_string(p).await?),
            BodyState::Live { .. } => unreachable!("live body handled above"),
        }
    }

    /// Write the body to a file as received: de-chunked but with any content
    /// coding left in place (a warning is logged when one is present).
    pub async fn write_body_to_file(&mut self, path: &Path) -> Result<(), HttpError> {
        if let Some(conn) = self.take_live()? {
            if codec::content_coding(&self.headers) != ContentCoding::Identity {
                warn!(path = %path.display(), "writing coded body bytes to file without decoding");
            }
            let raw = codec::read_body(&conn, self.status, &mut self.headers).await?;
            tokio::fs::write(path, raw).await?;
            return Ok(());
        }
        match &self.body {
            BodyState::Wrapped(CachedBody::None) => {
                tokio::fs::write(path, b"").await?;
                Ok(())
            }
            BodyState::Wrapped(CachedBody::Text(s)) => {
                tokio::fs::write(path, s.as_bytes()).await?;
                Ok(())
            }
            BodyState::Wrapped(CachedBody::File(p)) => {
                tokio::fs::copy(p, path).await?;
                Ok(())
            }
            BodyState::Live { .. } => unreachable!("live body handled above"),
        }
    }

    /// Stream the body to a sink. For chunked responses each wire chunk is
    /// decoded independently and delivered as one `chunk` call; otherwise the
    /// whole decoded body arrives as a single chunk.
    pub async fn chunks(&mut self, sink: &mut dyn ChunkSink) -> Result<(), HttpError> {
        if let Some(conn) = self.take_live()? {
            if self.status.has_body() && codec::is_chunked(&self.headers) {
                let coding = codec::content_coding(&self.headers);
                struct Decode<'a> {
                    coding: ContentCoding,
                    out: &'a mut dyn ChunkSink,
                    error: Option<HttpError>,
                }
                impl ChunkSink for Decode<'_> {
                    fn chunk(&mut self, data: &[u8]) {
                        if self.error.is_some() {
                            return;
                        }
                        match self.coding.decode(data) {
                            Ok(decoded) => self.out.chunk(&decoded),
                            Err(e) => self.error = Some(e.into()),
                        }
                    }
                    fn trailer(&mut self, name: &str, value: &str) {
                        self.out.trailer(name, value);
                    }
                    fn end(&mut self) {
                        self.out.end();
                    }
                }
                let mut adapter = Decode { coding, out: sink, error: None };
                conn.read_chunks(&mut adapter).await?;
                if let Some(e) = adapter.error {
                    return Err(e);
                }
                return Ok(());
            }
            let raw = codec::read_body(&conn, self.status, &mut self.headers).await?;
            let decoded = codec::content_coding(&self.headers).decode(&raw)?;
            if !decoded.is_empty() {
                sink.chunk(&decoded);
            }
            sink.end();
            return Ok(());
        }
        let body = self.body_string().await?;
        if !body.is_empty() {
            sink.chunk(body.as_bytes());
        }
        sink.end();
        Ok(())
    }

    /// Consume and discard the body, leaving the connection positioned after
    /// it. No-op for wrapped responses or an already-read body.
    pub(crate) async fn drain(&mut self) -> Result<(), HttpError> {
        if let BodyState::Live { conn, consumed } = &mut self.body {
            if !*consumed {
                *consumed = true;
                let conn = conn.clone();
                codec::read_body(&conn, self.status, &mut self.headers).await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status.0)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert!(StatusCode(100).is_informational());
        assert!(StatusCode(200).is_success());
        assert!(StatusCode(301).is_followable_redirect());
        assert!(StatusCode(307).is_followable_redirect());
        assert!(!StatusCode(308).is_followable_redirect());
        assert!(StatusCode(304).is_not_modified());
        assert!(!StatusCode(204).has_body());
        assert!(!StatusCode(304).has_body());
        assert!(!StatusCode(101).has_body());
        assert!(StatusCode(200).has_body());
    }

    #[tokio::test]
    async fn wrapped_text_body() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        let mut resp = Response::wrapped(StatusCode(200), headers, CachedBody::Text("hi".into()));
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body_string().await.unwrap(), "hi");
        // wrapped bodies may be read again
        assert_eq!(resp.body_string().await.unwrap(), "hi");
    }

    #[test]
    fn retry_after_seconds_and_date() {
        let mut headers = Headers::new();
        headers.set("Retry-After", "120");
        let resp = Response::wrapped(StatusCode(503), headers, CachedBody::None);
        assert_eq!(resp.retry_after(), Some(RetryAfter::Seconds(120)));

        let mut headers = Headers::new();
        headers.set("Retry-After", "Sun, 06 Nov 1994 08:49:37 GMT");
        let resp = Response::wrapped(StatusCode(503), headers, CachedBody::None);
        match resp.retry_after() {
            Some(RetryAfter::Date(d)) => assert_eq!(d.timestamp(), 784111777),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn connection_close_latch_source() {
        let mut headers = Headers::new();
        headers.set("Connection", "close");
        let resp = Response::wrapped(StatusCode(200), headers, CachedBody::None);
        assert!(resp.connection_close());
    }
}
