/*
 * transaction.rs
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

//! Transaction: one logical exchange on top of the pool and codec. Handles
//! redirects, 304 revalidation with the cache, repeat budgets, and the
//! Connection: close lifecycle. Single-use: exactly one terminal call
//! (make_request, make_request_later, or send_chunks), then close().

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{BodyKind, CachingPolicy, HttpCache, SimpleCachingPolicy};
use crate::codec;
use crate::codec::coding::ContentCoding;
use crate::codec::CodecOptions;
use crate::conn::{Connection, ConnectionPool, Endpoint};
use crate::error::HttpError;
use crate::headers::{HeaderPolicy, Headers};
use crate::request::{HttpRequest, HttpVersion, Method, Target};
use crate::response::{CachedBody, Response, StatusCode};
use crate::url::HttpUrl;

const DEFAULT_MAX_REDIRECTS: u32 = 10;
const DEFAULT_MAX_REPEATS: u32 = 5;

/// Completion callback for `make_request_later`. Receives the transaction
/// back so the caller can read the body and close it.
pub type ResponseCallback =
    Box<dyn FnOnce(Transaction, Result<Response, HttpError>) + Send + 'static>;

enum BodySource {
    None,
    Text(String),
    File(PathBuf),
}

/// Drives one exchange. Configure, then exactly one terminal call, then
/// `close()`.
pub struct Transaction {
    pool: Arc<ConnectionPool>,
    cache: Option<Arc<dyn HttpCache>>,
    policy: Arc<dyn CachingPolicy>,
    header_policy: HeaderPolicy,
    opts: CodecOptions,
    headers: Headers,
    version: HttpVersion,
    body: BodySource,
    max_redirects: u32,
    max_repeats: u32,
    throw_if_max_repeats: bool,
    repeat_on_not_modified: bool,
    current_redirects: u32,
    current_repeats: u32,
    used: bool,
    closed: bool,
    disconnect_on_close: bool,
    conn: Option<Arc<Connection>>,
}

impl Transaction {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            cache: None,
            policy: Arc::new(SimpleCachingPolicy),
            header_policy: HeaderPolicy::lenient(),
            opts: CodecOptions::default(),
            headers: Headers::new(),
            version: HttpVersion::Http1_1,
            body: BodySource::None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_repeats: DEFAULT_MAX_REPEATS,
            throw_if_max_repeats: false,
            repeat_on_not_modified: false,
            current_redirects: 0,
            current_repeats: 0,
            used: false,
            closed: false,
            disconnect_on_close: false,
            conn: None,
        }
    }

    /// Use a string body. The UTF-8 bytes are compressed per the request's
    /// Content-Encoding at send time and Content-Length is set to the
    /// compressed size. Conflicts with `send_file`.
    pub fn send_string(&mut self, body: impl Into<String>) -> Result<&mut Self, HttpError> {
        if matches!(self.body, BodySource::File(_)) {
            return Err(HttpError::request("both string and file body sources set"));
        }
        self.body = BodySource::Text(body.into());
        Ok(self)
    }

    /// Use a file body, read in full at send time. Conflicts with `send_string`.
    pub fn send_file(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self, HttpError> {
        if matches!(self.body, BodySource::Text(_)) {
            return Err(HttpError::request("both string and file body sources set"));
        }
        self.body = BodySource::File(path.into());
        Ok(self)
    }

    /// Replace the request header template.
    pub fn set_headers(&mut self, headers: Headers) -> &mut Self {
        self.headers = headers;
        self
    }

    pub fn set_http_version(&mut self, version: HttpVersion) -> &mut Self {
        self.version = version;
        self
    }

    pub fn use_cache(&mut self, cache: Arc<dyn HttpCache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    pub fn use_caching_policy(&mut self, policy: Arc<dyn CachingPolicy>) -> &mut Self {
        self.policy = policy;
        self
    }

    pub fn set_header_policy(&mut self, policy: HeaderPolicy) -> &mut Self {
        self.header_policy = policy;
        self
    }

    pub fn set_max_redirects(&mut self, n: u32) -> &mut Self {
        self.max_redirects = n;
        self
    }

    pub fn set_max_repeats(&mut self, n: u32) -> &mut Self {
        self.max_repeats = n;
        self
    }

    /// Fail with an error when the repeat budget runs out instead of
    /// returning the last 304.
    pub fn set_throw_if_max_repeats(&mut self, b: bool) -> &mut Self {
        self.throw_if_max_repeats = b;
        self
    }

    /// On a 304 without a cache entry, strip the conditional headers and
    /// repeat the request.
    pub fn set_repeat_on_not_modified(&mut self, b: bool) -> &mut Self {
        self.repeat_on_not_modified = b;
        self
    }

    /// Treat a response version mismatch as fatal instead of a warning.
    pub fn set_strict_version(&mut self, b: bool) -> &mut Self {
        self.opts.strict_version = b;
        self
    }

    fn mark_used(&mut self) -> Result<(), HttpError> {
        if self.used {
            return Err(HttpError::request("transaction was already used"));
        }
        self.used = true;
        Ok(())
    }

    fn check_headers(&self) -> Result<(), HttpError> {
        for (name, _) in self.headers.iter() {
            self.header_policy.check(name)?;
        }
        Ok(())
    }

    /// Materialise the body bytes and stamp Content-Length. String bodies are
    /// compressed per the request Content-Encoding; file bodies are read in
    /// full as they are.
    async fn prepare_body(&mut self) -> Result<Option<Vec<u8>>, HttpError> {
        match &self.body {
            BodySource::None => Ok(None),
            BodySource::Text(s) => {
                let coding = match self.headers.get("Content-Encoding") {
                    None => ContentCoding::Identity,
                    Some(token) => ContentCoding::from_token(token).ok_or_else(|| {
                        HttpError::request(format!("unsupported request content coding: {}", token))
                    })?,
                };
                let encoded = coding.encode(s.as_bytes())?;
                self.headers.set("Content-Length", encoded.len().to_string());
                Ok(Some(encoded))
            }
            BodySource::File(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        HttpError::request(format!("body file not found: {}", path.display()))
                    } else {
                        HttpError::Io(e)
                    }
                })?;
                self.headers.set("Content-Length", bytes.len().to_string());
                Ok(Some(bytes))
            }
        }
    }

    fn build_request(&self, method: Method, url: &HttpUrl) -> HttpRequest {
        HttpRequest::new(method, Target::Url(url.clone()), self.headers.clone(), self.version)
    }

    async fn acquire(&mut self, url: &HttpUrl) -> Result<Arc<Connection>, HttpError> {
        let endpoint = Endpoint::resolve(url).await?;
        let conn = self.pool.acquire(&endpoint).await?;
        self.conn = Some(conn.clone());
        Ok(conn)
    }

    /// Release the latched connection back to the pool (idle), e.g. before
    /// switching hosts on a redirect.
    async fn release_conn(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.release().await;
        }
    }

    /// Run the exchange and return the final response. Blocking variant.
    pub async fn make_request(&mut self, method: Method, url: &str) -> Result<Response, HttpError> {
        self.mark_used()?;
        self.check_headers()?;
        let body = self.prepare_body().await?;
        let mut url = HttpUrl::parse(url)?;
        let mut conn = self.acquire(&url).await?;

        loop {
            let req = self.build_request(method, &url);
            codec::write_request(&conn, &req).await?;
            if let Some(b) = &body {
                conn.write(b).await?;
                conn.flush().await?;
            }

            let mut resp = if self.policy.should_look(&req) {
                match self.lookup_cache(&req) {
                    Some(cached) => cached,
                    None => self.parse_live(&conn, &req).await?,
                }
            } else {
                self.parse_live(&conn, &req).await?
            };

            let code = resp.status();
            if code.is_followable_redirect() {
                self.current_redirects += 1;
                if self.current_redirects >= self.max_redirects {
                    return Err(HttpError::response(format!(
                        "redirect limit of {} exceeded",
                        self.max_redirects
                    )));
                }
                resp.drain().await?;
                let location = resp
                    .header("Location")
                    .map(str::to_string)
                    .ok_or_else(|| HttpError::response("redirect without a Location header"))?;
                let next = url.resolve(&location)?;
                debug!(from = %url, to = %next, code = code.as_u16(), "following redirect");
                let absolute_path = location.starts_with('/') && !location.starts_with("//");
                if !absolute_path {
                    self.release_conn().await;
                    conn = self.acquire(&next).await?;
                }
                url = next;
                continue;
            }

            if code.is_not_modified() {
                if self.policy.should_look_on(&req, &resp) {
                    if let Some(cached) = self.lookup_cache(&req) {
                        self.disconnect_on_close = resp.connection_close();
                        return Ok(cached);
                    }
                }
                if self.repeat_on_not_modified {
                    self.current_repeats += 1;
                    if self.current_repeats >= self.max_repeats {
                        if self.throw_if_max_repeats {
                            return Err(HttpError::response(format!(
                                "repeat limit of {} exceeded",
                                self.max_repeats
                            )));
                        }
                        self.disconnect_on_close = resp.connection_close();
                        return Ok(resp);
                    }
                    self.headers.remove("If-Modified-Since");
                    self.headers.remove("If-None-Match");
                    self.headers.remove("If-Unmodified-Since");
                    // the server may close after a 304: repeat on a fresh connection
                    self.release_conn().await;
                    conn = self.acquire(&url).await?;
                    continue;
                }
            }

            self.disconnect_on_close = resp.connection_close();
            if self.policy.should_store(&req, &resp) {
                if let Some(cache) = &self.cache {
                    cache.put_status(&req, resp.status());
                    cache.put_headers(&req, resp.headers());
                }
            }
            return Ok(resp);
        }
    }

    /// Asynchronous variant: runs the same state machine on a spawned task
    /// and hands the transaction back through the callback, exactly once.
    pub fn make_request_later(mut self, method: Method, url: &str, on_complete: ResponseCallback) {
        let url = url.to_string();
        tokio::spawn(async move {
            let result = self.make_request(method, &url).await;
            on_complete(self, result);
        });
    }

    /// Terminal call for a streamed chunked request body. The returned sender
    /// owns this transaction; `end()` closes it and yields the response.
    pub fn send_chunks(mut self, method: Method, url: &str) -> Result<ChunkSender, HttpError> {
        self.mark_used()?;
        self.check_headers()?;
        if !matches!(self.body, BodySource::None) {
            return Err(HttpError::request("chunked send conflicts with a prepared body source"));
        }
        let url = HttpUrl::parse(url)?;
        Ok(ChunkSender { tx: self, method, url, state: SenderState::Created })
    }

    fn lookup_cache(&self, req: &HttpRequest) -> Option<Response> {
        let cache = self.cache.as_deref()?;
        if !cache.exists(req) {
            return None;
        }
        let status = cache.status(req).unwrap_or(StatusCode(200));
        let headers = cache.headers(req).unwrap_or_default();
        let body = match cache.body_kind(req) {
            BodyKind::None => CachedBody::None,
            BodyKind::Text => cache.body_text(req).map(CachedBody::Text).unwrap_or(CachedBody::None),
            BodyKind::File => cache.body_file(req).map(CachedBody::File).unwrap_or(CachedBody::None),
        };
        Some(Response::wrapped(status, headers, body))
    }

    async fn parse_live(
        &self,
        conn: &Arc<Connection>,
        req: &HttpRequest,
    ) -> Result<Response, HttpError> {
        let head = codec::read_head(conn, req, &self.opts).await?;
        Ok(Response::live(head, conn.clone()))
    }

    /// Finish the exchange: close the connection when the response carried
    /// `Connection: close`, otherwise release it to the pool. Best-effort,
    /// idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(conn) = self.conn.take() {
            if self.disconnect_on_close {
                conn.close().await;
            } else {
                conn.release().await;
            }
        }
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SenderState {
    Created,
    Begun,
}

/// Streaming write surface for a `Transfer-Encoding: chunked` request body.
/// Strictly ordered: `begin()`, then `send_chunk()` any number of times, then
/// `end()`.
pub struct ChunkSender {
    tx: Transaction,
    method: Method,
    url: HttpUrl,
    state: SenderState,
}

impl ChunkSender {
    /// Open a connection and write the request head with
    /// `Transfer-Encoding: chunked`.
    pub async fn begin(&mut self) -> Result<(), HttpError> {
        if self.state != SenderState::Created {
            return Err(HttpError::request("begin() called out of order"));
        }
        self.tx.headers.set("Transfer-Encoding", "chunked");
        self.tx.headers.remove("Content-Length");
        let req = self.tx.build_request(self.method, &self.url);
        let conn = self.tx.acquire(&self.url).await?;
        codec::write_request(&conn, &req).await?;
        self.state = SenderState::Begun;
        Ok(())
    }

    /// Frame and send one non-empty chunk, applying the request's
    /// Content-Encoding to the payload first.
    pub async fn send_chunk(&mut self, data: &[u8]) -> Result<(), HttpError> {
        if self.state != SenderState::Begun {
            return Err(HttpError::request("send_chunk() called before begin()"));
        }
        if data.is_empty() {
            return Err(HttpError::request("chunk payload must not be empty"));
        }
        let coding = match self.tx.headers.get("Content-Encoding") {
            None => ContentCoding::Identity,
            Some(token) => ContentCoding::from_token(token).ok_or_else(|| {
                HttpError::request(format!("unsupported request content coding: {}", token))
            })?,
        };
        let payload = coding.encode(data)?;
        let conn = self
            .tx
            .conn
            .as_ref()
            .ok_or_else(|| HttpError::request("connection lost before send_chunk()"))?
            .clone();
        codec::write_chunk(&conn, &payload).await
    }

    /// Write the terminating zero chunk, read the response in full, close the
    /// transaction, and return the materialised response.
    pub async fn end(mut self) -> Result<Response, HttpError> {
        if self.state != SenderState::Begun {
            self.tx.close().await;
            return Err(HttpError::request("end() called before begin()"));
        }
        let result = self.finish().await;
        self.tx.close().await;
        result
    }

    async fn finish(&mut self) -> Result<Response, HttpError> {
        let conn = self
            .tx
            .conn
            .as_ref()
            .ok_or_else(|| HttpError::request("connection lost before end()"))?
            .clone();
        codec::finish_chunks(&conn).await?;
        let req = self.tx.build_request(self.method, &self.url);
        let mut resp = self.tx.parse_live(&conn, &req).await?;
        self.tx.disconnect_on_close = resp.connection_close();
        // materialise before close() releases the connection; this also pulls
        // any trailers into the header set
        let body = resp.body_string().await?;
        let status = resp.status();
        let reason = resp.reason().map(str::to_string);
        let headers = resp.headers().clone();
        let wrapped = if body.is_empty() { CachedBody::None } else { CachedBody::Text(body) };
        Ok(Response::wrapped(status, headers, wrapped).with_reason(reason))
    }
}
