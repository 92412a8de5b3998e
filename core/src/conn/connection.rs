/*
 * connection.rs
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

//! A pooled connection: one leased byte channel to an endpoint. Tracks the
//! idle/in-use/closed lease state, buffers reads and writes, and offers the
//! line and chunked-transfer read helpers the codec drives.
//!
//! Lease discipline: I/O is only legal while in-use; acquire_if_idle is the
//! single atomic entry to in-use; closed is terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use crate::codec::parser::{ResponseParser, ResponseSink};
use crate::conn::endpoint::Endpoint;
use crate::error::HttpError;
use crate::net::HttpStream;

const READ_CHUNK: usize = 8192;

/// Receiver for streamed chunk delivery (`read_chunks`). One `chunk` call per
/// wire chunk, then trailers, then `end`.
pub trait ChunkSink {
    fn chunk(&mut self, data: &[u8]);
    fn trailer(&mut self, _name: &str, _value: &str) {}
    fn end(&mut self) {}
}

pub(crate) struct Io {
    pub(crate) stream: HttpStream,
    /// Bytes read off the wire and not yet consumed.
    pub(crate) rbuf: BytesMut,
    /// Bytes written and not yet flushed.
    wbuf: Vec<u8>,
}

impl Io {
    /// Read more bytes into rbuf. Returns the count; 0 is EOF.
    pub(crate) async fn fill(&mut self) -> std::io::Result<usize> {
        let mut tmp = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut tmp).await?;
        if n > 0 {
            self.rbuf.extend_from_slice(&tmp[..n]);
        }
        Ok(n)
    }
}

/// One connection to an endpoint, held by the pool and leased to at most one
/// caller at a time.
pub struct Connection {
    endpoint: Endpoint,
    opened_at: Instant,
    last_used_at: StdMutex<Instant>,
    in_use: AtomicBool,
    closed: AtomicBool,
    reading_chunks: AtomicBool,
    io: Mutex<Io>,
}

impl Connection {
    /// Open a stream to the endpoint. TLS handshakes complete here when the
    /// endpoint carries the TLS flag. The new connection is idle.
    pub async fn open(endpoint: &Endpoint) -> Result<Self, HttpError> {
        let stream = HttpStream::connect(endpoint.addr(), endpoint.host(), endpoint.is_tls()).await?;
        let now = Instant::now();
        Ok(Self {
            endpoint: endpoint.clone(),
            opened_at: now,
            last_used_at: StdMutex::new(now),
            in_use: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            reading_chunks: AtomicBool::new(false),
            io: Mutex::new(Io { stream, rbuf: BytesMut::with_capacity(READ_CHUNK), wbuf: Vec::new() }),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Atomically move idle → in-use. Fails when already leased or closed.
    pub fn acquire_if_idle(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.in_use
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_reading_chunks(&self) -> bool {
        self.reading_chunks.load(Ordering::SeqCst)
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Time since last release. Zero while in-use.
    pub fn idling_time(&self) -> Duration {
        if self.is_in_use() {
            Duration::ZERO
        } else {
            self.last_used_at.lock().expect("lock poisoned").elapsed()
        }
    }

    /// Move in-use → idle: drop buffered and pending unread bytes without
    /// blocking, then stamp the idle clock. No-op when not leased.
    pub async fn release(&self) {
        if !self.is_in_use() {
            return;
        }
        if let Ok(mut io) = self.io.try_lock() {
            io.rbuf.clear();
            io.wbuf.clear();
            // zero-timeout reads: consume whatever already arrived, never wait
            let mut tmp = [0u8; READ_CHUNK];
            while let Ok(Ok(n)) = timeout(Duration::ZERO, io.stream.read(&mut tmp)).await {
                if n == 0 {
                    self.closed.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
        self.reading_chunks.store(false, Ordering::SeqCst);
        *self.last_used_at.lock().expect("lock poisoned") = Instant::now();
        self.in_use.store(false, Ordering::SeqCst);
    }

    /// Mark closed without touching the stream; the OS handle goes when the
    /// last reference drops. Used by pool cleanup, which must not block.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Close the stream. Terminal; a closed connection is never reacquired.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut io) = self.io.try_lock() {
            let _ = io.stream.shutdown().await;
        }
    }

    fn ensure_acquired(&self) -> Result<(), HttpError> {
        if self.is_closed() {
            return Err(HttpError::request("connection is closed"));
        }
        if !self.is_in_use() {
            return Err(HttpError::request("connection is not acquired"));
        }
        Ok(())
    }

    pub(crate) async fn lock_io(&self) -> Result<MutexGuard<'_, Io>, HttpError> {
        self.ensure_acquired()?;
        Ok(self.io.lock().await)
    }

    /// Buffer UTF-8 text for the next flush.
    pub async fn print(&self, text: &str) -> Result<(), HttpError> {
        self.write(text.as_bytes()).await
    }

    /// Buffer bytes for the next flush.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), HttpError> {
        let mut io = self.lock_io().await?;
        io.wbuf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write all buffered bytes to the stream and flush it.
    pub async fn flush(&self) -> Result<(), HttpError> {
        let mut io = self.lock_io().await?;
        if !io.wbuf.is_empty() {
            let out = std::mem::take(&mut io.wbuf);
            io.stream.write_all(&out).await?;
        }
        io.stream.flush().await?;
        Ok(())
    }

    /// Read one byte. None on a closed peer.
    pub async fn read(&self) -> Result<Option<u8>, HttpError> {
        let mut io = self.lock_io().await?;
        if io.rbuf.is_empty() && io.fill().await? == 0 {
            return Ok(None);
        }
        let b = io.rbuf[0];
        bytes::Buf::advance(&mut io.rbuf, 1);
        Ok(Some(b))
    }

    /// Read up to out.len() bytes. 0 on a closed peer.
    pub async fn read_buf(&self, out: &mut [u8]) -> Result<usize, HttpError> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut io = self.lock_io().await?;
        if io.rbuf.is_empty() && io.fill().await? == 0 {
            return Ok(0);
        }
        let n = out.len().min(io.rbuf.len());
        out[..n].copy_from_slice(&io.rbuf[..n]);
        bytes::Buf::advance(&mut io.rbuf, n);
        Ok(n)
    }

    /// Read one line, decoded as UTF-8, without its terminator. Accepts CRLF
    /// and bare LF. None when the peer closed before any byte of a line.
    pub async fn read_line(&self) -> Result<Option<String>, HttpError> {
        let mut io = self.lock_io().await?;
        loop {
            if let Some(lf) = io.rbuf.iter().position(|&b| b == b'\n') {
                let line = io.rbuf.split_to(lf + 1);
                let end = if lf > 0 && line[lf - 1] == b'\r' { lf - 1 } else { lf };
                let s = std::str::from_utf8(&line[..end])
                    .map_err(|_| HttpError::response("line is not UTF-8"))?
                    .to_string();
                return Ok(Some(s));
            }
            if io.fill().await? == 0 {
                if io.rbuf.is_empty() {
                    return Ok(None);
                }
                // EOF mid-line: return what we have
                let len = io.rbuf.len();
                let line = io.rbuf.split_to(len);
                let s = std::str::from_utf8(&line)
                    .map_err(|_| HttpError::response("line is not UTF-8"))?
                    .to_string();
                return Ok(Some(s));
            }
        }
    }

    /// True when a read would yield data without waiting.
    pub async fn input_ready(&self) -> Result<bool, HttpError> {
        let mut io = self.lock_io().await?;
        if !io.rbuf.is_empty() {
            return Ok(true);
        }
        match timeout(Duration::ZERO, io.fill()).await {
            Ok(Ok(n)) => Ok(n > 0),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(false),
        }
    }

    /// Read a complete chunked body: concatenated payload plus trailers.
    pub async fn read_all_chunks(&self) -> Result<(Vec<u8>, Vec<(String, String)>), HttpError> {
        struct Collect {
            body: Vec<u8>,
            trailers: Vec<(String, String)>,
        }
        impl ResponseSink for Collect {
            fn status(&mut self, _: &str, _: u16, _: Option<&str>) {}
            fn header(&mut self, _: &str, _: &str) {}
            fn body_data(&mut self, data: &[u8]) {
                self.body.extend_from_slice(data);
            }
            fn chunk_end(&mut self) {}
            fn trailer(&mut self, name: &str, value: &str) {
                self.trailers.push((name.to_string(), value.to_string()));
            }
        }
        let mut sink = Collect { body: Vec::new(), trailers: Vec::new() };
        self.drive_chunks(&mut sink).await?;
        Ok((sink.body, sink.trailers))
    }

    /// Stream a chunked body: the sink sees each wire chunk as one call.
    pub async fn read_chunks(&self, out: &mut dyn ChunkSink) -> Result<(), HttpError> {
        struct Stream<'a> {
            current: Vec<u8>,
            out: &'a mut dyn ChunkSink,
        }
        impl ResponseSink for Stream<'_> {
            fn status(&mut self, _: &str, _: u16, _: Option<&str>) {}
            fn header(&mut self, _: &str, _: &str) {}
            fn body_data(&mut self, data: &[u8]) {
                self.current.extend_from_slice(data);
            }
            fn chunk_end(&mut self) {
                let chunk = std::mem::take(&mut self.current);
                self.out.chunk(&chunk);
            }
            fn trailer(&mut self, name: &str, value: &str) {
                self.out.trailer(name, value);
            }
        }
        let mut sink = Stream { current: Vec::new(), out };
        self.drive_chunks(&mut sink).await?;
        sink.out.end();
        Ok(())
    }

    async fn drive_chunks<S: ResponseSink>(&self, sink: &mut S) -> Result<(), HttpError> {
        self.reading_chunks.store(true, Ordering::SeqCst);
        let result = async {
            let mut io = self.lock_io().await?;
            let mut parser = ResponseParser::new();
            parser.start_chunked();
            loop {
                parser.receive(&mut io.rbuf, sink)?;
                if parser.is_done() {
                    return Ok(());
                }
                if io.fill().await? == 0 {
                    return Err(HttpError::response("connection closed inside chunked body"));
                }
            }
        }
        .await;
        self.reading_chunks.store(false, Ordering::SeqCst);
        result
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("in_use", &self.is_in_use())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, tokio::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let endpoint = Endpoint::from_parts("127.0.0.1", addr, false);
        let (conn, server) = tokio::join!(Connection::open(&endpoint), async {
            listener.accept().await.unwrap().0
        });
        (conn.unwrap(), server)
    }

    #[tokio::test]
    async fn acquire_is_exclusive() {
        let (conn, _server) = pair().await;
        assert!(conn.acquire_if_idle());
        assert!(!conn.acquire_if_idle());
        conn.release().await;
        assert!(conn.acquire_if_idle());
    }

    #[tokio::test]
    async fn closed_is_terminal() {
        let (conn, _server) = pair().await;
        conn.close().await;
        assert!(conn.is_closed());
        assert!(!conn.acquire_if_idle());
    }

    #[tokio::test]
    async fn io_requires_lease() {
        let (conn, _server) = pair().await;
        assert!(conn.write(b"x").await.is_err());
        assert!(conn.acquire_if_idle());
        assert!(conn.write(b"x").await.is_ok());
    }

    #[tokio::test]
    async fn read_line_accepts_both_terminators() {
        let (conn, mut server) = pair().await;
        assert!(conn.acquire_if_idle());
        server.write_all(b"alpha\r\nbeta\ngamma").await.unwrap();
        server.shutdown().await.unwrap();
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("alpha"));
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("beta"));
        // EOF mid-line yields the partial line, then None
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("gamma"));
        assert_eq!(conn.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_is_buffered_until_flush() {
        let (conn, mut server) = pair().await;
        assert!(conn.acquire_if_idle());
        conn.print("PING").await.unwrap();
        // nothing on the wire yet
        let mut probe = [0u8; 4];
        let pending = timeout(Duration::from_millis(50), server.read_exact(&mut probe)).await;
        assert!(pending.is_err());
        conn.flush().await.unwrap();
        server.read_exact(&mut probe).await.unwrap();
        assert_eq!(&probe, b"PING");
    }

    #[tokio::test]
    async fn read_all_chunks_collects_payload_and_trailers() {
        let (conn, mut server) = pair().await;
        assert!(conn.acquire_if_idle());
        server
            .write_all(b"5\r\nhello\r\n6\r\n world\r\n0\r\nX-Check: 1\r\n\r\n")
            .await
            .unwrap();
        let (body, trailers) = conn.read_all_chunks().await.unwrap();
        assert_eq!(body, b"hello world");
        assert_eq!(trailers, vec![("X-Check".to_string(), "1".to_string())]);
        assert!(!conn.is_reading_chunks());
    }

    #[tokio::test]
    async fn release_drains_pending_bytes() {
        let (conn, mut server) = pair().await;
        assert!(conn.acquire_if_idle());
        server.write_all(b"leftover junk").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        conn.release().await;
        assert!(conn.acquire_if_idle());
        // the junk must not be visible to the next lease
        server.write_all(b"fresh\r\n").await.unwrap();
        assert_eq!(conn.read_line().await.unwrap().as_deref(), Some("fresh"));
    }
}
