/*
 * parser.rs
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

//! HTTP/1.1 response push parser: status line, headers, body (Content-Length
//! or chunked), trailers. Status and header lines tolerate a bare LF
//! terminator; chunk framing is strictly CRLF and any deviation is fatal.

use bytes::{Buf, BytesMut};

use crate::error::HttpError;

/// Callback for response parse events. The codec implements this and
/// forwards to the caller's surface.
pub trait ResponseSink {
    fn status(&mut self, version: &str, code: u16, reason: Option<&str>);
    fn header(&mut self, name: &str, value: &str);
    fn body_data(&mut self, data: &[u8]);
    /// End of one chunk (chunked bodies only); body_data calls in between
    /// belong to a single chunk.
    fn chunk_end(&mut self);
    fn trailer(&mut self, name: &str, value: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Headers done; caller must inspect them and call set_body_mode().
    HeadersComplete,
    Body,
    ChunkSize,
    ChunkData,
    /// The CRLF that closes a chunk payload.
    ChunkDataEnd,
    ChunkTrailer,
    Done,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; the sink
/// is invoked as complete tokens are parsed. Partial data stays in the buffer.
pub struct ResponseParser {
    state: ParseState,
    content_length: u64,
    bytes_received: u64,
    chunk_remaining: u64,
    /// Bytes delivered for the current chunk (to suppress chunk_end for the
    /// terminating zero chunk).
    in_chunk: bool,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            content_length: 0,
            bytes_received: 0,
            chunk_remaining: 0,
            in_chunk: false,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == ParseState::Done
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Start parsing a chunked stream directly (no status line or headers).
    /// Used by the connection's chunk readers once the codec has already
    /// consumed the head.
    pub fn start_chunked(&mut self) {
        self.reset();
        self.state = ParseState::ChunkSize;
    }

    /// Find a line terminator: the index of the first LF. Returns
    /// (content_len, skip_len) where content excludes CR LF.
    fn find_line(buf: &[u8]) -> Option<(usize, usize)> {
        let lf = buf.iter().position(|&b| b == b'\n')?;
        if lf > 0 && buf[lf - 1] == b'\r' {
            Some((lf - 1, lf + 1))
        } else {
            Some((lf, lf + 1))
        }
    }

    /// Find a strict CRLF-terminated line; a bare LF is a framing error.
    fn find_crlf_line(buf: &[u8]) -> Result<Option<(usize, usize)>, HttpError> {
        match buf.iter().position(|&b| b == b'\n') {
            None => Ok(None),
            Some(lf) if lf > 0 && buf[lf - 1] == b'\r' => Ok(Some((lf - 1, lf + 1))),
            Some(_) => Err(HttpError::response("bare LF in chunked framing")),
        }
    }

    /// Consume and parse as much as possible. The sink is called for each
    /// complete token; partial tokens stay buffered for the next call.
    pub fn receive<S: ResponseSink>(
        &mut self,
        buf: &mut BytesMut,
        sink: &mut S,
    ) -> Result<(), HttpError> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let (end, skip) = match Self::find_line(buf) {
                        Some(x) => x,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(skip);
                    let line_str = std::str::from_utf8(&line[..end])
                        .map_err(|_| HttpError::response("status line is not UTF-8"))?;
                    let mut parts = line_str.splitn(3, ' ');
                    let version = parts
                        .next()
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| HttpError::response("empty status line"))?;
                    let code = parts
                        .next()
                        .and_then(|s| s.parse::<u16>().ok())
                        .filter(|c| (100..=599).contains(c))
                        .ok_or_else(|| {
                            HttpError::response(format!("malformed status line: {}", line_str))
                        })?;
                    let reason = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());
                    sink.status(version, code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let (end, skip) = match Self::find_line(buf) {
                        Some(x) => x,
                        None => return Ok(()),
                    };
                    if end == 0 {
                        buf.advance(skip);
                        self.state = ParseState::HeadersComplete;
                        return Ok(());
                    }
                    let line = buf.split_to(skip);
                    let line_str = std::str::from_utf8(&line[..end])
                        .map_err(|_| HttpError::response("header line is not UTF-8"))?;
                    match line_str.find(':') {
                        Some(colon) => {
                            let name = line_str[..colon].trim();
                            let value = line_str[colon + 1..].trim();
                            sink.header(name, value);
                        }
                        None => {
                            return Err(HttpError::response(format!(
                                "header line without a colon: {}",
                                line_str
                            )))
                        }
                    }
                }
                ParseState::HeadersComplete => return Ok(()),
                ParseState::Body => {
                    let remaining = (self.content_length - self.bytes_received) as usize;
                    let take = remaining.min(buf.len());
                    if take > 0 {
                        let data = buf.split_to(take);
                        sink.body_data(&data);
                        self.bytes_received += take as u64;
                    }
                    if self.bytes_received >= self.content_length {
                        self.state = ParseState::Done;
                    }
                }
                ParseState::ChunkSize => {
                    let (end, skip) = match Self::find_crlf_line(buf)? {
                        Some(x) => x,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(skip);
                    let line_str = std::str::from_utf8(&line[..end])
                        .map_err(|_| HttpError::response("chunk size line is not UTF-8"))?;
                    // chunk extensions after ';' are ignored
                    let hex = line_str.split(';').next().unwrap_or("").trim();
                    let size = u64::from_str_radix(hex, 16).map_err(|_| {
                        HttpError::response(format!("invalid chunk size: {}", line_str))
                    })?;
                    if size == 0 {
                        self.in_chunk = false;
                        self.state = ParseState::ChunkTrailer;
                    } else {
                        self.chunk_remaining = size;
                        self.in_chunk = true;
                        self.state = ParseState::ChunkData;
                    }
                }
                ParseState::ChunkData => {
                    let take = (self.chunk_remaining as usize).min(buf.len());
                    if take > 0 {
                        let data = buf.split_to(take);
                        sink.body_data(&data);
                        self.chunk_remaining -= take as u64;
                    }
                    if self.chunk_remaining == 0 {
                        self.state = ParseState::ChunkDataEnd;
                    } else {
                        return Ok(());
                    }
                }
                ParseState::ChunkDataEnd => {
                    if buf.len() < 2 {
                        return Ok(());
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(HttpError::response("chunk payload not terminated by CRLF"));
                    }
                    buf.advance(2);
                    if self.in_chunk {
                        sink.chunk_end();
                        self.in_chunk = false;
                    }
                    self.state = ParseState::ChunkSize;
                }
                ParseState::ChunkTrailer => {
                    let (end, skip) = match Self::find_crlf_line(buf)? {
                        Some(x) => x,
                        None => return Ok(()),
                    };
                    if end == 0 {
                        buf.advance(skip);
                        self.state = ParseState::Done;
                    } else {
                        let line = buf.split_to(skip);
                        let line_str = std::str::from_utf8(&line[..end])
                            .map_err(|_| HttpError::response("trailer line is not UTF-8"))?;
                        if let Some(colon) = line_str.find(':') {
                            let name = line_str[..colon].trim();
                            let value = line_str[colon + 1..].trim();
                            sink.trailer(name, value);
                        }
                    }
                }
                ParseState::Done => return Ok(()),
            }
        }
        Ok(())
    }

    /// Called after headers are received (state HeadersComplete). Chunked
    /// wins over Content-Length; an absent length means no body.
    pub fn set_body_mode(&mut self, content_length: Option<u64>, chunked: bool) {
        if self.state != ParseState::HeadersComplete {
            return;
        }
        if chunked {
            self.state = ParseState::ChunkSize;
        } else {
            match content_length {
                Some(n) if n > 0 => {
                    self.content_length = n;
                    self.bytes_received = 0;
                    self.state = ParseState::Body;
                }
                _ => self.state = ParseState::Done,
            }
        }
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
