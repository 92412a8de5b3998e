/*
 * lib.rs
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

//! Hexwire core: an HTTP/1.1 user agent that speaks the wire protocol
//! directly over TCP and TLS byte streams.
//!
//! The pieces: a bounded [`ConnectionPool`] keyed by resolved endpoint, a
//! request/response codec (content-length and chunked framing, gzip/deflate
//! content codings), and a [`Transaction`] driver that sequences one exchange
//! with redirects, 304 revalidation against a pluggable [`HttpCache`], and
//! Connection: close lifecycle handling.

pub mod cache;
pub mod client;
pub mod codec;
pub mod conn;
pub mod error;
pub mod headers;
pub mod net;
pub mod request;
pub mod response;
pub mod transaction;
pub mod url;

pub use cache::{BodyKind, CachingPolicy, FifoCache, HttpCache, SimpleCachingPolicy};
pub use client::HttpClient;
pub use codec::coding::ContentCoding;
pub use codec::CodecOptions;
pub use conn::{AcquireHandler, ChunkSink, Connection, ConnectionPool, Endpoint, PoolConfig};
pub use error::HttpError;
pub use headers::{HeaderClass, HeaderPolicy, Headers};
pub use request::{HttpRequest, HttpVersion, Method, Target};
pub use response::{CachedBody, Response, RetryAfter, StatusCode};
pub use transaction::{ChunkSender, ResponseCallback, Transaction};
pub use url::HttpUrl;
