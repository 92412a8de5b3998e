/*
 * error.rs
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

//! Error kinds for pool, codec, cache, and transaction operations.

use std::fmt;
use std::io;

/// Errors from pool acquisition, request framing, response parsing, or the transaction driver.
///
/// `Timeout` is distinct from `Io`: the former is the pool's bounded wait expiring,
/// the latter a socket or TLS failure. Framing errors bubble from the connection
/// through the codec to the transaction unchanged.
#[derive(Debug)]
pub enum HttpError {
    /// Invalid configuration: non-positive capacity or zero duration.
    Config(String),
    /// Header rejected by the active header policy.
    Header(String),
    /// Malformed or illegal request: conflicting body sources, missing file,
    /// missing Content-Length/Content-Type where required, terminal call reuse,
    /// chunk sender used out of order, unparsable URL.
    Request(String),
    /// Malformed or illegal response: bad status line, ill-framed chunk,
    /// version mismatch in strict mode, redirect or repeat budget exceeded.
    Response(String),
    /// Pool acquisition exceeded its bounded wait.
    Timeout,
    /// Underlying socket failure, including TLS failure.
    Io(io::Error),
}

impl HttpError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn header(msg: impl Into<String>) -> Self {
        Self::Header(msg.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    pub fn response(msg: impl Into<String>) -> Self {
        Self::Response(msg.into())
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Config(m) => write!(f, "invalid configuration: {}", m),
            HttpError::Header(m) => write!(f, "invalid header: {}", m),
            HttpError::Request(m) => write!(f, "invalid request: {}", m),
            HttpError::Response(m) => write!(f, "invalid response: {}", m),
            HttpError::Timeout => write!(f, "timed out waiting for a connection"),
            HttpError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HttpError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
