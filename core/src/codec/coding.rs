/*
 * coding.rs
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

//! Content codings: gzip, deflate, identity. Whole-buffer wrap and unwrap;
//! chunked bodies code each chunk independently.

use std::io;
use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

/// A supported Content-Encoding token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Gzip,
    Deflate,
    Identity,
}

impl ContentCoding {
    /// Parse a coding token. Unknown tokens are None; callers warn and pass
    /// the bytes through verbatim.
    pub fn from_token(token: &str) -> Option<Self> {
        let t = token.trim();
        if t.eq_ignore_ascii_case("gzip") || t.eq_ignore_ascii_case("x-gzip") {
            Some(ContentCoding::Gzip)
        } else if t.eq_ignore_ascii_case("deflate") {
            Some(ContentCoding::Deflate)
        } else if t.is_empty() || t.eq_ignore_ascii_case("identity") {
            Some(ContentCoding::Identity)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
            ContentCoding::Identity => "identity",
        }
    }

    /// Apply this coding to a buffer.
    pub fn encode(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            ContentCoding::Identity => Ok(data.to_vec()),
            ContentCoding::Gzip => {
                let mut enc = GzEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                enc.finish()
            }
            ContentCoding::Deflate => {
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(data)?;
                enc.finish()
            }
        }
    }

    /// Remove this coding from a buffer.
    pub fn decode(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            ContentCoding::Identity => Ok(data.to_vec()),
            ContentCoding::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data).read_to_end(&mut out)?;
                Ok(out)
            }
            ContentCoding::Deflate => {
                let mut out = Vec::new();
                ZlibDecoder::new(data).read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }
}
