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

//! Pluggable response cache keyed by request fingerprint, plus the policy
//! seam that decides when it is written and consulted.

pub mod fifo;
pub mod policy;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::headers::Headers;
use crate::request::HttpRequest;
use crate::response::StatusCode;

pub use fifo::FifoCache;
pub use policy::{CachingPolicy, SimpleCachingPolicy};

/// Kind of body a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    None,
    Text,
    File,
}

/// Mapping from request fingerprint to previously seen response parts.
///
/// Status, headers, and body have separate setters, so partially populated
/// entries are legal; every getter can come back empty for a key that exists.
pub trait HttpCache: Send + Sync {
    fn exists(&self, req: &HttpRequest) -> bool;

    fn evict(&self, req: &HttpRequest);

    fn put_status(&self, req: &HttpRequest, status: StatusCode);

    fn put_headers(&self, req: &HttpRequest, headers: &Headers);

    fn put_text(&self, req: &HttpRequest, body: &str);

    fn put_file(&self, req: &HttpRequest, path: &Path);

    fn status(&self, req: &HttpRequest) -> Option<StatusCode>;

    fn headers(&self, req: &HttpRequest) -> Option<Headers>;

    fn body_text(&self, req: &HttpRequest) -> Option<String>;

    fn body_file(&self, req: &HttpRequest) -> Option<PathBuf>;

    /// Time since the entry was first inserted.
    fn age(&self, req: &HttpRequest) -> Option<Duration>;

    fn body_kind(&self, req: &HttpRequest) -> BodyKind;
}
