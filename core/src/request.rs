/*
 * request.rs
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

//! Request method, protocol version, and the immutable request value whose
//! equality doubles as the cache fingerprint.

use std::hash::{Hash, Hasher};

use crate::headers::Headers;
use crate::url::HttpUrl;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Patch,
    Connect,
    Other(&'static str),
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
            Method::Connect => "CONNECT",
            Method::Other(s) => s,
        }
    }

    /// Methods whose requests must carry Content-Length and Content-Type.
    pub fn requires_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    /// Methods whose requests must not carry a body.
    pub fn forbids_body(&self) -> bool {
        matches!(
            self,
            Method::Get | Method::Head | Method::Delete | Method::Options | Method::Trace | Method::Connect
        )
    }

    /// Methods whose responses are eligible for the cache.
    pub fn response_cacheable(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Method::Other(_))
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP protocol version on the request line and status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVersion {
    Http1_0,
    Http1_1,
}

impl HttpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http1_0 => "HTTP/1.0",
            HttpVersion::Http1_1 => "HTTP/1.1",
        }
    }

    /// Parse a version token from a status line. Unknown versions are None.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HTTP/1.0" => Some(HttpVersion::Http1_0),
            "HTTP/1.1" => Some(HttpVersion::Http1_1),
            _ => None,
        }
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Request target: a concrete URL, or the server-wide "*" form (OPTIONS).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Url(HttpUrl),
    Any,
}

impl Target {
    /// The form written on the request line.
    pub fn request_line_form(&self) -> String {
        match self {
            Target::Url(u) => u.request_target(),
            Target::Any => "*".to_string(),
        }
    }

    pub fn url(&self) -> Option<&HttpUrl> {
        match self {
            Target::Url(u) => Some(u),
            Target::Any => None,
        }
    }
}

/// An immutable request: version, method, target, headers. Equality and
/// hashing cover version + method + headers + target; when `any_path` is set
/// the target is compared minus its path, so one cache entry covers every
/// path on the origin.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub version: HttpVersion,
    pub method: Method,
    pub target: Target,
    pub headers: Headers,
    /// Compare the target minus its path (origin only).
    pub any_path: bool,
}

impl HttpRequest {
    pub fn new(method: Method, target: Target, headers: Headers, version: HttpVersion) -> Self {
        Self { version, method, target, headers, any_path: false }
    }

    pub fn url(&self) -> Option<&HttpUrl> {
        self.target.url()
    }
}

impl PartialEq for HttpRequest {
    fn eq(&self, other: &Self) -> bool {
        if self.version != other.version
            || self.method != other.method
            || self.headers != other.headers
            || self.any_path != other.any_path
        {
            return false;
        }
        match (&self.target, &other.target) {
            (Target::Any, Target::Any) => true,
            (Target::Url(a), Target::Url(b)) => {
                if self.any_path {
                    a.scheme() == b.scheme() && a.host() == b.host() && a.port() == b.port()
                } else {
                    a == b
                }
            }
            _ => false,
        }
    }
}

impl Eq for HttpRequest {}

impl Hash for HttpRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        self.method.hash(state);
        self.headers.hash(state);
        match &self.target {
            Target::Any => "*".hash(state),
            Target::Url(u) => {
                u.scheme().hash(state);
                u.host().hash(state);
                u.port().hash(state);
                if !self.any_path {
                    u.path().hash(state);
                    u.query().hash(state);
                }
            }
        }
    }
}
