/*
 * url.rs
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

//! HTTP URL value: parse absolute http/https URLs, build request targets, and
//! resolve redirect Locations against a base per RFC 3986 section 5.3.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::HttpError;

/// Bytes escaped when emitting the request target: controls, space, and the
/// characters that terminate or confuse the request line.
const TARGET: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

/// Parsed absolute HTTP or HTTPS URL. Port is inferred (80/443) when absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpUrl {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Always begins with '/'; "/" when the URL had no path.
    path: String,
    query: Option<String>,
    /// True when the URL spelled the port out rather than inheriting the default.
    explicit_port: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl HttpUrl {
    /// Parse an absolute http:// or https:// URL. Fragments are dropped.
    pub fn parse(input: &str) -> Result<Self, HttpError> {
        let input = input.trim();
        let (scheme, rest) = if let Some(rest) = strip_prefix_ignore_case(input, "http://") {
            (Scheme::Http, rest)
        } else if let Some(rest) = strip_prefix_ignore_case(input, "https://") {
            (Scheme::Https, rest)
        } else {
            return Err(HttpError::request(format!("not an absolute http(s) URL: {}", input)));
        };

        // authority ends at the first '/', '?', or '#'
        let authority_end = rest
            .find(|c| c == '/' || c == '?' || c == '#')
            .unwrap_or(rest.len());
        let authority = &rest[..authority_end];
        if authority.is_empty() {
            return Err(HttpError::request(format!("URL has no host: {}", input)));
        }
        // userinfo is not supported in this client; reject rather than misroute
        if authority.contains('@') {
            return Err(HttpError::request(format!("userinfo in URL is not supported: {}", input)));
        }
        let (host, port, explicit_port) = parse_host_port(authority, scheme)?;

        let tail = &rest[authority_end..];
        let tail = match tail.find('#') {
            Some(i) => &tail[..i],
            None => tail,
        };
        let (path, query) = match tail.find('?') {
            Some(i) => (&tail[..i], Some(tail[i + 1..].to_string())),
            None => (tail, None),
        };
        let path = if path.is_empty() { "/".to_string() } else { path.to_string() };

        Ok(Self { scheme, host, port, path, query, explicit_port })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The origin-form request target: path plus query, percent-escaped.
    pub fn request_target(&self) -> String {
        let mut target = utf8_percent_encode(&self.path, TARGET).to_string();
        if let Some(q) = &self.query {
            target.push('?');
            target.push_str(&utf8_percent_encode(q, TARGET).to_string());
        }
        target
    }

    /// Value for the Host header: host, plus the port when it is not the
    /// scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Render back to an absolute URL string.
    pub fn as_string(&self) -> String {
        let mut s = format!("{}://{}", self.scheme.as_str(), self.host);
        if self.explicit_port && self.port != self.scheme.default_port() {
            s.push_str(&format!(":{}", self.port));
        }
        s.push_str(&self.path);
        if let Some(q) = &self.query {
            s.push('?');
            s.push_str(q);
        }
        s
    }

    /// Resolve a reference (e.g. a redirect Location) against this URL per
    /// RFC 3986 section 5.3. Handles absolute URLs, scheme-relative
    /// references (//host/path), absolute paths (/foo), and relative paths
    /// with dot-segment removal.
    pub fn resolve(&self, reference: &str) -> Result<HttpUrl, HttpError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(self.clone());
        }
        // Absolute URL: take it verbatim.
        let lower = reference.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return HttpUrl::parse(reference);
        }
        // Scheme-relative: inherit our scheme.
        if let Some(rest) = reference.strip_prefix("//") {
            return HttpUrl::parse(&format!("{}://{}", self.scheme.as_str(), rest));
        }
        // Path (and optional query) reference against our authority.
        let reference = match reference.find('#') {
            Some(i) => &reference[..i],
            None => reference,
        };
        let (ref_path, ref_query) = match reference.find('?') {
            Some(i) => (&reference[..i], Some(reference[i + 1..].to_string())),
            None => (reference, None),
        };
        let merged = if ref_path.is_empty() {
            // Query-only reference keeps the base path.
            self.path.clone()
        } else if ref_path.starts_with('/') {
            ref_path.to_string()
        } else {
            // Merge with the base path: everything up to the last '/'.
            match self.path.rfind('/') {
                Some(i) => format!("{}{}", &self.path[..=i], ref_path),
                None => format!("/{}", ref_path),
            }
        };
        let path = remove_dot_segments(&merged);
        let query = if ref_path.is_empty() && ref_query.is_none() {
            self.query.clone()
        } else {
            ref_query
        };
        Ok(HttpUrl {
            scheme: self.scheme,
            host: self.host.clone(),
            port: self.port,
            path,
            query,
            explicit_port: self.explicit_port,
        })
    }
}

impl std::fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn parse_host_port(authority: &str, scheme: Scheme) -> Result<(String, u16, bool), HttpError> {
    // Bracketed IPv6 literal: [::1]:8080
    if let Some(rest) = authority.strip_prefix('[') {
        let close = rest
            .find(']')
            .ok_or_else(|| HttpError::request(format!("unterminated IPv6 literal: {}", authority)))?;
        let host = rest[..close].to_string();
        let after = &rest[close + 1..];
        if let Some(port_str) = after.strip_prefix(':') {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| HttpError::request(format!("invalid port: {}", port_str)))?;
            return Ok((host, port, true));
        }
        return Ok((host, scheme.default_port(), false));
    }
    match authority.rfind(':') {
        Some(i) => {
            let port_str = &authority[i + 1..];
            let port = port_str
                .parse::<u16>()
                .map_err(|_| HttpError::request(format!("invalid port: {}", port_str)))?;
            Ok((authority[..i].to_string(), port, true))
        }
        None => Ok((authority.to_string(), scheme.default_port(), false)),
    }
}

/// RFC 3986 section 5.2.4 remove_dot_segments.
fn remove_dot_segments(path: &str) -> String {
    let mut output: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                output.pop();
            }
            s => output.push(s),
        }
    }
    let trailing_dot = path.ends_with("/.") || path.ends_with("/..");
    let mut result = output.join("/");
    if trailing_dot && !result.ends_with('/') {
        result.push('/');
    }
    if result.is_empty() || !result.starts_with('/') {
        result.insert(0, '/');
    }
    result
}
