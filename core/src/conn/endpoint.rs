/*
 * endpoint.rs
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

//! Endpoint: the immutable identity of a remote origin. The pool keys on the
//! resolved address and port, so `localhost` and `127.0.0.1` share a slot.

use std::hash::{Hash, Hasher};
use std::net::SocketAddr;

use tokio::net::lookup_host;

use crate::error::HttpError;
use crate::url::HttpUrl;

/// A resolved origin: host name (for SNI and the Host header), resolved
/// socket address, and whether the connection is TLS. Immutable.
#[derive(Debug, Clone)]
pub struct Endpoint {
    host: String,
    addr: SocketAddr,
    tls: bool,
}

impl Endpoint {
    /// Resolve a URL's authority to an endpoint. Port 80/443 is already
    /// inferred by the URL parser; the first resolved address wins.
    pub async fn resolve(url: &HttpUrl) -> Result<Self, HttpError> {
        let addr = lookup_host((url.host(), url.port()))
            .await?
            .next()
            .ok_or_else(|| {
                HttpError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}", url.host()),
                ))
            })?;
        Ok(Self { host: url.host().to_string(), addr, tls: url.is_tls() })
    }

    pub fn from_parts(host: impl Into<String>, addr: SocketAddr, tls: bool) -> Self {
        Self { host: host.into(), addr, tls }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }
}

/// Equality and hashing use the resolved address (which carries the port)
/// only, never the host spelling.
impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]{}", self.host, self.addr, if self.tls { "+tls" } else { "" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_uses_resolved_address() {
        let addr: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let a = Endpoint::from_parts("localhost", addr, false);
        let b = Endpoint::from_parts("127.0.0.1", addr, false);
        assert_eq!(a, b);
        let other = Endpoint::from_parts("localhost", "127.0.0.1:81".parse().unwrap(), false);
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn resolves_loopback() {
        let url = HttpUrl::parse("http://127.0.0.1:8080/").unwrap();
        let e = Endpoint::resolve(&url).await.unwrap();
        assert_eq!(e.port(), 8080);
        assert!(!e.is_tls());
    }
}
