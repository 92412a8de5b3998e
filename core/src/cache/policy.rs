/*
 * policy.rs
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

//! Caching policy: when to write the cache and when to consult it. The
//! default treats the cache as a revalidation fallback, never as a primary
//! lookup path. A policy honouring Cache-Control/ETag freshness can be
//! swapped in through the same trait.

use crate::request::HttpRequest;
use crate::response::Response;

pub trait CachingPolicy: Send + Sync {
    /// Store this exchange's status and headers?
    fn should_store(&self, req: &HttpRequest, resp: &Response) -> bool;

    /// Consult the cache before sending?
    fn should_look(&self, req: &HttpRequest) -> bool;

    /// Consult the cache after seeing this response?
    fn should_look_on(&self, req: &HttpRequest, resp: &Response) -> bool;
}

/// Store responses to cacheable methods; consult the cache only when the
/// server answered 304 Not Modified.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleCachingPolicy;

impl CachingPolicy for SimpleCachingPolicy {
    fn should_store(&self, req: &HttpRequest, _resp: &Response) -> bool {
        req.method.response_cacheable()
    }

    fn should_look(&self, _req: &HttpRequest) -> bool {
        false
    }

    fn should_look_on(&self, _req: &HttpRequest, resp: &Response) -> bool {
        resp.status().is_not_modified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::request::{HttpVersion, Method, Target};
    use crate::response::{CachedBody, StatusCode};
    use crate::url::HttpUrl;

    fn req(method: Method) -> HttpRequest {
        HttpRequest::new(
            method,
            Target::Url(HttpUrl::parse("http://a.example/x").unwrap()),
            Headers::new(),
            HttpVersion::Http1_1,
        )
    }

    fn resp(code: u16) -> Response {
        Response::wrapped(StatusCode(code), Headers::new(), CachedBody::None)
    }

    #[test]
    fn stores_only_cacheable_methods() {
        let p = SimpleCachingPolicy;
        assert!(p.should_store(&req(Method::Get), &resp(200)));
        assert!(p.should_store(&req(Method::Head), &resp(200)));
        assert!(!p.should_store(&req(Method::Post), &resp(200)));
    }

    #[test]
    fn looks_only_on_not_modified() {
        let p = SimpleCachingPolicy;
        assert!(!p.should_look(&req(Method::Get)));
        assert!(p.should_look_on(&req(Method::Get), &resp(304)));
        assert!(!p.should_look_on(&req(Method::Get), &resp(200)));
    }
}
