/*
 * client.rs
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

//! Client factory: holds the pool, cache, policies, and protocol version,
//! and mints transactions wired to them.

use std::sync::Arc;

use crate::cache::{CachingPolicy, HttpCache, SimpleCachingPolicy};
use crate::conn::ConnectionPool;
use crate::headers::HeaderPolicy;
use crate::request::HttpVersion;
use crate::transaction::Transaction;

/// Entry point for callers: configure once, then create one transaction per
/// exchange. Transactions share the client's pool and cache but are otherwise
/// independent.
pub struct HttpClient {
    pool: Arc<ConnectionPool>,
    cache: Option<Arc<dyn HttpCache>>,
    policy: Arc<dyn CachingPolicy>,
    header_policy: HeaderPolicy,
    version: HttpVersion,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            pool: Arc::new(ConnectionPool::with_defaults()),
            cache: None,
            policy: Arc::new(SimpleCachingPolicy),
            header_policy: HeaderPolicy::lenient(),
            version: HttpVersion::Http1_1,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn set_pool(&mut self, pool: Arc<ConnectionPool>) -> &mut Self {
        self.pool = pool;
        self
    }

    pub fn cache(&self) -> Option<&Arc<dyn HttpCache>> {
        self.cache.as_ref()
    }

    pub fn set_cache(&mut self, cache: Arc<dyn HttpCache>) -> &mut Self {
        self.cache = Some(cache);
        self
    }

    pub fn set_caching_policy(&mut self, policy: Arc<dyn CachingPolicy>) -> &mut Self {
        self.policy = policy;
        self
    }

    pub fn set_header_policy(&mut self, policy: HeaderPolicy) -> &mut Self {
        self.header_policy = policy;
        self
    }

    pub fn set_http_version(&mut self, version: HttpVersion) -> &mut Self {
        self.version = version;
        self
    }

    /// A fresh transaction carrying this client's pool, cache, and policies.
    pub fn new_transaction(&self) -> Transaction {
        let mut tx = Transaction::new(self.pool.clone());
        if let Some(cache) = &self.cache {
            tx.use_cache(cache.clone());
        }
        tx.use_caching_policy(self.policy.clone());
        tx.set_header_policy(self.header_policy);
        tx.set_http_version(self.version);
        tx
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
