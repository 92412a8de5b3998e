/*
 * fifo.rs
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

//! Default cache: bounded size with FIFO eviction and a TTL applied lazily
//! from the front of the eviction queue. Map and queue live under one lock;
//! ghost queue entries for already-evicted fingerprints are expected and
//! skipped.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::cache::{BodyKind, HttpCache};
use crate::error::HttpError;
use crate::headers::Headers;
use crate::request::HttpRequest;
use crate::response::StatusCode;

const DEFAULT_CAPACITY: usize = 32;
const DEFAULT_TTL: Duration = Duration::from_secs(600);

enum Body {
    None,
    Text(String),
    File(PathBuf),
}

struct Entry {
    status: Option<StatusCode>,
    headers: Option<Headers>,
    body: Body,
    inserted: Instant,
}

impl Entry {
    fn new() -> Self {
        Self { status: None, headers: None, body: Body::None, inserted: Instant::now() }
    }
}

struct Inner {
    map: HashMap<HttpRequest, Entry>,
    /// Insertion order; may hold fingerprints already evicted from the map.
    queue: VecDeque<HttpRequest>,
}

/// Bounded FIFO cache with TTL. Defaults: 32 entries, 10 minutes.
pub struct FifoCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl FifoCache {
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self, HttpError> {
        if capacity == 0 {
            return Err(HttpError::config("cache capacity must be positive"));
        }
        if ttl.is_zero() {
            return Err(HttpError::config("cache TTL must be positive"));
        }
        Ok(Self {
            capacity,
            ttl,
            inner: Mutex::new(Inner { map: HashMap::new(), queue: VecDeque::new() }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("cache lock poisoned")
    }

    /// Drop entries older than the TTL from the queue front. Ghost entries
    /// (already evicted) are popped and skipped.
    fn expire_front(&self, inner: &mut Inner) {
        loop {
            let drop_front = match inner.queue.front() {
                None => break,
                Some(front) => match inner.map.get(front) {
                    // ghost: evicted earlier, skip
                    None => true,
                    Some(entry) => {
                        if entry.inserted.elapsed() > self.ttl {
                            true
                        } else {
                            break;
                        }
                    }
                },
            };
            if drop_front {
                let key = inner.queue.pop_front().expect("front exists");
                inner.map.remove(&key);
            }
        }
    }

    /// Ensure an entry exists for the key, inserting and enqueueing when new,
    /// then evict from the queue front past capacity.
    fn entry_mut<'a>(&self, inner: &'a mut Inner, req: &HttpRequest) -> &'a mut Entry {
        if !inner.map.contains_key(req) {
            inner.map.insert(req.clone(), Entry::new());
            inner.queue.push_back(req.clone());
            while inner.map.len() > self.capacity {
                match inner.queue.pop_front() {
                    Some(key) => {
                        inner.map.remove(&key);
                    }
                    None => break,
                }
            }
        }
        inner.map.get_mut(req).expect("entry just ensured")
    }
}

impl Default for FifoCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL).expect("defaults are valid")
    }
}

impl HttpCache for FifoCache {
    fn exists(&self, req: &HttpRequest) -> bool {
        let mut inner = self.lock();
        self.expire_front(&mut inner);
        inner.map.contains_key(req)
    }

    fn evict(&self, req: &HttpRequest) {
        let mut inner = self.lock();
        inner.map.remove(req);
        // the queue keeps a ghost; it is skipped when popped
    }

    fn put_status(&self, req: &HttpRequest, status: StatusCode) {
        let mut inner = self.lock();
        self.entry_mut(&mut inner, req).status = Some(status);
    }

    fn put_headers(&self, req: &HttpRequest, headers: &Headers) {
        let mut inner = self.lock();
        self.entry_mut(&mut inner, req).headers = Some(headers.clone());
    }

    fn put_text(&self, req: &HttpRequest, body: &str) {
        let mut inner = self.lock();
        self.entry_mut(&mut inner, req).body = Body::Text(body.to_string());
    }

    fn put_file(&self, req: &HttpRequest, path: &Path) {
        let mut inner = self.lock();
        self.entry_mut(&mut inner, req).body = Body::File(path.to_path_buf());
    }

    fn status(&self, req: &HttpRequest) -> Option<StatusCode> {
        let mut inner = self.lock();
        self.expire_front(&mut inner);
        inner.map.get(req).and_then(|e| e.status)
    }

    fn headers(&self, req: &HttpRequest) -> Option<Headers> {
        let mut inner = self.lock();
        self.expire_front(&mut inner);
        inner.map.get(req).and_then(|e| e.headers.clone())
    }

    fn body_text(&self, req: &HttpRequest) -> Option<String> {
        let mut inner = self.lock();
        self.expire_front(&mut inner);
        match inner.map.get(req).map(|e| &e.body) {
            Some(Body::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn body_file(&self, req: &HttpRequest) -> Option<PathBuf> {
        let mut inner = self.lock();
        self.expire_front(&mut inner);
        match inner.map.get(req).map(|e| &e.body) {
            Some(Body::File(p)) => Some(p.clone()),
            _ => None,
        }
    }

    fn age(&self, req: &HttpRequest) -> Option<Duration> {
        let mut inner = self.lock();
        self.expire_front(&mut inner);
        inner.map.get(req).map(|e| e.inserted.elapsed())
    }

    fn body_kind(&self, req: &HttpRequest) -> BodyKind {
        let mut inner = self.lock();
        self.expire_front(&mut inner);
        match inner.map.get(req).map(|e| &e.body) {
            Some(Body::Text(_)) => BodyKind::Text,
            Some(Body::File(_)) => BodyKind::File,
            _ => BodyKind::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{HttpVersion, Method, Target};
    use crate::url::HttpUrl;

    fn req(path: &str) -> HttpRequest {
        HttpRequest::new(
            Method::Get,
            Target::Url(HttpUrl::parse(&format!("http://cache.example{}", path)).unwrap()),
            Headers::new(),
            HttpVersion::Http1_1,
        )
    }

    #[test]
    fn partial_entries_are_legal() {
        let cache = FifoCache::default();
        let r = req("/a");
        cache.put_status(&r, StatusCode(200));
        assert!(cache.exists(&r));
        assert_eq!(cache.status(&r), Some(StatusCode(200)));
        assert!(cache.headers(&r).is_none());
        assert!(cache.body_text(&r).is_none());
        assert_eq!(cache.body_kind(&r), BodyKind::None);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let cache = FifoCache::new(2, Duration::from_secs(60)).unwrap();
        cache.put_status(&req("/1"), StatusCode(200));
        cache.put_status(&req("/2"), StatusCode(200));
        cache.put_status(&req("/3"), StatusCode(200));
        assert!(!cache.exists(&req("/1")));
        assert!(cache.exists(&req("/2")));
        assert!(cache.exists(&req("/3")));
    }

    #[test]
    fn evict_leaves_tolerated_ghost() {
        let cache = FifoCache::new(2, Duration::from_secs(60)).unwrap();
        cache.put_status(&req("/1"), StatusCode(200));
        cache.evict(&req("/1"));
        assert!(!cache.exists(&req("/1")));
        // ghost in the queue must not break later insertions
        cache.put_status(&req("/2"), StatusCode(200));
        cache.put_status(&req("/3"), StatusCode(200));
        cache.put_status(&req("/4"), StatusCode(200));
        assert!(cache.exists(&req("/3")));
        assert!(cache.exists(&req("/4")));
    }

    #[test]
    fn ttl_expires_lazily() {
        let cache = FifoCache::new(8, Duration::from_millis(20)).unwrap();
        let r = req("/a");
        cache.put_status(&r, StatusCode(200));
        assert!(cache.exists(&r));
        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.exists(&r));
    }

    #[test]
    fn age_grows() {
        let cache = FifoCache::default();
        let r = req("/a");
        cache.put_status(&r, StatusCode(200));
        std::thread::sleep(Duration::from_millis(15));
        assert!(cache.age(&r).unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn body_setters_switch_kind() {
        let cache = FifoCache::default();
        let r = req("/a");
        cache.put_text(&r, "hello");
        assert_eq!(cache.body_kind(&r), BodyKind::Text);
        assert_eq!(cache.body_text(&r).as_deref(), Some("hello"));
        cache.put_file(&r, Path::new("/tmp/body.bin"));
        assert_eq!(cache.body_kind(&r), BodyKind::File);
        assert!(cache.body_text(&r).is_none());
    }

    #[test]
    fn zero_config_is_rejected() {
        assert!(FifoCache::new(0, Duration::from_secs(1)).is_err());
        assert!(FifoCache::new(1, Duration::ZERO).is_err());
    }
}
