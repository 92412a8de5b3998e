/*
 * pool.rs
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

//! Bounded connection pool keyed by endpoint. Acquisition retries on a poll
//! interval up to a bounded wait; cleanup runs on every attempt and evicts
//! closed, over-idle, and over-age connections. Acquisition order is not
//! first-come-first-serve.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::conn::connection::Connection;
use crate::conn::endpoint::Endpoint;
use crate::error::HttpError;

/// Pool knobs. All durations must be positive, all capacities non-zero.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_total: usize,
    pub max_per_endpoint: usize,
    /// Idle connections older than this are closed by cleanup.
    pub idle_alive: Duration,
    /// Connections older than this are closed by cleanup even if recently used.
    pub max_age: Duration,
    /// Bound on one acquisition attempt.
    pub max_wait: Duration,
    /// Sleep between acquisition retries.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: 32,
            max_per_endpoint: 8,
            idle_alive: Duration::from_secs(60),
            max_age: Duration::from_secs(2 * 60 * 60),
            max_wait: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl PoolConfig {
    fn validate(&self) -> Result<(), HttpError> {
        if self.max_total == 0 || self.max_per_endpoint == 0 {
            return Err(HttpError::config("pool capacity must be positive"));
        }
        if self.idle_alive.is_zero()
            || self.max_age.is_zero()
            || self.max_wait.is_zero()
            || self.poll_interval.is_zero()
        {
            return Err(HttpError::config("pool durations must be positive"));
        }
        Ok(())
    }
}

/// Callbacks for asynchronous acquisition. Exactly one of the three fires.
pub trait AcquireHandler: Send {
    fn on_obtained(self: Box<Self>, conn: Arc<Connection>);
    fn on_timeout(self: Box<Self>);
    fn on_error(self: Box<Self>, error: HttpError);
}

struct PoolState {
    connections: HashMap<Endpoint, Vec<Arc<Connection>>>,
    /// Live connections plus slots reserved for in-flight connects.
    total: usize,
    /// Per-endpoint in-flight connect reservations.
    reserved: HashMap<Endpoint, usize>,
}

enum Attempt {
    Got(Arc<Connection>),
    Connect,
    Wait,
}

/// Bounded map endpoint → connections. All state transitions happen under one
/// monitor; the retry sleep happens outside it so waiters progress
/// independently.
pub struct ConnectionPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Result<Self, HttpError> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(PoolState {
                connections: HashMap::new(),
                total: 0,
                reserved: HashMap::new(),
            }),
        })
    }

    pub fn with_defaults() -> Self {
        Self::new(PoolConfig::default()).expect("default config is valid")
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Acquire a connection to the endpoint, waiting up to `max_wait`.
    ///
    /// Each pass runs cleanup, scans the endpoint's list for an idle
    /// connection, and otherwise opens a new one when both the per-endpoint
    /// and global caps leave room. Between passes the caller sleeps
    /// `poll_interval` with the monitor released.
    pub async fn acquire(&self, endpoint: &Endpoint) -> Result<Arc<Connection>, HttpError> {
        let start = Instant::now();
        loop {
            let attempt = {
                let mut st = self.state.lock().expect("pool lock poisoned");
                self.cleanup_locked(&mut st);
                let reacquired = st
                    .connections
                    .get(endpoint)
                    .and_then(|list| list.iter().find(|c| c.acquire_if_idle()).cloned());
                match reacquired {
                    Some(conn) => Attempt::Got(conn),
                    None => {
                        let live = st.connections.get(endpoint).map_or(0, |l| l.len());
                        let reserved = st.reserved.get(endpoint).copied().unwrap_or(0);
                        if live + reserved < self.config.max_per_endpoint
                            && st.total < self.config.max_total
                        {
                            st.total += 1;
                            *st.reserved.entry(endpoint.clone()).or_insert(0) += 1;
                            Attempt::Connect
                        } else {
                            Attempt::Wait
                        }
                    }
                }
            };
            match attempt {
                Attempt::Got(conn) => return Ok(conn),
                Attempt::Connect => {
                    // connect outside the monitor; the reservation holds the slot
                    let opened = Connection::open(endpoint).await;
                    let mut st = self.state.lock().expect("pool lock poisoned");
                    if let Some(r) = st.reserved.get_mut(endpoint) {
                        *r -= 1;
                        if *r == 0 {
                            st.reserved.remove(endpoint);
                        }
                    }
                    match opened {
                        Ok(conn) => {
                            let conn = Arc::new(conn);
                            let ok = conn.acquire_if_idle();
                            debug_assert!(ok, "fresh connection must be idle");
                            st.connections.entry(endpoint.clone()).or_default().push(conn.clone());
                            return Ok(conn);
                        }
                        Err(e) => {
                            st.total -= 1;
                            return Err(e);
                        }
                    }
                }
                Attempt::Wait => {
                    sleep(self.config.poll_interval).await;
                    if start.elapsed() >= self.config.max_wait {
                        return Err(HttpError::Timeout);
                    }
                }
            }
        }
    }

    /// Asynchronous acquisition: the same state machine on a spawned task.
    /// Exactly one handler callback fires.
    pub fn acquire_later(self: &Arc<Self>, endpoint: Endpoint, handler: Box<dyn AcquireHandler>) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            match pool.acquire(&endpoint).await {
                Ok(conn) => handler.on_obtained(conn),
                Err(HttpError::Timeout) => handler.on_timeout(),
                Err(e) => handler.on_error(e),
            }
        });
    }

    /// Drop closed connections; close and drop idle connections past
    /// `idle_alive` and any connection past `max_age`. In-use connections are
    /// never touched, whatever their age.
    fn cleanup_locked(&self, st: &mut PoolState) {
        let mut removed = 0usize;
        st.connections.retain(|_, list| {
            list.retain(|conn| {
                if conn.is_closed() {
                    removed += 1;
                    return false;
                }
                if conn.is_in_use() {
                    return true;
                }
                if conn.idling_time() > self.config.idle_alive || conn.age() > self.config.max_age {
                    conn.mark_closed();
                    removed += 1;
                    return false;
                }
                true
            });
            !list.is_empty()
        });
        st.total -= removed;
    }

    /// Number of pooled connections. Eventually consistent: racing acquirers
    /// may change it before the caller looks.
    pub fn size(&self) -> usize {
        let st = self.state.lock().expect("pool lock poisoned");
        st.connections.values().map(|l| l.len()).sum()
    }

    /// Number of pooled connections to one endpoint.
    pub fn endpoint_size(&self, endpoint: &Endpoint) -> usize {
        let st = self.state.lock().expect("pool lock poisoned");
        st.connections.get(endpoint).map_or(0, |l| l.len())
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size())
            .field("config", &self.config)
            .finish()
    }
}
