/*
 * headers.rs
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

//! Case-insensitive multi-valued header container, the known-header registry,
//! and the policy that decides whether off-registry names warn or fail.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use crate::error::HttpError;

/// Registry classification of a header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    /// Registered and in current use.
    Permanent,
    /// Registered but obsoleted.
    Obsolete,
    /// Widely seen but never registered (X- prefixed and friends).
    Nonstandard,
    /// Not in the registry at all.
    Unknown,
}

/// Registered header names in current use. Lookup is by lowercase name.
const PERMANENT: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-encoding",
    "accept-language",
    "accept-ranges",
    "age",
    "allow",
    "authorization",
    "cache-control",
    "connection",
    "content-disposition",
    "content-encoding",
    "content-language",
    "content-length",
    "content-location",
    "content-range",
    "content-type",
    "cookie",
    "date",
    "etag",
    "expect",
    "expires",
    "from",
    "host",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-range",
    "if-unmodified-since",
    "last-modified",
    "location",
    "max-forwards",
    "origin",
    "pragma",
    "proxy-authenticate",
    "proxy-authorization",
    "range",
    "referer",
    "retry-after",
    "server",
    "set-cookie",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "vary",
    "via",
    "www-authenticate",
];

const OBSOLETE: &[&str] = &["content-md5", "keep-alive", "warning", "p3p"];

const NONSTANDARD: &[&str] = &[
    "dnt",
    "x-api-key",
    "x-correlation-id",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-powered-by",
    "x-request-id",
    "x-requested-with",
];

/// Classify a header name against the registry.
pub fn classify(name: &str) -> HeaderClass {
    let lower = name.to_ascii_lowercase();
    if PERMANENT.contains(&lower.as_str()) {
        HeaderClass::Permanent
    } else if OBSOLETE.contains(&lower.as_str()) {
        HeaderClass::Obsolete
    } else if NONSTANDARD.contains(&lower.as_str()) {
        HeaderClass::Nonstandard
    } else {
        HeaderClass::Unknown
    }
}

/// Decides what happens when an off-registry name is used. The lenient
/// default warns and carries on; strict rejects everything but permanent names.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPolicy {
    pub reject_unknown: bool,
    pub reject_nonstandard: bool,
    pub reject_obsolete: bool,
}

impl HeaderPolicy {
    pub fn lenient() -> Self {
        Self { reject_unknown: false, reject_nonstandard: false, reject_obsolete: false }
    }

    pub fn strict() -> Self {
        Self { reject_unknown: true, reject_nonstandard: true, reject_obsolete: true }
    }

    /// Check a name against the registry. Off-registry classes either warn or
    /// fail with `HttpError::Header` according to the policy flags.
    pub fn check(&self, name: &str) -> Result<(), HttpError> {
        match classify(name) {
            HeaderClass::Permanent => Ok(()),
            HeaderClass::Obsolete => {
                if self.reject_obsolete {
                    Err(HttpError::header(format!("obsolete header: {}", name)))
                } else {
                    warn!(header = name, "using obsolete header");
                    Ok(())
                }
            }
            HeaderClass::Nonstandard => {
                if self.reject_nonstandard {
                    Err(HttpError::header(format!("nonstandard header: {}", name)))
                } else {
                    warn!(header = name, "using nonstandard header");
                    Ok(())
                }
            }
            HeaderClass::Unknown => {
                if self.reject_unknown {
                    Err(HttpError::header(format!("unknown header: {}", name)))
                } else {
                    warn!(header = name, "using unknown header");
                    Ok(())
                }
            }
        }
    }
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self::lenient()
    }
}

struct Entry {
    /// Name as first given, for wire output.
    name: String,
    value: String,
}

/// Case-insensitive header set. Keys are lowercase; the as-given spelling of
/// the first insertion is kept for serialisation. Repeated fields are stored
/// as a single comma-separated value.
#[derive(Default)]
pub struct Headers {
    map: BTreeMap<String, Entry>,
}

impl Headers {
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    /// Set a header, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        self.map.insert(key, Entry { name, value: value.into() });
    }

    /// Add a header value. An existing value grows by comma-separated
    /// concatenation per the repeated-field rule.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let key = name.to_ascii_lowercase();
        match self.map.entry(key) {
            btree_map::Entry::Occupied(mut e) => {
                let entry = e.get_mut();
                entry.value.push_str(", ");
                entry.value.push_str(&value.into());
            }
            btree_map::Entry::Vacant(e) => {
                e.insert(Entry { name, value: value.into() });
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(|e| e.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.map.remove(&name.to_ascii_lowercase()).map(|e| e.value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate (as-given name, value) pairs in lowercase-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.values().map(|e| (e.name.as_str(), e.value.as_str()))
    }

    /// True when the value of `name` contains `token` as a comma-separated
    /// element, compared case-insensitively.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        match self.get(name) {
            Some(v) => v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)),
            None => false,
        }
    }

    /// Parse the value of the Date header per RFC 1123.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.date_value("Date")
    }

    /// Parse the value of any date-valued header (Date, Last-Modified,
    /// Expires, a date-form Retry-After) per RFC 1123.
    pub fn date_value(&self, name: &str) -> Option<DateTime<FixedOffset>> {
        let v = self.get(name)?;
        DateTime::parse_from_rfc2822(v.trim()).ok()
    }
}

impl Clone for Headers {
    fn clone(&self) -> Self {
        let mut map = BTreeMap::new();
        for (k, e) in &self.map {
            map.insert(k.clone(), Entry { name: e.name.clone(), value: e.value.clone() });
        }
        Self { map }
    }
}

impl std::fmt::Debug for Headers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.map.values().map(|e| (&e.name, &e.value))).finish()
    }
}

/// Equality and hashing ignore the as-given spelling: two sets with the same
/// lowercase names and values are equal. This feeds the request fingerprint.
impl PartialEq for Headers {
    fn eq(&self, other: &Self) -> bool {
        self.map.len() == other.map.len()
            && self
                .map
                .iter()
                .zip(other.map.iter())
                .all(|((ka, ea), (kb, eb))| ka == kb && ea.value == eb.value)
    }
}

impl Eq for Headers {}

impl Hash for Headers {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (k, e) in &self.map {
            k.hash(state);
            e.value.hash(state);
        }
    }
}
