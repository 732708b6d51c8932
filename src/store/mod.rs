use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

pub mod expire;
pub mod hash;
pub mod keys;
pub mod list;
pub mod set;
pub mod sort;
pub mod string;
pub mod value;
pub mod zset;

use expire::Expiry;
use value::Value;

use crate::error::StoreError;

/// One logical database: keys mapped to typed values plus expiry metadata.
///
/// Every command purges expired keys before it looks at the data, so an
/// expired key is never observable.
#[derive(Debug, Default)]
pub struct Keyspace {
    data: HashMap<String, Value>,
    expiry: Expiry,
}

pub type SharedKeyspace = Arc<RwLock<Keyspace>>;

pub fn new_shared() -> SharedKeyspace {
    Arc::new(RwLock::new(Keyspace::new()))
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every key whose deadline has passed.
    pub(crate) fn purge_expired(&mut self) {
        let expired = self.expiry.drain_expired(SystemTime::now());
        if expired.is_empty() {
            return;
        }
        for key in &expired {
            self.data.remove(key);
        }
        tracing::debug!(count = expired.len(), "expired keys purged");
        ::metrics::counter!(crate::metrics::EXPIRED_KEYS_TOTAL).increment(expired.len() as u64);
    }

    /// Deep copy of the current value, used for WATCH snapshots.
    pub fn snapshot(&mut self, key: &str) -> Option<Value> {
        self.purge_expired();
        self.data.get(key).cloned()
    }

    pub(crate) fn value(&mut self, key: &str) -> Option<&Value> {
        self.purge_expired();
        self.data.get(key)
    }

    /// Replace whatever is stored under `key`, clearing its expiry.
    pub(crate) fn replace(&mut self, key: &str, value: Value) {
        self.expiry.remove(key);
        if value.is_empty_container() {
            self.data.remove(key);
        } else {
            self.data.insert(key.to_owned(), value);
        }
    }

    /// Remove a key together with its expiry.
    pub(crate) fn remove(&mut self, key: &str) -> Option<(Value, Option<SystemTime>)> {
        let value = self.data.remove(key)?;
        Some((value, self.expiry.remove(key)))
    }

    /// Insert a value together with an optional deadline.
    pub(crate) fn insert_entry(&mut self, key: &str, value: Value, deadline: Option<SystemTime>) {
        self.replace(key, value);
        if let Some(deadline) = deadline {
            self.expiry.set_deadline(key.to_owned(), deadline);
        }
    }

    /// Remove a container key once its last element is gone.
    pub(crate) fn drop_if_empty(&mut self, key: &str) {
        if self.data.get(key).is_some_and(Value::is_empty_container) {
            self.data.remove(key);
            self.expiry.remove(key);
        }
    }
}

/// Resolve an inclusive `[start, end]` range with negative indices counting
/// from the end. Returns `None` when the range selects nothing.
pub(crate) fn inclusive_range(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let s = if start < 0 { (len + start).max(0) } else { start };
    let e = if end < 0 { len + end } else { end.min(len - 1) };
    if s > e || s >= len || e < 0 {
        return None;
    }
    Some((s as usize, e as usize))
}

pub(crate) fn parse_i64(raw: &[u8]) -> Result<i64, StoreError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(StoreError::NotInteger)
}

pub(crate) fn parse_f64(raw: &[u8]) -> Result<f64, StoreError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .ok_or(StoreError::NotFloat)
}
