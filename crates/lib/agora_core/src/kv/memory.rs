//! In-process key-value store with TTL-based expiration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{KeyValueStore, KvError};
use crate::clock::{Clock, SystemClock};

/// A stored value with optional expiry.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// `DashMap`-backed [`KeyValueStore`]. Expired entries read as absent and are
/// evicted lazily on access or by [`MemoryStore::cleanup`].
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store whose TTLs are measured against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Remaining lifetime of a live key. `None` if absent or without TTL.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if !entry.is_live(now) {
            return None;
        }
        entry.expires_at.and_then(|at| (at - now).to_std().ok())
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }

    fn deadline(&self, ttl: Duration) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: self.deadline(ttl),
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let now = self.clock.now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".into(),
            expires_at: None,
        });
        if !entry.is_live(now) {
            *entry = Entry {
                value: "0".into(),
                expires_at: None,
            };
        }
        let current: i64 = entry
            .value
            .parse()
            .map_err(|_| KvError::NotAnInteger(key.to_string()))?;
        let next = current + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, KvError> {
        let now = self.clock.now();
        let deadline = self.deadline(ttl);
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = deadline;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64, KvError> {
        let now = self.clock.now();
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(*key)
                && entry.is_live(now)
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
