use super::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// Point-in-time view of one entry, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub key: String,
    pub inserted_at: DateTime<Utc>,
    #[serde(skip)]
    pub age: Duration,
    #[serde(skip)]
    pub remaining: Duration,
    pub expired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    /// Past TTL but not yet removed by a read or a sweep.
    pub expired_entries: usize,
    #[serde(skip)]
    pub ttl: Duration,
}

/// String-keyed store whose entries expire a fixed time after they were written.
///
/// Expired entries are dropped lazily by the read that finds them and eagerly
/// by [`TimeBoundedCache::sweep`]. Both use the same `age > ttl` test, so an
/// entry whose age is exactly the TTL is still served.
pub struct TimeBoundedCache<V> {
    label: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TimeBoundedCache<V> {
    pub fn new(label: impl Into<String>, ttl: Duration) -> Self {
        Self::with_clock(label, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(label: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            label: label.into(),
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let inserted_at = self.clock.now();
        tracing::debug!(
            "{} cache: stored {} for {}s",
            self.label,
            key,
            self.ttl.as_secs()
        );
        self.lock().insert(key, CacheEntry { value, inserted_at });
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        let entry = entries.get(key)?;
        let age = age_at(now, entry.inserted_at);
        if age > self.ttl {
            entries.remove(key);
            tracing::info!("{} cache: expired {} after {}s", self.label, key, age.as_secs());
            return None;
        }

        tracing::debug!(
            "{} cache: serving {} ({}s remaining)",
            self.label,
            key,
            self.ttl.saturating_sub(age).as_secs()
        );
        Some(entry.value.clone())
    }

    pub fn clear(&self) {
        self.lock().clear();
        tracing::info!("{} cache cleared", self.label);
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = age_at(now, entry.inserted_at) <= self.ttl;
            if !keep {
                tracing::debug!("{} cache sweep: removed {}", self.label, key);
            }
            keep
        });
        let removed = before - entries.len();

        if removed > 0 {
            tracing::info!("{} cache sweep: removed {} expired entries", self.label, removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.lock();
        let valid_entries = entries
            .values()
            .filter(|entry| age_at(now, entry.inserted_at) <= self.ttl)
            .count();

        CacheStats {
            total_entries: entries.len(),
            valid_entries,
            expired_entries: entries.len() - valid_entries,
            ttl: self.ttl,
        }
    }

    /// Per-entry ages at the current instant, sorted by key. Never evicts.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let now = self.clock.now();
        let mut infos: Vec<EntryInfo> = self
            .lock()
            .iter()
            .map(|(key, entry)| {
                let age = age_at(now, entry.inserted_at);
                EntryInfo {
                    key: key.clone(),
                    inserted_at: entry.inserted_at,
                    age,
                    remaining: self.ttl.saturating_sub(age),
                    expired: age > self.ttl,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // Every operation leaves the map consistent before it can panic, so a
    // poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn age_at(now: DateTime<Utc>, inserted_at: DateTime<Utc>) -> Duration {
    (now - inserted_at).to_std().unwrap_or(Duration::ZERO)
}
