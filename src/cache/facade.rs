use super::clock::{Clock, SystemClock};
use super::key::{build_key, Params};
use super::store::{CacheStats, TimeBoundedCache};
use super::sweeper::{spawn_sweeper, SweeperHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySnapshot {
    pub key: String,
    pub inserted_at: DateTime<Utc>,
    pub age_seconds: u64,
    pub remaining_seconds: u64,
    pub expired: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub label: String,
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub ttl_seconds: u64,
    pub cache_duration_minutes: f64,
    pub entries: Vec<EntrySnapshot>,
    pub checked_at: DateTime<Utc>,
}

/// The surface request handlers use: keyed reads and writes over a shared
/// [`TimeBoundedCache`].
///
/// Clones share one store; separately constructed caches never do.
pub struct ResponseCache<V> {
    store: Arc<TimeBoundedCache<V>>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<V: Clone + Send + 'static> ResponseCache<V> {
    pub fn new(label: impl Into<String>, ttl: Duration) -> Self {
        Self::with_clock(label, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(label: impl Into<String>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(TimeBoundedCache::with_clock(label, ttl, clock)),
        }
    }

    pub fn read(&self, endpoint: &str, params: &Params) -> Option<V> {
        self.store.get(&build_key(endpoint, params))
    }

    pub fn write(&self, endpoint: &str, params: &Params, value: V) {
        self.store.set(build_key(endpoint, params), value);
    }

    pub fn invalidate_all(&self) {
        self.store.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let stats = self.store.stats();
        let entries = self
            .store
            .entries()
            .into_iter()
            .map(|info| EntrySnapshot {
                key: info.key,
                inserted_at: info.inserted_at,
                age_seconds: info.age.as_secs(),
                remaining_seconds: info.remaining.as_secs(),
                expired: info.expired,
            })
            .collect();

        CacheSnapshot {
            label: self.store.label().to_string(),
            total_entries: stats.total_entries,
            valid_entries: stats.valid_entries,
            expired_entries: stats.expired_entries,
            ttl_seconds: stats.ttl.as_secs(),
            cache_duration_minutes: stats.ttl.as_secs_f64() / 60.0,
            entries,
            checked_at: self.store.now(),
        }
    }

    pub fn start_sweeper(&self, period: Duration) -> SweeperHandle {
        spawn_sweeper(Arc::clone(&self.store), period)
    }
}
