//! Time-bounded memoization of scraped rosters.
//!
//! The cache sits between the service and the scraper so a browser
//! hammering "Mein Tag" does not hammer the legacy portal. It is backed by
//! an injected [`KeyValueStore`] and assumes nothing about the medium.
//! Store failures never fail a read; the pipeline proceeds as if the
//! cache were empty.

mod store;

pub use store::{FileStore, MemoryStore};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::PerdisError;
use crate::model::{DayRoster, Trip};

/// Minimal persistent key-value capability the cache is built on.
/// Implementations may be synchronous under the hood; the contract is
/// awaitable either way.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
}

/// Key scheme carried over from the browser client's storage layout.
const KEY_PREFIX: &str = "roster_";

fn cache_key(date: NaiveDate) -> String {
    format!("{}{}", KEY_PREFIX, date)
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    data: Vec<Trip>,
    fetched_at: DateTime<Utc>,
}

/// TTL cache of day rosters over an injected store.
#[derive(Clone)]
pub struct RosterCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl RosterCache {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: std::time::Duration) -> Self {
        Self {
            store,
            // the configured TTL is seconds-granular and far below the
            // chrono::Duration ceiling, so this cannot actually fail
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(3600)),
        }
    }

    /// Cached trips for a date, or `None` for never-fetched, expired, or
    /// unreadable entries. Expired entries are erased on the way out so
    /// dead keys do not accumulate.
    pub async fn get(&self, date: NaiveDate) -> Option<DayRoster> {
        let key = cache_key(date);
        let raw = match self.store.get(&key).await {
            Ok(value) => value?,
            Err(err) => {
                let err = PerdisError::CacheUnavailable(err.to_string());
                warn!(%key, error = %err, "cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%key, error = %err, "unreadable cache entry, discarding");
                self.erase(&key).await;
                return None;
            }
        };

        if Utc::now().signed_duration_since(entry.fetched_at) > self.ttl {
            debug!(%key, "cache entry expired");
            self.erase(&key).await;
            return None;
        }

        Some(entry.data)
    }

    /// Store trips for a date, stamped now. Write failures are logged and
    /// swallowed; the next read is simply a miss.
    pub async fn put(&self, date: NaiveDate, data: &[Trip]) {
        let entry = CacheEntry {
            data: data.to_vec(),
            fetched_at: Utc::now(),
        };
        let key = cache_key(date);
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "cache entry failed to serialize");
                return;
            }
        };
        if let Err(err) = self.store.set(&key, &raw).await {
            let err = PerdisError::CacheUnavailable(err.to_string());
            warn!(%key, error = %err, "cache write failed");
        }
    }

    pub async fn invalidate(&self, date: NaiveDate) {
        self.erase(&cache_key(date)).await;
    }

    /// Drop every roster entry, leaving foreign keys in a shared store
    /// untouched.
    pub async fn clear(&self) {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "cache clear failed to enumerate keys");
                return;
            }
        };
        for key in keys.iter().filter(|k| k.starts_with(KEY_PREFIX)) {
            self.erase(key).await;
        }
    }

    async fn erase(&self, key: &str) {
        if let Err(err) = self.store.remove(key).await {
            warn!(%key, error = %err, "failed to erase cache entry");
        }
    }
}
