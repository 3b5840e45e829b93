//! TTL cache for the month/author/category aggregate.
//!
//! The aggregate scans every current post version, which is the one query
//! that grows with blog size, so results are kept until a post write
//! invalidates them or the TTL lapses. Entries are only ever stored for
//! unrestricted (no viewer) aggregations; restricted results depend on the
//! caller's permissions and must not leak between callers.

mod lock;

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Deserialize;
use time::OffsetDateTime;

use self::lock::{rw_read, rw_write};
use crate::domain::posts::BlogStats;

/// Cache sizing knobs. The default TTL is deliberately just under a day so
/// entries roll over even on blogs that never see a write.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl_secs: 23 * 3600,
        }
    }
}

struct CachedEntry {
    stats: BlogStats,
    inserted_at: Instant,
}

pub struct StatsCache {
    entries: RwLock<LruCache<String, CachedEntry>>,
    ttl: Duration,
}

impl StatsCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }

    /// Cached aggregate for `key`, dropping the entry when its TTL lapsed.
    pub fn get(&self, key: &str) -> Option<BlogStats> {
        let mut entries = rw_write(&self.entries, "stats-cache");
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.stats.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn insert(&self, key: String, stats: BlogStats) {
        let entry = CachedEntry {
            stats,
            inserted_at: Instant::now(),
        };
        rw_write(&self.entries, "stats-cache").put(key, entry);
    }

    /// Drops every entry. Post writes and deletes call this rather than
    /// chasing down which time windows a change affects.
    pub fn invalidate_all(&self) {
        rw_write(&self.entries, "stats-cache").clear();
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, "stats-cache").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for an unrestricted aggregate over the given time window.
pub fn stats_key(from: Option<OffsetDateTime>, to: Option<OffsetDateTime>) -> String {
    let bound = |value: Option<OffsetDateTime>| match value {
        Some(value) => value.unix_timestamp().to_string(),
        None => "-".to_string(),
    };
    format!("stats:{}:{}", bound(from), bound(to))
}
