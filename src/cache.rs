use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::location::Location;
use crate::sources::Payload;

pub const DEFAULT_TTL_HOURS: i64 = 24;
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// A cached provider response for one (source, grid cell) pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub source: String,
    pub grid_hash: String,
    pub payload: Payload,
    pub written_at: DateTime<Utc>,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub hit_rate_percent: f64,
}

#[derive(Debug)]
struct CacheData {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Bounded in-memory TTL cache of provider responses.
///
/// Keys are `"{source}:{grid_hash}"`. Reads of expired entries delete them and
/// count as misses. When the store is full, `set` evicts the entry with the
/// oldest write time before inserting, even when the incoming key already
/// exists.
#[derive(Debug)]
pub struct CacheManager {
    inner: Mutex<CacheData>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_HOURS, DEFAULT_MAX_ENTRIES)
    }
}

impl CacheManager {
    pub fn new(ttl_hours: i64, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheData {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            ttl: Duration::hours(ttl_hours),
            max_entries,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn make_key(source: &str, grid_hash: &str) -> String {
        format!("{}:{}", source, grid_hash)
    }

    // The map is consistent after every statement, so a panic elsewhere
    // never leaves it half-written.
    fn lock(&self) -> MutexGuard<'_, CacheData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, source: &str, location: &Location) -> Option<Payload> {
        self.get_at(source, location, Utc::now())
    }

    /// Look up a payload as of `now`.
    pub fn get_at(&self, source: &str, location: &Location, now: DateTime<Utc>) -> Option<Payload> {
        let key = Self::make_key(source, location.grid_hash());
        let mut data = self.lock();

        let is_fresh = data
            .entries
            .get(&key)
            .map(|entry| now - entry.written_at < self.ttl);

        let fresh = match is_fresh {
            Some(true) => data.entries.get(&key).map(|entry| entry.payload.clone()),
            Some(false) => {
                data.entries.remove(&key);
                debug!(key = %key, "cache entry expired");
                None
            }
            None => None,
        };

        match fresh {
            Some(payload) => {
                data.hits += 1;
                debug!(key = %key, "cache hit");
                Some(payload)
            }
            None => {
                data.misses += 1;
                debug!(key = %key, "cache miss");
                None
            }
        }
    }

    pub fn set(&self, source: &str, location: &Location, payload: Payload) {
        self.set_at(source, location, payload, Utc::now())
    }

    /// Store a payload stamped with `now`.
    pub fn set_at(&self, source: &str, location: &Location, payload: Payload, now: DateTime<Utc>) {
        let key = Self::make_key(source, location.grid_hash());
        let mut data = self.lock();

        if data.entries.len() >= self.max_entries {
            let oldest = data
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.written_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                data.entries.remove(&oldest);
                data.evictions += 1;
                debug!(evicted = %oldest, "cache at capacity, evicted oldest entry");
            }
        }

        data.entries.insert(
            key,
            CacheEntry {
                source: source.to_string(),
                grid_hash: location.grid_hash().to_string(),
                payload,
                written_at: now,
            },
        );
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let data = self.lock();
        let total = data.hits + data.misses;
        let hit_rate = if total > 0 {
            data.hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits: data.hits,
            misses: data.misses,
            evictions: data.evictions,
            entries: data.entries.len(),
            hit_rate_percent: (hit_rate * 10.0).round() / 10.0,
        }
    }

    /// Clone of the entry stored for a key, without touching counters or expiry.
    pub fn peek(&self, source: &str, location: &Location) -> Option<CacheEntry> {
        let key = Self::make_key(source, location.grid_hash());
        self.lock().entries.get(&key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: i64) -> Payload {
        let mut map = Payload::new();
        map.insert("value".to_string(), json!(value));
        map
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = CacheManager::new(24, 10);
        let loc = Location::new(40.666, -111.897);
        cache.set_at("soil", &loc, payload(1), t0());

        let got = cache.get_at("soil", &loc, t0() + Duration::hours(23) + Duration::minutes(59));
        assert_eq!(got, Some(payload(1)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_expired_at_exact_ttl_is_miss_and_removed() {
        let cache = CacheManager::new(24, 10);
        let loc = Location::new(40.666, -111.897);
        cache.set_at("soil", &loc, payload(1), t0());

        assert!(cache.get_at("soil", &loc, t0() + Duration::hours(24)).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_absent_is_miss() {
        let cache = CacheManager::default();
        let loc = Location::new(1.0, 2.0);
        assert!(cache.get("soil", &loc).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_key_includes_source() {
        let cache = CacheManager::new(24, 10);
        let loc = Location::new(40.666, -111.897);
        cache.set_at("soil", &loc, payload(1), t0());
        assert!(cache.get_at("climate", &loc, t0()).is_none());
    }

    #[test]
    fn test_same_cell_shares_entry() {
        let cache = CacheManager::new(24, 10);
        cache.set_at("soil", &Location::new(40.66601, -111.89702), payload(7), t0());
        let neighbor = Location::new(40.66649, -111.89749);
        assert_eq!(cache.get_at("soil", &neighbor, t0()), Some(payload(7)));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = CacheManager::new(24, 3);
        let locs: Vec<Location> = (0..4).map(|i| Location::new(i as f64, 0.0)).collect();

        // Insert out of timestamp order so the oldest isn't the first key.
        cache.set_at("s", &locs[0], payload(0), t0() + Duration::minutes(5));
        cache.set_at("s", &locs[1], payload(1), t0());
        cache.set_at("s", &locs[2], payload(2), t0() + Duration::minutes(10));
        assert_eq!(cache.stats().evictions, 0);

        cache.set_at("s", &locs[3], payload(3), t0() + Duration::minutes(15));

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 3);
        assert!(cache.peek("s", &locs[1]).is_none());
        assert!(cache.peek("s", &locs[0]).is_some());
        assert!(cache.peek("s", &locs[3]).is_some());
    }

    #[test]
    fn test_overwrite_at_capacity_still_evicts() {
        let cache = CacheManager::new(24, 2);
        let a = Location::new(1.0, 1.0);
        let b = Location::new(2.0, 2.0);
        cache.set_at("s", &a, payload(1), t0());
        cache.set_at("s", &b, payload(2), t0() + Duration::minutes(1));

        // Refreshing `b` at capacity evicts `a` even though no net growth occurs.
        cache.set_at("s", &b, payload(3), t0() + Duration::minutes(2));

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 1);
        assert!(cache.peek("s", &a).is_none());
        let refreshed = cache.peek("s", &b).unwrap();
        assert_eq!(refreshed.payload, payload(3));
        assert_eq!(refreshed.written_at, t0() + Duration::minutes(2));
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = CacheManager::new(24, 10);
        let loc = Location::new(40.666, -111.897);
        cache.set_at("soil", &loc, payload(1), t0());
        cache.get_at("soil", &loc, t0());
        cache.get_at("other", &loc, t0());

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_hit_rate() {
        let cache = CacheManager::new(24, 10);
        assert_eq!(cache.stats().hit_rate_percent, 0.0);

        let loc = Location::new(40.666, -111.897);
        cache.set_at("soil", &loc, payload(1), t0());
        cache.get_at("soil", &loc, t0());
        cache.get_at("soil", &loc, t0());
        cache.get_at("missing", &loc, t0());

        // 2 / 3 = 66.666..
        assert_eq!(cache.stats().hit_rate_percent, 66.7);
    }
}
