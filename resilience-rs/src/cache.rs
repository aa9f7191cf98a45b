//! TTL cache with hit/miss accounting and periodic sweeping
//!
//! Entries carry an absolute expiry deadline. A read that finds an expired
//! entry treats it as absent and removes it; the background sweeper bounds
//! memory for keys that are never read again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::CacheError;

/// A cache entry with an absolute expiry deadline
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Snapshot of cache accounting counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Key/value store with per-entry time-to-live
///
/// `get`/`insert`/`sweep` are safe to call from any number of concurrent
/// callers; entries are replaced wholesale, never mutated in place.
#[derive(Debug)]
pub struct TtlCache<V> {
    /// Name for metrics
    name: String,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Creates a new, empty cache
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a key, counting the outcome.
    ///
    /// An entry whose deadline has passed is removed and reported as a miss;
    /// a read never returns an expired value.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    counter!(format!("cache.{}.hits", self.name), 1);
                    return Some(entry.value.clone());
                }
                Some(_) => {} // expired, removed below under the write lock
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    counter!(format!("cache.{}.misses", self.name), 1);
                    return None;
                }
            }
        }

        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get(key) {
            // A concurrent insert may have refreshed the entry between locks.
            if !entry.is_expired(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                counter!(format!("cache.{}.hits", self.name), 1);
                return Some(entry.value.clone());
            }
            entries.remove(key);
            gauge!(format!("cache.{}.size", self.name), entries.len() as f64);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!(format!("cache.{}.misses", self.name), 1);
        None
    }

    /// Stores a value, overwriting any existing entry for the key.
    ///
    /// A zero TTL is rejected: every entry must be readable for some
    /// positive window.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::InvalidTtl(ttl));
        }

        let mut entries = self.entries.write().unwrap();
        entries.insert(key.into(), CacheEntry::new(value, ttl));
        gauge!(format!("cache.{}.size", self.name), entries.len() as f64);
        Ok(())
    }

    /// Removes every entry whose deadline has passed, returning the count.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();

        gauge!(format!("cache.{}.size", self.name), entries.len() as f64);
        if removed > 0 {
            counter!(format!("cache.{}.swept", self.name), removed as u64);
        }
        removed
    }

    /// Current number of entries, including any not yet swept
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit/miss counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Operator action: zero both counters
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Background sweep task owned by the process lifecycle
///
/// Started at init, stopped at shutdown; runs `sweep` on a fixed period so
/// memory stays bounded even for keys that are never re-read.
#[derive(Debug)]
pub struct CacheSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Spawns the sweep loop for the given cache
    pub fn spawn<V>(cache: Arc<TtlCache<V>>, period: Duration) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            debug!(cache = %cache.name, removed, "sweep removed expired entries");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stops the sweep loop and waits for it to finish
    pub async fn shutdown(self) {
        if self.shutdown.send(true).is_err() {
            warn!("cache sweeper already stopped");
        }
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_then_get_within_ttl() {
        let cache: TtlCache<i32> = TtlCache::new("test");
        cache.insert("k", 42, Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k"), Some(42));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let cache: TtlCache<i32> = TtlCache::new("test");
        cache.insert("k", 42, Duration::from_millis(30)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get("k"), None);
        // Lazy removal happened on the read
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let cache: TtlCache<i32> = TtlCache::new("test");
        let err = cache.insert("k", 1, Duration::ZERO).unwrap_err();
        assert_eq!(err, CacheError::InvalidTtl(Duration::ZERO));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_overwrites_existing_entry() {
        let cache: TtlCache<i32> = TtlCache::new("test");
        cache.insert("k", 1, Duration::from_secs(60)).unwrap();
        cache.insert("k", 2, Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hit_miss_accounting_exact() {
        let cache: TtlCache<i32> = TtlCache::new("test");

        // n misses on an absent key
        for _ in 0..3 {
            assert_eq!(cache.get("k"), None);
        }
        cache.insert("k", 7, Duration::from_secs(60)).unwrap();
        // m hits
        for _ in 0..5 {
            assert_eq!(cache.get("k"), Some(7));
        }

        let stats = cache.stats();
        assert_eq!(stats.misses, 3);
        assert_eq!(stats.hits, 5);

        cache.reset_stats();
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 0 });
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let cache: TtlCache<i32> = TtlCache::new("test");
        cache.insert("a", 1, Duration::from_millis(20)).unwrap();
        cache.insert("b", 2, Duration::from_millis(20)).unwrap();
        cache.insert("c", 3, Duration::from_secs(60)).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.len(), 1);
        // Sweeping does not touch the counters
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 0 });
    }

    #[tokio::test]
    async fn test_sweeper_task_removes_expired_entries() {
        let cache: Arc<TtlCache<i32>> = Arc::new(TtlCache::new("test"));
        cache.insert("a", 1, Duration::from_millis(20)).unwrap();

        let sweeper = CacheSweeper::spawn(cache.clone(), Duration::from_millis(40));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(cache.len(), 0);
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_readers_and_writers() {
        let cache: Arc<TtlCache<u64>> = Arc::new(TtlCache::new("test"));
        let mut handles = Vec::new();

        for worker in 0..8u64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50u64 {
                    let key = format!("k{}", i % 10);
                    cache.insert(key.as_str(), worker * 100 + i, Duration::from_secs(5)).unwrap();
                    let _ = cache.get(&key);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cache.stats();
        // Every get followed its own insert, so all 400 reads resolved
        assert_eq!(stats.hits + stats.misses, 400);
        assert_eq!(stats.hits, 400);
    }
}
