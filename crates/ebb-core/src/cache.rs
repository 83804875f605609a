//! TTL key/value store.
//!
//! `TtlCache` is the vertex store behind the graph cache, but it is a
//! perfectly usable cache on its own. Every entry carries its own absolute
//! expiration. Expired entries are invisible to readers immediately and are
//! physically removed either lazily (a read that trips over one schedules a
//! detached removal) or by the periodic sweep in [`TtlCache::watch`].

use crate::shutdown::Shutdown;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound used when `now + ttl` would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Returns the absolute expiration for an entry written now with `ttl`.
///
/// Saturates instead of panicking when `ttl` is absurdly large.
pub fn expiration_after(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl).unwrap_or(now + FAR_FUTURE)
}

/// A value together with the instant it stops being visible.
#[derive(Debug, Clone)]
struct Volatile<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Volatile<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// A concurrent key/value cache with per-entry expiration.
///
/// Cloning a `TtlCache` is cheap and yields another handle to the same
/// entries.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    default_ttl: Duration,
    entries: Arc<RwLock<HashMap<K, Volatile<V>>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            default_ttl: self.default_ttl,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache whose plain `put` uses `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The TTL applied by [`TtlCache::put`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Inserts or refreshes `key` with the default TTL.
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Inserts or refreshes `key`, expiring `ttl` from now.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.put_with_expiration(key, value, expiration_after(ttl));
    }

    /// Inserts or refreshes `key` with an absolute expiration.
    pub fn put_with_expiration(&self, key: K, value: V, expires_at: Instant) {
        self.entries
            .write()
            .insert(key, Volatile { value, expires_at });
    }

    /// Inserts `key` only if it is absent or already expired.
    ///
    /// The check and the insert happen under one write lock. Returns `true`
    /// when the value was written.
    pub fn put_if_absent_with_expiration(&self, key: K, value: V, expires_at: Instant) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(existing) if !existing.is_expired_at(now) => false,
            _ => {
                entries.insert(key, Volatile { value, expires_at });
                true
            }
        }
    }

    /// Returns the live value for `key`.
    ///
    /// An expired entry reads as absent and its removal is handed to a
    /// detached task so this read never waits for the write lock.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.read().get(key) {
            None => return None,
            Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
            Some(_) => {}
        }
        self.schedule_removal(key.clone());
        None
    }

    /// Returns true if `key` holds a live value.
    pub fn has(&self, key: &K) -> bool {
        let now = Instant::now();
        let expired = match self.entries.read().get(key) {
            None => return false,
            Some(entry) => entry.is_expired_at(now),
        };
        if expired {
            self.schedule_removal(key.clone());
        }
        !expired
    }

    /// Removes `key` regardless of its expiration. Returns true if it existed.
    pub fn delete(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn flush_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the keys that are currently live.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Sweeps expired entries every `interval` until `shutdown` fires.
    ///
    /// A sweep that has started always runs to completion.
    pub async fn watch(&self, interval: Duration, mut shutdown: Shutdown) {
        if interval.is_zero() {
            warn!("Refusing to watch cache with a zero interval");
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        info!("Cache sweeper started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.flush_expired();
                    debug!("Cache sweep removed {} expired entries", removed);
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Cache sweeper stopped");
    }

    /// Removes `key` on the rayon pool if it is still expired by then.
    fn schedule_removal(&self, key: K) {
        let entries = Arc::clone(&self.entries);
        rayon::spawn(move || {
            let now = Instant::now();
            let mut entries = entries.write();
            if entries
                .get(&key)
                .map_or(false, |entry| entry.is_expired_at(now))
            {
                entries.remove(&key);
            }
        });
    }
}
