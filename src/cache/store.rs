//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with TTL expiration and
//! lifecycle event notification.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheEntry, CacheEvent, CacheStats, Clock, SystemClock};
use crate::events::{EventBus, SubscriptionId};

/// State guarded by the cache lock.
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    stats: CacheStats,
}

/// Outcome of an expiry check performed under the lock.
enum Probe<V> {
    Live(V),
    Expired,
    Absent,
}

// == TTL Cache ==
/// Key/value store with per-entry expiration and event notification.
///
/// A single mutex guards the whole map; every operation, the periodic sweep
/// included, takes it only for the duration of the map access. Events are
/// emitted after the lock is released, so listeners may call back into the
/// cache.
///
/// Expired entries are reclaimed two ways: lazily when `get`/`has` touches
/// them, and in bulk by [`cleanup`](Self::cleanup), which the background task
/// from [`spawn_cleanup_task`](crate::tasks::spawn_cleanup_task) calls on an
/// interval.
pub struct TtlCache<V = Value> {
    inner: Mutex<Inner<V>>,
    events: EventBus<CacheEvent>,
    clock: Arc<dyn Clock>,
    default_ttl_ms: i64,
}

impl<V: Clone> TtlCache<V> {
    // == Constructor ==
    /// Creates a cache backed by the system clock.
    ///
    /// # Arguments
    /// * `default_ttl_ms` - TTL applied by [`set`](Self::set); zero or negative never expires
    pub fn new(default_ttl_ms: i64) -> Self {
        Self::with_clock(default_ttl_ms, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(default_ttl_ms: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::new(),
            }),
            events: EventBus::new(),
            clock,
            default_ttl_ms,
        }
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Emits `cache-hit` when a value is returned, `cache-miss` otherwise. An
    /// expired entry is deleted on the way (emitting `cache-delete` first).
    pub fn get(&self, key: &str) -> Option<V> {
        let value = match self.probe(key, true) {
            Probe::Live(value) => Some(value),
            Probe::Expired | Probe::Absent => None,
        };

        let key = key.to_string();
        if value.is_some() {
            self.events.emit(&CacheEvent::Hit { key });
        } else {
            self.events.emit(&CacheEvent::Miss { key });
        }
        value
    }

    // == Has ==
    /// Returns true if `key` holds a live entry.
    ///
    /// Does not emit hit/miss events; an expired entry found here is deleted.
    pub fn has(&self, key: &str) -> bool {
        matches!(self.probe(key, false), Probe::Live(_))
    }

    // == Set ==
    /// Stores `value` under `key` with the default TTL, replacing any
    /// previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) -> bool {
        self.set_with_ttl(key, value, self.default_ttl_ms)
    }

    /// Stores `value` under `key` with an explicit TTL in milliseconds.
    ///
    /// A TTL of zero or less stores an entry that never expires. Always
    /// succeeds and emits `cache-set`.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl_ms: i64) -> bool {
        let key = key.into();
        let entry = CacheEntry::new(value, ttl_ms, self.clock.now_ms());

        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.entries.insert(key.clone(), entry);
            inner.stats.record_set();
            inner.stats.set_total_entries(inner.entries.len());
        }

        self.events.emit(&CacheEvent::Set { key });
        true
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Returns true and emits `cache-delete` if the key existed; returns
    /// false without an event otherwise.
    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let removed = inner.entries.remove(key).is_some();
            if removed {
                inner.stats.record_delete();
                inner.stats.set_total_entries(inner.entries.len());
            }
            removed
        };

        if removed {
            self.events.emit(&CacheEvent::Delete {
                key: key.to_string(),
            });
        }
        removed
    }

    // == Cleanup ==
    /// Removes every expired entry and returns how many were removed.
    ///
    /// Emits `cache-cleanup` only when at least one entry was removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now_ms();

        let deleted_count = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| !entry.is_expired_at(now));
            let deleted_count = before - inner.entries.len();
            inner.stats.record_expired(deleted_count);
            inner.stats.set_total_entries(inner.entries.len());
            deleted_count
        };

        if deleted_count > 0 {
            self.events.emit(&CacheEvent::Cleanup { deleted_count });
        }
        deleted_count
    }
}

impl<V> TtlCache<V> {
    // == Events ==
    /// Registers an observer for cache events.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Removes an observer registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let guard = self.lock();
        let mut stats = guard.stats.clone();
        stats.set_total_entries(guard.entries.len());
        stats
    }

    /// Returns the number of stored entries, expired ones not yet reclaimed
    /// included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// TTL applied by [`set`](TtlCache::set) when none is given.
    pub fn default_ttl_ms(&self) -> i64 {
        self.default_ttl_ms
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> TtlCache<V> {
    /// Looks `key` up, removing it if expired.
    ///
    /// Detection and removal happen under one lock acquisition, so a `set`
    /// racing with the lookup is never undone. `record_lookup` counts the
    /// outcome as a hit or miss.
    fn probe(&self, key: &str, record_lookup: bool) -> Probe<V> {
        let now = self.clock.now_ms();

        let probe = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let probe = match inner.entries.get(key) {
                None => Probe::Absent,
                Some(entry) if entry.is_expired_at(now) => Probe::Expired,
                Some(entry) => Probe::Live(entry.value.clone()),
            };
            if let Probe::Expired = probe {
                inner.entries.remove(key);
                inner.stats.record_delete();
                inner.stats.set_total_entries(inner.entries.len());
            }
            if record_lookup {
                match probe {
                    Probe::Live(_) => inner.stats.record_hit(),
                    Probe::Expired | Probe::Absent => inner.stats.record_miss(),
                }
            }
            probe
        };

        if let Probe::Expired = probe {
            debug!(key, "Lazily expired cache entry");
            self.events.emit(&CacheEvent::Delete {
                key: key.to_string(),
            });
        }
        probe
    }
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.len())
            .field("default_ttl_ms", &self.default_ttl_ms)
            .field("clock", &self.clock)
            .field("events", &self.events)
            .finish()
    }
}
