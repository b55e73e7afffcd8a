//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TtlCache;

/// Handle to a running cleanup task.
///
/// The task is cancelled when the handle is dropped or [`abort`](Self::abort)
/// is called, and exits on its own once the cache it sweeps is dropped.
#[derive(Debug)]
pub struct CleanupTask {
    handle: JoinHandle<()>,
}

impl CleanupTask {
    /// Cancels the task.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns a background task that periodically cleans up expired cache entries.
///
/// The task sleeps for `interval` between sweeps. It only holds a weak
/// reference to the cache, so it never keeps the cache alive; each sweep
/// takes the cache lock for the duration of [`TtlCache::cleanup`].
///
/// # Example
/// ```ignore
/// let cache = Arc::new(TtlCache::new(60_000));
/// let cleanup = spawn_cleanup_task(&cache, Duration::from_secs(300));
/// // Later, during shutdown:
/// cleanup.abort();
/// ```
pub fn spawn_cleanup_task<V>(cache: &Arc<TtlCache<V>>, interval: Duration) -> CleanupTask
where
    V: Clone + Send + 'static,
{
    let cache: Weak<TtlCache<V>> = Arc::downgrade(cache);

    let handle = tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {}ms",
            interval.as_millis()
        );

        loop {
            // Sleep for the configured interval
            tokio::time::sleep(interval).await;

            let Some(cache) = cache.upgrade() else {
                debug!("Cache dropped, stopping TTL cleanup task");
                break;
            };
            let removed = cache.cleanup();
            drop(cache);

            // Log cleanup statistics
            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    });

    CleanupTask { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEvent, ManualClock};
    use std::sync::Mutex;

    fn manual_cache() -> (Arc<TtlCache<String>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(TtlCache::with_clock(60_000, clock.clone()));
        (cache, clock)
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let (cache, clock) = manual_cache();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        cache.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        cache.set_with_ttl("expire_soon", "value".to_string(), 10);
        clock.advance(11);

        let task = spawn_cleanup_task(&cache, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;

        // len() does not expire lazily, so only the sweep can have removed it
        assert_eq!(cache.len(), 0, "Expired entry should have been cleaned up");
        assert!(events
            .lock()
            .unwrap()
            .contains(&CacheEvent::Cleanup { deleted_count: 1 }));

        task.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let (cache, _clock) = manual_cache();
        cache.set_with_ttl("long_lived", "value".to_string(), 3_600_000);

        let task = spawn_cleanup_task(&cache, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("long_lived").as_deref(), Some("value"));
        task.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let (cache, _clock) = manual_cache();

        let task = spawn_cleanup_task(&cache, Duration::from_secs(1));
        task.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(task.is_finished(), "Task should be finished after abort");
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_when_cache_dropped() {
        let (cache, _clock) = manual_cache();

        let task = spawn_cleanup_task(&cache, Duration::from_millis(10));
        drop(cache);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(task.is_finished(), "Task should exit once the cache is gone");
    }
}
