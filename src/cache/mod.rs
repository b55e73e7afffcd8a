//! Cache Module
//!
//! Provides an in-memory key/value cache with TTL expiration, periodic
//! sweeping and lifecycle events.

mod clock;
mod entry;
mod events;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use events::CacheEvent;
pub use stats::CacheStats;
pub use store::TtlCache;

// == Public Constants ==
/// TTL applied when callers omit one (60 seconds)
pub const DEFAULT_TTL_MS: i64 = 60 * 1000;

/// Interval between background sweeps (5 minutes)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
