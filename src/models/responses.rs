//! Response DTOs for the reference API
//!
//! Defines the structure of outgoing reply bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::dispatch::QueryParams;

/// A single item of the `GET /api/data` result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataItem {
    pub id: u32,
    pub name: String,
}

/// Response body for `GET /api/data`
///
/// This is the unit of work stored in the read-through cache.
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse {
    /// When the result was computed, RFC 3339
    pub timestamp: String,
    /// The query parameters, echoed back
    pub query: QueryParams,
    /// Fixed result list
    pub results: Vec<DataItem>,
}

impl DataResponse {
    /// Builds the result for `query`, stamped with the current time.
    pub fn compute(query: QueryParams) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            query,
            results: (1..=3)
                .map(|id| DataItem {
                    id,
                    name: format!("Item {}", id),
                })
                .collect(),
        }
    }
}

/// Response body for the stats endpoint (`GET /api/stats`)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of writes
    pub sets: u64,
    /// Number of deletions
    pub deletes: u64,
    /// Number of entries reclaimed by sweeps
    pub expired: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            sets: stats.sets,
            deletes: stats.deletes,
            expired: stats.expired,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (`GET /health`)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
