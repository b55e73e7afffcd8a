//! Logging Module
//!
//! Bridges the cache and dispatcher event buses onto `tracing`, so every
//! lifecycle event shows up as a structured log record.

use tracing::{debug, info, warn};

use crate::cache::{CacheEvent, TtlCache};
use crate::dispatch::{DispatchEvent, RequestDispatcher};
use crate::events::SubscriptionId;

/// Subscribes a logger to every cache event.
pub fn attach_cache_logging<V>(cache: &TtlCache<V>) -> SubscriptionId {
    cache.subscribe(log_cache_event)
}

/// Subscribes a logger to every dispatcher event.
pub fn attach_dispatch_logging(dispatcher: &RequestDispatcher) -> SubscriptionId {
    dispatcher.subscribe(log_dispatch_event)
}

fn log_cache_event(event: &CacheEvent) {
    let name = event.name();
    match event {
        CacheEvent::Hit { key } | CacheEvent::Miss { key } => {
            debug!(event = name, key = %key, "Cache lookup")
        }
        CacheEvent::Set { key } => debug!(event = name, key = %key, "Cache entry stored"),
        CacheEvent::Delete { key } => debug!(event = name, key = %key, "Cache entry removed"),
        CacheEvent::Cleanup { deleted_count } => {
            info!(event = name, deleted_count, "Cache cleanup completed")
        }
    }
}

fn log_dispatch_event(event: &DispatchEvent) {
    let name = event.name();
    match event {
        DispatchEvent::RouteRegistered { method, path } => {
            info!(event = name, %method, %path, "Route registered")
        }
        DispatchEvent::RequestReceived { method, path } => {
            debug!(event = name, %method, %path, "Request received")
        }
        DispatchEvent::DataServedFromCache { query } => {
            info!(event = name, query = %query, "Data served from cache")
        }
        DispatchEvent::DataServed { query } => info!(event = name, query = %query, "Data served"),
        DispatchEvent::DataProcessed { data } => {
            info!(event = name, data = %data, "Data processed")
        }
        DispatchEvent::DataProcessingError { error } => {
            warn!(event = name, %error, "Data processing failed")
        }
        DispatchEvent::NotFound { method, path } => {
            warn!(event = name, %method, %path, "Route not found")
        }
    }
}
