//! Route Table
//!
//! Registry of (method, normalized path) → handler.
//!
//! # Design Decisions
//! - Exact, case-sensitive matching on the normalized path; no patterns
//! - At most one route per (method, path); re-registration replaces silently
//! - Lookups clone the route out so no lock is held while a handler runs

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use crate::dispatch::{Reply, Request};
use crate::error::Result;
use crate::routing::{normalize_path, Method};

/// Boxed, sendable future returned by handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Type-erased route handler.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<Result<Reply>> + Send + Sync>;

/// Wraps an async function or closure into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    Arc::new(move |request| -> BoxFuture<Result<Reply>> { Box::pin(f(request)) })
}

// == Cache Policy ==
/// Whether the dispatcher may serve a route from the read-through cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always run the handler.
    Bypass,
    /// Look the request fingerprint up first; store fresh results.
    ReadThrough {
        /// Fingerprint prefix, e.g. `data` for `data_{"q":"x"}`
        key_prefix: String,
        /// TTL for stored results; `None` uses the cache default
        ttl_ms: Option<i64>,
    },
}

// == Route ==
/// A registered handler together with its cache policy.
#[derive(Clone)]
pub struct Route {
    pub handler: Handler,
    pub cache: CachePolicy,
}

impl Route {
    /// A route that is never cached.
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            cache: CachePolicy::Bypass,
        }
    }

    /// A route served through the read-through cache.
    pub fn cached(handler: Handler, key_prefix: impl Into<String>, ttl_ms: Option<i64>) -> Self {
        Self {
            handler,
            cache: CachePolicy::ReadThrough {
                key_prefix: key_prefix.into(),
                ttl_ms,
            },
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

// == Route Table ==
/// Concurrent map of (method, path) to [`Route`].
#[derive(Default)]
pub struct RouteTable {
    routes: RwLock<HashMap<(Method, String), Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Installs `route` for (method, path), returning the route it replaced.
    ///
    /// Routes are added through the dispatcher, which publishes
    /// `route-registered` for each one.
    pub(crate) fn register(&self, method: Method, path: &str, route: Route) -> Option<Route> {
        let key = (method, normalize_path(path).to_string());
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, route)
    }

    // == Lookup ==
    /// Returns the route registered for exactly (method, path).
    pub fn lookup(&self, method: Method, path: &str) -> Option<Route> {
        let key = (method, normalize_path(path).to_string());
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Lists every registered (method, path), sorted.
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes: Vec<_> = self
            .routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        routes.sort();
        routes
    }

    pub fn len(&self) -> usize {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes())
            .finish()
    }
}
