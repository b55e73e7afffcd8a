//! Request Dispatcher
//!
//! Routes an inbound request to its handler, serving and populating the
//! read-through cache for cached routes, and publishes one event per state
//! transition.
//!
//! # Per-request state machine
//! ```text
//! Received ──lookup miss──▶ NotFound
//!    │
//!    └─lookup hit─▶ Dispatched ──cached route, fingerprint hit──▶ ServedFromCache
//!                       │
//!                       ├──handler ok, cached route──▶ Served
//!                       ├──handler ok, plain route───▶ Processed
//!                       └──handler error/panic/timeout──▶ ProcessingError
//! ```

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Bytes, http::StatusCode};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::dispatch::{fingerprint, DispatchEvent, QueryParams, Reply, Request};
use crate::error::{DispatchError, Result};
use crate::events::{EventBus, SubscriptionId};
use crate::routing::{
    handler_fn, normalize_path, CachePolicy, Handler, Method, Route, RouteTable,
};

/// Deadline applied to a handler when none is configured.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// Aborts the wrapped task when dropped, so a dispatch future that is itself
/// dropped does not leave its handler running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// == Request Dispatcher ==
/// Dispatches requests against a [`RouteTable`], consulting a shared
/// [`TtlCache`] for read-through routes.
pub struct RequestDispatcher {
    routes: Arc<RouteTable>,
    cache: Arc<TtlCache>,
    events: EventBus<DispatchEvent>,
    handler_timeout: Duration,
}

impl RequestDispatcher {
    // == Constructors ==
    /// Creates a dispatcher with its own, empty route table.
    pub fn new(cache: Arc<TtlCache>) -> Self {
        Self::with_table(Arc::new(RouteTable::new()), cache)
    }

    /// Creates a dispatcher over an injected route table.
    pub fn with_table(routes: Arc<RouteTable>, cache: Arc<TtlCache>) -> Self {
        Self {
            routes,
            cache,
            events: EventBus::new(),
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    /// Sets the per-handler deadline.
    pub fn with_timeout(mut self, handler_timeout: Duration) -> Self {
        self.handler_timeout = handler_timeout;
        self
    }

    // == Registration ==
    /// Registers an uncached handler for (method, path), replacing any
    /// existing one. Emits `route-registered`.
    pub fn register_route<F, Fut>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.install(method, path, Route::new(handler_fn(handler)));
    }

    /// Registers a read-through cached GET handler.
    ///
    /// Results are stored under `fingerprint(key_prefix, query)` for `ttl_ms`
    /// (the cache default when `None`). Only GET routes can be cached.
    pub fn register_cached_route<F, Fut>(
        &self,
        path: &str,
        key_prefix: &str,
        ttl_ms: Option<i64>,
        handler: F,
    ) where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        self.install(
            Method::Get,
            path,
            Route::cached(handler_fn(handler), key_prefix, ttl_ms),
        );
    }

    fn install(&self, method: Method, path: &str, route: Route) {
        let path = normalize_path(path).to_string();
        if self.routes.register(method, &path, route).is_some() {
            debug!(%method, %path, "Replaced existing route");
        }
        self.events
            .emit(&DispatchEvent::RouteRegistered { method, path });
    }

    // == Handle Request ==
    /// Dispatches one request and returns exactly one reply.
    ///
    /// `method` is matched case-insensitively; methods outside the supported
    /// set dispatch to NotFound. `path` is normalized before lookup. Handler
    /// failures never escape: they become error replies.
    pub async fn handle_request(
        &self,
        method: &str,
        path: &str,
        query: QueryParams,
        body: Bytes,
    ) -> Reply {
        self.handle_incoming(method, path, Ok((query, body))).await
    }

    /// Dispatches a request whose query string or body may have failed to
    /// decode at the transport.
    ///
    /// The route is resolved first, so an unknown route is still NotFound. A
    /// decode failure on a matched route ends in `data-processing-error`
    /// without running the handler.
    pub async fn handle_incoming(
        &self,
        method: &str,
        path: &str,
        input: Result<(QueryParams, Bytes)>,
    ) -> Reply {
        let method_name = method.to_ascii_uppercase();
        let path = normalize_path(path).to_string();

        self.events.emit(&DispatchEvent::RequestReceived {
            method: method_name.clone(),
            path: path.clone(),
        });

        let matched = method_name
            .parse::<Method>()
            .ok()
            .and_then(|method| self.routes.lookup(method, &path).map(|route| (method, route)));

        let Some((method, route)) = matched else {
            return self.not_found(method_name, path);
        };

        let (query, body) = match input {
            Ok(input) => input,
            Err(err) => return self.processing_error(err),
        };

        let request = Request::new(method, path, query, body);
        let outcome = match route.cache {
            CachePolicy::Bypass => self.serve(route.handler, request).await,
            CachePolicy::ReadThrough { key_prefix, ttl_ms } => {
                self.serve_cached(route.handler, request, &key_prefix, ttl_ms)
                    .await
            }
        };

        outcome.unwrap_or_else(|err| self.processing_error(err))
    }

    fn not_found(&self, method: String, path: String) -> Reply {
        debug!(%method, %path, "No route matched");
        self.events.emit(&DispatchEvent::NotFound {
            method: method.clone(),
            path: path.clone(),
        });
        Reply::from(DispatchError::NotFound { method, path })
    }

    fn processing_error(&self, err: DispatchError) -> Reply {
        warn!(error = %err, kind = err.kind(), "Handler failed");
        self.events.emit(&DispatchEvent::DataProcessingError {
            error: err.to_string(),
        });
        Reply::from(err)
    }

    /// Runs an uncached handler.
    async fn serve(&self, handler: Handler, request: Request) -> Result<Reply> {
        let reply = self.run(handler, request).await?;
        self.events.emit(&DispatchEvent::DataProcessed {
            data: reply.body.clone(),
        });
        Ok(reply)
    }

    /// Serves from the cache when the fingerprint is live, otherwise runs the
    /// handler and stores a 200 result.
    async fn serve_cached(
        &self,
        handler: Handler,
        request: Request,
        key_prefix: &str,
        ttl_ms: Option<i64>,
    ) -> Result<Reply> {
        let key = fingerprint(key_prefix, &request.query);
        let query = request.query_value();

        // Lock held only inside get/set, never across the handler.
        if let Some(cached) = self.cache.get(&key) {
            self.events
                .emit(&DispatchEvent::DataServedFromCache { query });
            return Ok(Reply::ok(cached));
        }

        // Hits replay as 200, so only 200 replies are stored.
        let reply = self.run(handler, request).await?;
        if reply.status == StatusCode::OK {
            let ttl_ms = ttl_ms.unwrap_or_else(|| self.cache.default_ttl_ms());
            self.cache.set_with_ttl(key, reply.body.clone(), ttl_ms);
        }

        self.events.emit(&DispatchEvent::DataServed { query });
        Ok(reply)
    }

    /// Runs a handler on its own task under the dispatch deadline.
    ///
    /// A panic inside the handler surfaces as `Internal`; exceeding the
    /// deadline aborts the task and surfaces as `TimedOut`.
    async fn run(&self, handler: Handler, request: Request) -> Result<Reply> {
        let mut task = AbortOnDrop(tokio::spawn(handler(request)));

        match tokio::time::timeout(self.handler_timeout, &mut task.0).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => Err(DispatchError::Internal(
                panic_message(join_err.into_panic()),
            )),
            Ok(Err(_)) => Err(DispatchError::Internal(
                "handler task was cancelled".to_string(),
            )),
            Err(_) => Err(DispatchError::TimedOut(self.handler_timeout)),
        }
    }

    // == Events ==
    /// Registers an observer for dispatcher events.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&DispatchEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    // == Accessors ==
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn handler_timeout(&self) -> Duration {
        self.handler_timeout
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("routes", &self.routes)
            .field("cache", &self.cache)
            .field("handler_timeout", &self.handler_timeout)
            .finish()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", msg)
    } else {
        "handler panicked".to_string()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEvent, ManualClock};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Harness {
        dispatcher: RequestDispatcher,
        clock: Arc<ManualClock>,
        events: Arc<Mutex<Vec<DispatchEvent>>>,
        cache_events: Arc<Mutex<Vec<CacheEvent>>>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = Arc::new(TtlCache::with_clock(60_000, clock.clone()));
        let dispatcher = RequestDispatcher::new(cache.clone());

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        dispatcher.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let cache_events = Arc::new(Mutex::new(Vec::new()));
        let sink = cache_events.clone();
        cache.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        Harness {
            dispatcher,
            clock,
            events,
            cache_events,
        }
    }

    fn names(events: &Mutex<Vec<DispatchEvent>>) -> Vec<&'static str> {
        events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    async fn echo(req: Request) -> Result<Reply> {
        Ok(Reply::created(req.json()?))
    }

    fn query(q: &str) -> QueryParams {
        QueryParams::from([("q".to_string(), q.to_string())])
    }

    #[tokio::test]
    async fn test_registration_emits_event() {
        let h = harness();
        h.dispatcher
            .register_route(Method::Put, "/items/", |_req| async { Ok(Reply::ok(json!(1))) });

        assert_eq!(
            *h.events.lock().unwrap(),
            vec![DispatchEvent::RouteRegistered {
                method: Method::Put,
                path: "items".into(),
            }]
        );
        assert!(h.dispatcher.routes().lookup(Method::Put, "items").is_some());
    }

    #[tokio::test]
    async fn test_not_found() {
        let h = harness();

        let reply = h
            .dispatcher
            .handle_request("GET", "/missing", QueryParams::new(), Bytes::new())
            .await;

        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(
            reply.body,
            json!({"error": "Not Found", "message": "GET missing does not exist"})
        );
        assert_eq!(names(&h.events), vec!["request-received", "not-found"]);
    }

    #[tokio::test]
    async fn test_unsupported_method_is_not_found() {
        let h = harness();
        h.dispatcher
            .register_route(Method::Get, "x", |_req| async { Ok(Reply::ok(json!(1))) });

        let reply = h
            .dispatcher
            .handle_request("patch", "x", QueryParams::new(), Bytes::new())
            .await;

        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body["message"], "PATCH x does not exist");
    }

    #[tokio::test]
    async fn test_method_is_case_insensitive() {
        let h = harness();
        h.dispatcher
            .register_route(Method::Delete, "x", |_req| async { Ok(Reply::ok(json!("gone"))) });

        let reply = h
            .dispatcher
            .handle_request("delete", "/x", QueryParams::new(), Bytes::new())
            .await;
        assert_eq!(reply.body, json!("gone"));
    }

    #[tokio::test]
    async fn test_plain_route_emits_processed() {
        let h = harness();
        h.dispatcher.register_route(Method::Post, "echo", echo);

        let reply = h
            .dispatcher
            .handle_request("POST", "echo", QueryParams::new(), Bytes::from_static(b"[1,2]"))
            .await;

        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(
            h.events.lock().unwrap().last(),
            Some(&DispatchEvent::DataProcessed { data: json!([1, 2]) })
        );
        assert!(h.cache_events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_through_cache() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        h.dispatcher
            .register_cached_route("count", "count", None, move |_req| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(Reply::ok(json!({ "call": n }))) }
            });

        let first = h
            .dispatcher
            .handle_request("GET", "count", query("x"), Bytes::new())
            .await;
        let second = h
            .dispatcher
            .handle_request("GET", "count", query("x"), Bytes::new())
            .await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            names(&h.events)[1..],
            ["request-received", "data-served", "request-received", "data-served-from-cache"]
        );
        assert!(h.dispatcher.cache().has(r#"count_{"q":"x"}"#));

        h.clock.advance(60_001);
        let third = h
            .dispatcher
            .handle_request("GET", "count", query("x"), Bytes::new())
            .await;
        assert_eq!(third.body, json!({"call": 2}));
        assert_eq!(names(&h.events).last(), Some(&"data-served"));
    }

    #[tokio::test]
    async fn test_cached_route_custom_ttl() {
        let h = harness();
        h.dispatcher
            .register_cached_route("short", "short", Some(10), |_req| async {
                Ok(Reply::ok(json!("v")))
            });

        h.dispatcher
            .handle_request("GET", "short", QueryParams::new(), Bytes::new())
            .await;
        h.clock.advance(11);
        assert!(!h.dispatcher.cache().has("short_{}"));
    }

    #[tokio::test]
    async fn test_distinct_queries_cached_separately() {
        let h = harness();
        h.dispatcher
            .register_cached_route("q", "q", None, |req: Request| async move {
                Ok(Reply::ok(req.query_value()))
            });

        let a = h
            .dispatcher
            .handle_request("GET", "q", query("a"), Bytes::new())
            .await;
        let b = h
            .dispatcher
            .handle_request("GET", "q", query("b"), Bytes::new())
            .await;

        assert_eq!(a.body, json!({"q": "a"}));
        assert_eq!(b.body, json!({"q": "b"}));
        assert_eq!(h.dispatcher.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_cached_handler_is_not_stored() {
        let h = harness();
        h.dispatcher
            .register_cached_route("fail", "fail", None, |_req| async {
                Err(DispatchError::Internal("computation failed".into()))
            });

        let reply = h
            .dispatcher
            .handle_request("GET", "fail", QueryParams::new(), Bytes::new())
            .await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            reply.body,
            json!({"error": "Internal Server Error", "message": "computation failed"})
        );
        assert!(h.dispatcher.cache().is_empty());
        assert_eq!(
            h.events.lock().unwrap().last(),
            Some(&DispatchEvent::DataProcessingError {
                error: "computation failed".into()
            })
        );
    }

    #[tokio::test]
    async fn test_non_ok_success_is_not_replayed_as_ok() {
        let h = harness();
        h.dispatcher
            .register_cached_route("made", "made", None, |_req| async {
                Ok(Reply::created(json!({"made": true})))
            });

        for _ in 0..2 {
            let reply = h
                .dispatcher
                .handle_request("GET", "made", QueryParams::new(), Bytes::new())
                .await;
            assert_eq!(reply.status, StatusCode::CREATED);
            assert_eq!(names(&h.events).last(), Some(&"data-served"));
        }
        assert!(h.dispatcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_bad_input_maps_to_400() {
        let h = harness();
        h.dispatcher.register_route(Method::Post, "echo", echo);

        let reply = h
            .dispatcher
            .handle_request("POST", "echo", QueryParams::new(), Bytes::from_static(b"{"))
            .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error"], "Bad Request");
        assert_eq!(names(&h.events).last(), Some(&"data-processing-error"));
    }

    #[tokio::test]
    async fn test_undecodable_input_is_processing_error() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        h.dispatcher.register_route(Method::Post, "echo", move |req| {
            counter.fetch_add(1, Ordering::SeqCst);
            echo(req)
        });

        let reply = h
            .dispatcher
            .handle_incoming(
                "POST",
                "echo",
                Err(DispatchError::BadInput("body too large".into())),
            )
            .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["message"], "body too large");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            names(&h.events)[1..],
            ["request-received", "data-processing-error"]
        );
    }

    #[tokio::test]
    async fn test_undecodable_input_on_unknown_route_is_not_found() {
        let h = harness();

        let reply = h
            .dispatcher
            .handle_incoming(
                "POST",
                "nowhere",
                Err(DispatchError::BadInput("body too large".into())),
            )
            .await;

        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(names(&h.events), vec!["request-received", "not-found"]);
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let h = harness();
        h.dispatcher.register_route(Method::Get, "panic", |_req| async {
            if true {
                panic!("kaboom");
            }
            Ok(Reply::ok(json!(null)))
        });

        let reply = h
            .dispatcher
            .handle_request("GET", "panic", QueryParams::new(), Bytes::new())
            .await;

        assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.body["message"], "handler panicked: kaboom");
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(TtlCache::with_clock(60_000, clock));
        let dispatcher =
            RequestDispatcher::new(cache.clone()).with_timeout(Duration::from_millis(50));
        dispatcher.register_cached_route("slow", "slow", None, |_req| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Reply::ok(json!("late")))
        });

        let reply = dispatcher
            .handle_request("GET", "slow", QueryParams::new(), Bytes::new())
            .await;

        assert_eq!(reply.status, StatusCode::GATEWAY_TIMEOUT);
        assert!(cache.is_empty());
        // The cache stays usable while the handler was stuck.
        assert!(cache.set("other", json!(1)));
    }

    #[tokio::test]
    async fn test_injected_table_is_shared() {
        let cache = Arc::new(TtlCache::new(60_000));
        let table = Arc::new(RouteTable::new());
        let first = RequestDispatcher::with_table(table.clone(), cache.clone());
        let second = RequestDispatcher::with_table(table.clone(), cache);

        first.register_route(Method::Get, "shared", |_req| async { Ok(Reply::ok(json!("s"))) });

        let reply = second
            .handle_request("GET", "shared", QueryParams::new(), Bytes::new())
            .await;
        assert_eq!(reply.body, json!("s"));
    }
}
