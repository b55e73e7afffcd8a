//! API Handlers
//!
//! Reference route handlers and the transport entry point that feeds axum
//! requests into the dispatcher.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Method as HttpMethod, StatusCode, Uri},
};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::dispatch::{QueryParams, Reply, Request, RequestDispatcher};
use crate::error::{DispatchError, Result};
use crate::models::{DataResponse, HealthResponse, StatsResponse};
use crate::routing::Method;

/// Application state shared across the transport.
#[derive(Clone)]
pub struct AppState {
    /// Dispatcher holding the route table and the shared cache
    pub dispatcher: Arc<RequestDispatcher>,
    /// Largest request body accumulated before dispatch
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wraps a dispatcher with the default body limit.
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            max_body_bytes: Config::default().max_body_bytes,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Builds the cache and dispatcher and registers the default routes.
    pub fn from_config(config: &Config) -> Self {
        let state = Self::without_routes(config);
        register_default_routes(&state.dispatcher);
        state
    }

    /// Builds the cache and dispatcher with an empty route table, leaving
    /// room to subscribe to events before any route is registered.
    pub fn without_routes(config: &Config) -> Self {
        let cache = Arc::new(TtlCache::new(config.default_ttl_ms));
        let dispatcher =
            RequestDispatcher::new(cache).with_timeout(config.handler_timeout());

        Self {
            dispatcher: Arc::new(dispatcher),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// The cache shared by every handler.
    pub fn cache(&self) -> &Arc<TtlCache> {
        self.dispatcher.cache()
    }
}

/// Registers the reference routes on `dispatcher`.
///
/// # Routes
/// - `GET api/data` - read-through cached under `data_<query>`
/// - `POST api/data` - echoes the JSON object with an id and timestamp, never cached
/// - `GET api/stats` - cache statistics
/// - `GET health` - health check
pub fn register_default_routes(dispatcher: &RequestDispatcher) {
    dispatcher.register_cached_route("api/data", "data", None, get_data);
    dispatcher.register_route(Method::Post, "api/data", post_data);

    let cache = dispatcher.cache().clone();
    dispatcher.register_route(Method::Get, "api/stats", move |_req| {
        stats(cache.clone())
    });
    dispatcher.register_route(Method::Get, "health", |_req| health());
}

/// Handler for GET /api/data
///
/// Builds the result object for the request's query parameters.
pub async fn get_data(req: Request) -> Result<Reply> {
    json_reply(StatusCode::OK, &DataResponse::compute(req.query))
}

/// Handler for POST /api/data
///
/// The body must be a JSON object. The reply carries the object's fields plus
/// a freshly generated `id` and a `timestamp`.
pub async fn post_data(req: Request) -> Result<Reply> {
    let payload: Map<String, Value> = req.json()?;

    let mut data = payload;
    data.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    data.insert(
        "timestamp".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );

    Ok(Reply::created(Value::Object(data)))
}

/// Handler for GET /api/stats
async fn stats(cache: Arc<TtlCache>) -> Result<Reply> {
    json_reply(StatusCode::OK, &StatsResponse::from(cache.stats()))
}

/// Handler for GET /health
async fn health() -> Result<Reply> {
    json_reply(StatusCode::OK, &HealthResponse::healthy())
}

fn json_reply<T: Serialize>(status: StatusCode, body: &T) -> Result<Reply> {
    let body = serde_json::to_value(body).map_err(|err| DispatchError::Internal(err.to_string()))?;
    Ok(Reply::new(status, body))
}

/// Fallback handler for every HTTP request.
///
/// Parses the query string, accumulates the body up to the configured limit
/// and hands the request to the dispatcher. Decode failures are passed along
/// so the dispatcher reports them like any other request. Body reading
/// completes before dispatch and holds no cache lock.
pub async fn dispatch_handler(
    State(state): State<AppState>,
    method: HttpMethod,
    uri: Uri,
    body: Body,
) -> Reply {
    let input = match Query::<QueryParams>::try_from_uri(&uri) {
        Ok(Query(query)) => axum::body::to_bytes(body, state.max_body_bytes)
            .await
            .map(|body| (query, body))
            .map_err(|err| {
                DispatchError::BadInput(format!("Failed to read request body: {}", err))
            }),
        Err(rejection) => Err(DispatchError::BadInput(rejection.body_text())),
    };

    state
        .dispatcher
        .handle_incoming(method.as_str(), uri.path(), input)
        .await
}
