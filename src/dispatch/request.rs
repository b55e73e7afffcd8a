//! Request and reply types passed between the transport, the dispatcher and
//! route handlers.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{DispatchError, Result};
use crate::routing::Method;

/// Query parameters in canonical (sorted) key order.
pub type QueryParams = BTreeMap<String, String>;

// == Request ==
/// An inbound request as seen by a handler.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Normalized path, no leading or trailing slash
    pub path: String,
    pub query: QueryParams,
    /// Fully accumulated request body
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>, query: QueryParams, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            body,
        }
    }

    /// Parses the body as JSON. A malformed body is a [`DispatchError::BadInput`].
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The query parameters as a JSON object.
    pub fn query_value(&self) -> Value {
        query_to_value(&self.query)
    }
}

// == Reply ==
/// A complete response: status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// 200 OK
    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// 201 Created
    pub fn created(body: Value) -> Self {
        Self::new(StatusCode::CREATED, body)
    }

    /// The `{error, message}` reply for a dispatch failure.
    pub fn from_error(err: &DispatchError) -> Self {
        let payload = err.payload();
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(payload.error));
        body.insert("message".to_string(), Value::String(payload.message));
        Self::new(err.status(), Value::Object(body))
    }

    /// Serialized body, as written to the wire.
    pub fn body_string(&self) -> String {
        self.body.to_string()
    }
}

impl From<DispatchError> for Reply {
    fn from(err: DispatchError) -> Self {
        Reply::from_error(&err)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// == Fingerprint ==
/// Deterministic cache key for a request: `<prefix>_<query as JSON>`.
///
/// Keys are serialized in sorted order, so logically identical queries map to
/// the same fingerprint regardless of the order parameters arrived in.
pub fn fingerprint(prefix: &str, query: &QueryParams) -> String {
    format!("{}_{}", prefix, query_to_value(query))
}

fn query_to_value(query: &QueryParams) -> Value {
    Value::Object(
        query
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}
