//! Dispatcher lifecycle events.

use serde::Serialize;
use serde_json::Value;

use crate::routing::Method;

// == Dispatch Event ==
/// Transitions published by [`RequestDispatcher`](super::RequestDispatcher).
///
/// Every request produces `RequestReceived` followed by exactly one terminal
/// event: `NotFound`, `DataServedFromCache`, `DataServed`, `DataProcessed` or
/// `DataProcessingError`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DispatchEvent {
    RouteRegistered { method: Method, path: String },
    /// `method` is the raw (uppercased) method string, which may fall
    /// outside the supported set.
    RequestReceived { method: String, path: String },
    DataServedFromCache { query: Value },
    DataServed { query: Value },
    DataProcessed { data: Value },
    DataProcessingError { error: String },
    NotFound { method: String, path: String },
}

impl DispatchEvent {
    /// Returns the event name as published on the event stream.
    pub fn name(&self) -> &'static str {
        match self {
            DispatchEvent::RouteRegistered { .. } => "route-registered",
            DispatchEvent::RequestReceived { .. } => "request-received",
            DispatchEvent::DataServedFromCache { .. } => "data-served-from-cache",
            DispatchEvent::DataServed { .. } => "data-served",
            DispatchEvent::DataProcessed { .. } => "data-processed",
            DispatchEvent::DataProcessingError { .. } => "data-processing-error",
            DispatchEvent::NotFound { .. } => "not-found",
        }
    }

    /// True for the events that end a request.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            DispatchEvent::RouteRegistered { .. } | DispatchEvent::RequestReceived { .. }
        )
    }
}
