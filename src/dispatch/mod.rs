//! Dispatch Module
//!
//! Request dispatcher with read-through caching and lifecycle events.

mod dispatcher;
mod events;
mod request;

pub use dispatcher::{RequestDispatcher, DEFAULT_HANDLER_TIMEOUT};
pub use events::DispatchEvent;
pub use request::{fingerprint, QueryParams, Reply, Request};
