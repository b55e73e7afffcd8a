//! Cache Router - An in-process TTL cache coupled to a request dispatcher
//!
//! Provides a TTL cache with lifecycle events and a method/path dispatcher
//! that serves read-through cached routes from it.

pub mod api;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod routing;
pub mod tasks;

pub use api::{register_default_routes, AppState};
pub use cache::{CacheEvent, TtlCache};
pub use config::Config;
pub use dispatch::{DispatchEvent, QueryParams, Reply, Request, RequestDispatcher};
pub use error::DispatchError;
pub use routing::{Method, RouteTable};
pub use tasks::spawn_cleanup_task;
