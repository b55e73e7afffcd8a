//! Routing Module
//!
//! Static registry mapping (method, normalized path) to handlers.

mod method;
mod table;

pub use method::{normalize_path, Method, UnsupportedMethod};
pub use table::{handler_fn, BoxFuture, CachePolicy, Handler, Route, RouteTable};
