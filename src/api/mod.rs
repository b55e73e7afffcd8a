//! API Module
//!
//! Reference handlers and the HTTP transport adapter.
//!
//! # Endpoints
//! - `GET /api/data` - Cached data lookup keyed by query parameters
//! - `POST /api/data` - Store-and-echo of a JSON object (never cached)
//! - `GET /api/stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
