//! API Routes
//!
//! Configures the Axum router that adapts HTTP onto the request dispatcher.

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{dispatch_handler, AppState};

/// Creates the main router.
///
/// Every request, whatever its method or path, goes to
/// [`dispatch_handler`]; routing itself is the dispatcher's job.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .fallback(dispatch_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
