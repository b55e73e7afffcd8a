//! Response models for the reference API handlers
//!
//! This module defines the DTOs serialized into handler reply bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{DataItem, DataResponse, HealthResponse, StatsResponse};
