//! HTTP request handlers for API endpoints.
//!
//! Each handler is a thin adapter over the service layer; the app factory
//! and OpenAPI document live in `openapi`.

pub mod air_quality;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod version;

pub use air_quality::*;
pub use health::*;
pub use metrics::*;
pub use openapi::*;
pub use version::*;
