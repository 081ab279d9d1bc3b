//! Data models for the EcoTrack data API.
//!
//! `air_quality` holds the normalized pipeline schema shared by every
//! provider; `api` holds the HTTP request and response shapes.

pub mod air_quality;
pub mod api;

pub use air_quality::*;
pub use api::*;
