//! Configuration structures and loading utilities.
//!
//! Every struct has a `from_env()` constructor reading process environment
//! variables with defaults, and a `from_lookup()` twin that takes any
//! key-to-value function so tests never touch the real environment.

pub mod app;
pub mod cache;
pub mod logging;
pub mod metrics;
pub mod upstream_client;

pub use app::*;
pub use cache::*;
pub use logging::*;
pub use metrics::*;

use std::str::FromStr;

/// Source of configuration values, usually `std::env::var`.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Lookup backed by the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Read a non-blank value.
pub(crate) fn non_empty(lookup: EnvLookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a value, falling back to `default` when absent or malformed.
pub(crate) fn parse_or<T: FromStr>(lookup: EnvLookup<'_>, key: &str, default: T) -> T {
    non_empty(lookup, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
pub(crate) fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: std::collections::HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}
