//! # artmarket_core
//!
//! Access-control core for Artmarket.
//!
//! Token issuance and verification, revocation, per-client rate limiting and
//! the static route policy. Everything here is independent of the HTTP
//! framework; `artmarket_api` wires it into axum.

pub mod auth;
pub mod denylist;
pub mod directory;
pub mod migrate;
pub mod models;
pub mod ownership;
pub mod policy;
pub mod rate_limit;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
