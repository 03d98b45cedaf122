//! Admission middleware.

pub mod auth;
pub mod errors;
pub mod policy;
pub mod rate_limit;
