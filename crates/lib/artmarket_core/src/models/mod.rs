//! Domain models shared by the core and the API layer.
//!
//! These are internal models; the API crate keeps its own camelCase DTOs.

pub mod auth;
pub mod user;
