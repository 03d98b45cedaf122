//! Request extractors.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// `Json` whose rejection renders through [`AppError`], so malformed bodies
/// get the standard validation envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query` with the same envelope for unparseable query strings.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
