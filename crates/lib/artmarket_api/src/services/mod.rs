//! Business logic behind the handlers.

pub mod admin;
pub mod auth;
pub mod users;

use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

/// Longest accepted first or last name.
pub const MAX_NAME_LEN: usize = 100;

/// Check a name field, recording any problem under `field`.
fn check_name(fields: &mut BTreeMap<String, String>, field: &str, label: &str, value: &str) {
    if value.trim().is_empty() {
        fields.insert(field.to_string(), format!("{label} is required"));
    } else if value.trim().chars().count() > MAX_NAME_LEN {
        fields.insert(
            field.to_string(),
            format!("{label} must not exceed {MAX_NAME_LEN} characters"),
        );
    }
}

fn validated(fields: BTreeMap<String, String>) -> AppResult<()> {
    if fields.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(fields))
    }
}
