pub mod auth;
pub mod contacts;
pub mod reset;

use crate::error::ApiError;

/// Reject blank form fields.
fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(field));
    }
    Ok(value)
}
