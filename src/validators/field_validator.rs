use lazy_regex::regex_is_match;

use crate::{error::StoreResult, StoreError};

/// Accepts dotted identifier paths such as `status` or `address.city`.
///
/// Field paths end up inside query text, so anything else is refused.
pub fn validate_field_path(path: &str) -> StoreResult<&str> {
    if regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$", path) {
        Ok(path)
    } else {
        Err(StoreError::InvalidField(path.to_string()))
    }
}

/// Backtick-escapes every segment of a validated path.
pub fn quote_field_path(path: &str) -> StoreResult<String> {
    let path = validate_field_path(path)?;
    Ok(path
        .split('.')
        .map(|part| format!("`{part}`"))
        .collect::<Vec<_>>()
        .join("."))
}
