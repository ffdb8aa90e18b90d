//! Short code validation and generation

use rand::{distr::Alphanumeric, Rng};

use crate::error::StoreError;

/// Length of generated codes
pub const GENERATED_LENGTH: usize = 8;

/// Upper bound for custom codes
pub const MAX_LENGTH: usize = 20;

/// Path segments owned by API routes; a code with one of these names could
/// never be reached through the redirect endpoint.
const RESERVED: &[&str] = &["urls", "shorten"];

/// Checks a user-supplied code against `^[A-Za-z0-9_-]{1,20}$`
pub fn validate(code: &str) -> Result<(), StoreError> {
    if code.is_empty() || code.len() > MAX_LENGTH {
        return Err(StoreError::InvalidShortCode(format!(
            "length must be between 1 and {}, got {}",
            MAX_LENGTH,
            code.len()
        )));
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(StoreError::InvalidShortCode(format!(
            "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
            code
        )));
    }

    if RESERVED.contains(&code) {
        return Err(StoreError::InvalidShortCode(format!(
            "'{}' is reserved",
            code
        )));
    }

    Ok(())
}

/// Draws a random alphanumeric code of [`GENERATED_LENGTH`] characters
pub fn generate() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_LENGTH)
        .map(char::from)
        .collect()
}
