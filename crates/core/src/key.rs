//! Data key validation.
//!
//! A data key is the caller-chosen identifier for a stored blob. Keys are
//! checked against a restricted character set before any network call is made.

use crate::error::{Error, Result};

/// Returns true if `key` matches `^[A-Za-z0-9._-]+$`.
pub fn data_key_is_valid(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Validate a data key, returning `Error::InvalidKey` if it is malformed.
pub fn validate_data_key(key: &str) -> Result<()> {
    if data_key_is_valid(key) {
        Ok(())
    } else {
        Err(Error::InvalidKey(key.to_string()))
    }
}
