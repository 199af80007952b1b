//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid data key {0:?}: keys may only contain letters (A-Z, a-z), digits (0-9), or the symbols \"._-\"")]
    InvalidKey(String),

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
