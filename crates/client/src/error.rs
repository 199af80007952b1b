//! Error types for client operations.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Domain error from validation, serialization, or decoding.
    #[error(transparent)]
    Core(#[from] stowage_core::Error),

    /// No stored object exists under the requested key.
    #[error("{0} not found")]
    NotFound(String),

    /// Downloaded byte count does not match the announced size.
    #[error("file sizes do not match: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Downloaded content hash does not match the announced checksum.
    #[error("checksums do not match: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Token refresh failed or the service rejected our credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure from the HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success service response. Fatal on first occurrence.
    #[error("{operation} for {subject:?} failed, status_code={status}")]
    Service {
        operation: &'static str,
        subject: String,
        status: u16,
    },

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a retry of the failed operation could succeed.
    ///
    /// Only transport-level failures qualify: timeouts and connection errors.
    /// Any response the service actually produced, failed status codes
    /// included, is fatal and propagates on the first occurrence.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_timeout() || e.is_connect())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
