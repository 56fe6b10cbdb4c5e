//! Error types for powerwire.

use thiserror::Error;

/// Main error type for all powerwire operations.
#[derive(Debug, Error)]
pub enum PowerwireError {
    /// I/O error on the byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial device could not be opened or configured.
    #[error("serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Protocol error (malformed reply, bad length byte, short buffer).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The interface never produced a valid reply within the retry bound.
    #[error("no valid reply after {0} retries")]
    RetriesExhausted(u8),
}

/// Result type alias using PowerwireError.
pub type Result<T> = std::result::Result<T, PowerwireError>;
