//! Error types for calt-common.

use thiserror::Error;

/// Common error type for calt operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Invalid hex string.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
