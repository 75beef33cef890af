//! Error types for calt-data.

use thiserror::Error;

use crate::CardholderField;

/// Errors that can occur when loading provider documents.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is not UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Malformed XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// The document root is not the expected element.
    #[error("missing {0} root element")]
    MissingRoot(&'static str),

    /// A key document holds no usable keys.
    #[error("no valid keys found")]
    NoKeys,

    /// A cardholder value cannot be converted for its tag.
    #[error("cannot convert {field}: {reason}")]
    Conversion {
        field: CardholderField,
        reason: String,
    },
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, Error>;
