//! Error types for ALT parsing and ALU building.

use std::fmt;

use thiserror::Error;

/// A named region of an ALT template or ALU image, used to locate errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Region {
    FileHeader,
    TemplateHeader,
    Mcd,
    CodeSection,
    DataSection,
    DirSection,
    FciSection,
    Padding,
    FieldDescriptors,
}

impl Region {
    /// Human-readable name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Region::FileHeader => "file header",
            Region::TemplateHeader => "template header",
            Region::Mcd => "mcd",
            Region::CodeSection => "code section",
            Region::DataSection => "data section",
            Region::DirSection => "dir section",
            Region::FciSection => "fci section",
            Region::Padding => "padding",
            Region::FieldDescriptors => "field descriptors",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A personalization field that was not ready when a build was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingField {
    /// Position of the field's descriptor in the template.
    pub index: usize,
    /// Descriptor tag as four hex digits.
    pub tag: String,
    /// Rendered field status.
    pub status: String,
}

impl fmt::Display for PendingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} tag {} ({})", self.index + 1, self.tag, self.status)
    }
}

/// A personalization field that could not be written into the ALU image.
#[derive(Debug)]
pub struct FieldFailure {
    /// Position of the field's descriptor in the template.
    pub index: usize,
    /// Descriptor tag as four hex digits.
    pub tag: String,
    /// Why the write was rejected.
    pub error: Error,
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} tag {}: {}", self.index + 1, self.tag, self.error)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur when working with ALT templates and ALU images.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] calt_common::Error),

    /// Structurally invalid content (bad magic, bad record size, impossible date).
    #[error("invalid {region} at offset {offset}: {reason}")]
    Format {
        region: Region,
        offset: usize,
        reason: String,
    },

    /// Fewer bytes remain than a declared length requires.
    #[error("truncated {region} at offset {offset}: needed {needed} bytes but only {available} remain")]
    Truncated {
        region: Region,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A declared length is larger than the whole buffer.
    #[error("{region} at offset {offset} declares {declared} bytes, beyond the {buffer_len}-byte buffer")]
    Range {
        region: Region,
        offset: usize,
        declared: usize,
        buffer_len: usize,
    },

    /// A computed field range runs past the end of its section.
    #[error("field range {offset}..{} exceeds the {limit}-byte {region}", .offset + .length)]
    Bounds {
        region: Region,
        offset: usize,
        length: usize,
        limit: usize,
    },

    /// Invalid BER-TLV length octets.
    #[error("malformed TLV length at offset {offset}: {reason}")]
    MalformedLength { offset: usize, reason: String },

    /// TLV tag octets changed while writing a value.
    #[error("TLV tag at offset {offset} changed from {expected:02X?} to {actual:02X?}")]
    TagMismatch {
        offset: usize,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// Raw replacement value does not have the descriptor's length.
    #[error("value for tag {tag} must be {expected} bytes, got {actual}")]
    LengthMismatch {
        tag: String,
        expected: usize,
        actual: usize,
    },

    /// TLV replacement would change the number of bytes the entry occupies.
    #[error("TLV entry for tag {tag} occupies {original} bytes, replacement would occupy {replacement}")]
    SpanChanged {
        tag: String,
        original: usize,
        replacement: usize,
    },

    /// A provider returned a value that is not valid hex.
    #[error("value for tag {tag} is not valid hex: {reason}")]
    InvalidHex { tag: String, reason: String },

    /// Fields that need external data were not resolved before building.
    #[error("{} field(s) not ready: {}", .0.len(), join(.0))]
    FieldStatus(Vec<PendingField>),

    /// One or more fields were rejected while building the ALU image.
    #[error("{} field(s) rejected: {}", .0.len(), join(.0))]
    FieldsRejected(Vec<FieldFailure>),
}

/// Result type for ALT and ALU operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_names_region() {
        let err = Error::Truncated {
            region: Region::CodeSection,
            offset: 100,
            needed: 50,
            available: 40,
        };
        let message = err.to_string();
        assert!(message.contains("code section"));
        assert!(message.contains("offset 100"));
    }

    #[test]
    fn test_field_status_lists_every_field() {
        let err = Error::FieldStatus(vec![
            PendingField {
                index: 0,
                tag: "005A".into(),
                status: "pending cardholder data".into(),
            },
            PendingField {
                index: 3,
                tag: "DF42".into(),
                status: "error: no data".into(),
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("2 field(s) not ready"));
        assert!(message.contains("005A"));
        assert!(message.contains("#4 tag DF42"));
    }
}
