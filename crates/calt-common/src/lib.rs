//! Common utilities for calt.
//!
//! This crate provides the low-level building blocks shared by the calt crates:
//!
//! - [`BinaryReader`] - Zero-copy big-endian reading from byte slices
//! - [`hex`] - Hex string rendering and parsing, packed-decimal digits

mod error;
mod reader;

pub mod hex;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Re-export the big-endian integer wrappers used by on-disk structs
pub use zerocopy::byteorder::{BigEndian, U16, U32};
