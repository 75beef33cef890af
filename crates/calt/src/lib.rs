//! Calt - ALT/ALU smart-card personalization container library.
//!
//! This crate provides a unified interface to the calt crates for reading
//! load-unit templates (ALT) and building personalized load units (ALU).
//!
//! # Crates
//!
//! - [`calt_common`] - Common utilities (big-endian reading, hex helpers)
//! - [`calt_format`] - ALT codec, field locator and ALU builder
//! - [`calt_data`] - Cardholder data, key material and EMV tag names
//!
//! # Example
//!
//! ```no_run
//! use calt::prelude::*;
//!
//! let alt = AltFile::open("template.alt")?;
//! let mut session = Personalization::from_container(&alt);
//!
//! session.resolve(FieldOrigin::Cardholder, &CardholderData::from_path("card.xml")?);
//! session.resolve(FieldOrigin::KeyMaterial, &KeyMaterial::from_path("keys.xml")?);
//!
//! let image = session.build(&alt)?;
//! std::fs::write("unit.alu", &image)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use calt_common as common;
pub use calt_data as data;
pub use calt_format as format;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use calt_common::BinaryReader;
    pub use calt_data::{CardholderData, CardholderField, KeyMaterial, Lookup, TagDictionary};
    pub use calt_format::{
        AltFile, AltFileHeader, AluBuilder, AluLayout, DataCategory, DataFormat, DataSections,
        FieldDescriptor, FieldOrigin, FieldStatus, Personalization, PersonalizationField,
        ResolvedField, TagValueProvider, TemplateHeader,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
