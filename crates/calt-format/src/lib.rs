//! ALT template container codec and ALU builder.
//!
//! An ALT file is a consignment holding one card-application load-unit
//! template. This crate reads ALT files, locates their personalizable fields
//! and builds the personalized load unit (ALU) image.
//!
//! # File Format
//!
//! All multi-byte integers are big-endian.
//! - 65 bytes: file header (`"CALT"` magic, consignment and issuer identity)
//! - 33 bytes: template header (descriptor count and record length)
//! - 8 bytes: MCD number
//! - code, data, dir and fci sections, each a u16 length and that many bytes
//! - 4 bytes: application signature length and KTU length
//! - N x 8 bytes: field descriptors
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use calt_format::{AltFile, FieldOrigin, Personalization};
//!
//! let alt = AltFile::open("template.alt")?;
//! let mut session = Personalization::from_container(&alt);
//!
//! let cardholder = HashMap::from([("5A".to_string(), "4111111111111111".to_string())]);
//! session.resolve(FieldOrigin::Cardholder, &cardholder);
//!
//! let image = session.build(&alt)?;
//! std::fs::write("unit.alu", &image)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod container;
mod error;
mod header;
mod layout;
mod locate;
mod personalize;

pub mod descriptor;
pub mod tlv;

#[cfg(test)]
mod fixtures;

pub use builder::AluBuilder;
pub use container::{AltFile, DataSections, MCD_SIZE, PADDING_SIZE};
pub use error::{Error, FieldFailure, PendingField, Region, Result};
pub use header::{AltFileHeader, IssueDate, IssueTime, TemplateHeader};
pub use layout::{AluLayout, SectionLengths, SectionSlot};
pub use locate::{locate, ResolvedField};
pub use personalize::{
    is_key_material_tag, FieldOrigin, FieldStatus, Personalization, PersonalizationField,
    TagValueProvider, KEY_MATERIAL_TAGS,
};

// Re-export commonly used descriptor types at crate root
pub use descriptor::{DataCategory, DataFormat, FieldDescriptor};
