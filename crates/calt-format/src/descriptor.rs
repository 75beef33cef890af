//! Field descriptor ("PDA record") decoding.
//!
//! Each personalizable field of a template is described by an 8-byte record:
//!
//! ```text
//! byte 0   source(0x80) usage(0x40) interface(0x30) profile(0x0F)
//! byte 1   format(0x80) presence(0x40) length-check(0x20) category(0x08)
//! 2..4     tag      (big-endian)
//! 4..6     length   (big-endian)
//! 6..8     address  (big-endian, offset within the data or FCI section)
//! ```

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use calt_common::hex::{to_hex, trim_tag};

use crate::Region;

const SOURCE_MASK: u8 = 0x80;
const USAGE_MASK: u8 = 0x40;
const INTERFACE_MASK: u8 = 0x30;
const PROFILE_MASK: u8 = 0x0F;
const FORMAT_MASK: u8 = 0x80;
const PRESENCE_MASK: u8 = 0x40;
const LENGTH_CHECK_MASK: u8 = 0x20;
const CATEGORY_MASK: u8 = 0x08;

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DataSource {
    /// Supplied by the loading system.
    System,
    /// Supplied from an external source (cardholder data file).
    External,
}

/// Who consumes a field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DataUsage {
    /// Consumed by the loading system, never written into the ALU.
    System,
    /// Written into the ALU for the application's own logic.
    LoadUnit,
}

/// Card interface a field applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InterfaceClass {
    None,
    Contact,
    Contactless,
    Dual,
}

/// How a field's value is stored in its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DataFormat {
    /// Bare value bytes of the descriptor's length.
    Raw,
    /// BER-TLV entry starting at the descriptor's address.
    Tlv,
}

/// Whether a field must be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Presence {
    Mandatory,
    Optional,
}

/// How the descriptor's length is checked against the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LengthCheck {
    Exact,
    Maximum,
}

/// Which section a field lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DataCategory {
    /// The data section.
    Application,
    /// The FCI section.
    Fci,
}

/// Personalization profile number (low nibble of the first flag byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Profile(pub u8);

impl Profile {
    /// Description of the profile, `"Unknown Profile (n)"` outside the table.
    pub fn description(self) -> String {
        match self.0 {
            0 => "Profile 0 (Contact Legacy)".to_string(),
            1 => "Profile 1 (Contactless Legacy)".to_string(),
            2 => "Profile 2 (Contact Non-Legacy)".to_string(),
            3 => "Profile 3 (Contactless Non-Legacy)".to_string(),
            n => format!("Unknown Profile ({})", n),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

macro_rules! labels {
    ($($ty:ident { $($variant:ident => $label:literal),+ $(,)? })+) => {
        $(
            impl $ty {
                /// Label used when rendering descriptors.
                pub const fn label(self) -> &'static str {
                    match self {
                        $($ty::$variant => $label),+
                    }
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }
        )+
    };
}

labels! {
    DataSource { System => "System", External => "External" }
    DataUsage { System => "System", LoadUnit => "Load-unit logic" }
    InterfaceClass { None => "none", Contact => "contact", Contactless => "contactless", Dual => "dual" }
    DataFormat { Raw => "Raw", Tlv => "TLV" }
    Presence { Mandatory => "Mandatory", Optional => "Optional" }
    LengthCheck { Exact => "Exact", Maximum => "Maximum" }
    DataCategory { Application => "Application data", Fci => "FCI" }
}

impl DataCategory {
    /// The container region holding fields of this category.
    pub const fn region(self) -> Region {
        match self {
            DataCategory::Application => Region::DataSection,
            DataCategory::Fci => Region::FciSection,
        }
    }
}

/// A decoded field descriptor record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldDescriptor {
    /// Zero-based position in the template's descriptor array.
    pub index: usize,
    /// The undecoded record.
    pub raw: [u8; 8],
    /// Tag of the field.
    pub tag: u16,
    /// Declared value length.
    pub length: u16,
    /// Offset of the field within its section.
    pub address: u16,
    pub source: DataSource,
    pub usage: DataUsage,
    pub interface: InterfaceClass,
    pub profile: Profile,
    pub format: DataFormat,
    pub presence: Presence,
    pub length_check: LengthCheck,
    pub category: DataCategory,
}

impl FieldDescriptor {
    /// Size of one descriptor record in bytes.
    pub const SIZE: usize = 8;

    /// Decode a single 8-byte record.
    pub fn decode(index: usize, record: [u8; 8]) -> Self {
        let b0 = record[0];
        let b1 = record[1];

        Self {
            index,
            raw: record,
            tag: BigEndian::read_u16(&record[2..4]),
            length: BigEndian::read_u16(&record[4..6]),
            address: BigEndian::read_u16(&record[6..8]),
            source: if b0 & SOURCE_MASK != 0 {
                DataSource::System
            } else {
                DataSource::External
            },
            usage: if b0 & USAGE_MASK != 0 {
                DataUsage::System
            } else {
                DataUsage::LoadUnit
            },
            interface: match (b0 & INTERFACE_MASK) >> 4 {
                0 => InterfaceClass::None,
                1 => InterfaceClass::Contact,
                2 => InterfaceClass::Contactless,
                _ => InterfaceClass::Dual,
            },
            profile: Profile(b0 & PROFILE_MASK),
            format: if b1 & FORMAT_MASK != 0 {
                DataFormat::Tlv
            } else {
                DataFormat::Raw
            },
            presence: if b1 & PRESENCE_MASK != 0 {
                Presence::Optional
            } else {
                Presence::Mandatory
            },
            length_check: if b1 & LENGTH_CHECK_MASK != 0 {
                LengthCheck::Maximum
            } else {
                LengthCheck::Exact
            },
            category: if b1 & CATEGORY_MASK != 0 {
                DataCategory::Fci
            } else {
                DataCategory::Application
            },
        }
    }

    /// Split a descriptor array into records and decode each one.
    ///
    /// Any trailing partial record is ignored; callers size the slice as
    /// `count * SIZE`.
    pub fn decode_all(bytes: &[u8]) -> Vec<Self> {
        bytes
            .chunks_exact(Self::SIZE)
            .enumerate()
            .map(|(index, chunk)| {
                let mut record = [0u8; Self::SIZE];
                record.copy_from_slice(chunk);
                Self::decode(index, record)
            })
            .collect()
    }

    /// Whether the field is written into the ALU.
    pub fn is_load_unit_bound(&self) -> bool {
        self.usage == DataUsage::LoadUnit
    }

    /// Number of tag octets the field's TLV entry starts with.
    ///
    /// A tag of at most two hex digits (ignoring leading zeros) is one octet.
    pub fn tag_width(&self) -> usize {
        if self.tag <= 0xFF {
            1
        } else {
            2
        }
    }

    /// The tag as four hex digits, e.g. `"005A"`.
    pub fn tag_hex(&self) -> String {
        format!("{:04X}", self.tag)
    }

    /// The tag without a leading zero octet, e.g. `"5A"` for `005A`.
    pub fn short_tag(&self) -> String {
        let full = self.tag_hex();
        if full.starts_with("00") {
            full[2..].to_string()
        } else {
            full
        }
    }

    /// The tag with every leading zero digit stripped.
    pub fn normalized_tag(&self) -> String {
        trim_tag(&self.tag_hex()).to_string()
    }

    /// The declared length as four hex digits.
    pub fn length_hex(&self) -> String {
        format!("{:04X}", self.length)
    }

    /// The address as four hex digits.
    pub fn address_hex(&self) -> String {
        format!("{:04X}", self.address)
    }

    /// The flag bytes as four hex digits.
    pub fn flags_hex(&self) -> String {
        to_hex(&self.raw[..2])
    }

    /// The whole record as sixteen hex digits.
    pub fn raw_hex(&self) -> String {
        to_hex(&self.raw)
    }
}
