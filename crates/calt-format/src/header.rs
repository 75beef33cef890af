//! ALT file header and template header structures.
//!
//! Both headers are fixed-size, byte-aligned records whose multi-byte
//! integers are big-endian. They are read and written with zerocopy.

use std::fmt;

use calt_common::hex::{packed_decimal_digits, to_hex};
use calt_common::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Error, Region, Result};

/// ALT file header (the consignment preamble).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct AltFileHeader {
    /// File type code, always `"CALT"`.
    pub type_code: [u8; 4],
    /// File protection method identifier.
    pub protection_method_id: u8,
    /// File structure method identifier.
    pub structure_method_id: u8,
    /// Consignment identifier (ASCII).
    pub consignment_id: [u8; 10],
    /// Issue year (binary, not BCD).
    pub issue_year: U16<BigEndian>,
    /// Issue month.
    pub issue_month: u8,
    /// Issue day.
    pub issue_day: u8,
    /// Issue hour.
    pub issue_hour: u8,
    /// Issue minute.
    pub issue_minute: u8,
    /// Issue second.
    pub issue_second: u8,
    /// Consignment file identifier (ASCII).
    pub consignment_file_id: [u8; 8],
    /// Issuer identifier (packed decimal).
    pub issuer_id: [u8; 4],
    /// Reserved for future use.
    pub reserved: [u8; 4],
    /// Numeric issuer identifier.
    pub issuer_numeric_id: U32<BigEndian>,
    /// Integrity hash over the consignment (SHA-1 sized).
    pub integrity_hash: [u8; 20],
    /// Number of templates in the consignment.
    pub template_count: U16<BigEndian>,
}

const _: () = assert!(std::mem::size_of::<AltFileHeader>() == AltFileHeader::SIZE);

impl AltFileHeader {
    /// The magic type code at the start of every ALT file.
    pub const MAGIC: &'static [u8; 4] = b"CALT";

    /// Size of the header in bytes.
    pub const SIZE: usize = 65;

    /// Check the magic and the issue date/time.
    ///
    /// `offset` is where the header starts in the file, for error reporting.
    pub fn validate(&self, offset: usize) -> Result<()> {
        let format = |reason: String| Error::Format {
            region: Region::FileHeader,
            offset,
            reason,
        };

        if &self.type_code != Self::MAGIC {
            return Err(format(format!(
                "expected type code 'CALT', got {:?}",
                String::from_utf8_lossy(&self.type_code)
            )));
        }

        let date = self.issue_date();
        if !(1..=12).contains(&date.month) || !(1..=31).contains(&date.day) {
            return Err(format(format!("impossible issue date {}", date)));
        }

        let time = self.issue_time();
        if time.hour > 23 || time.minute > 59 || time.second > 59 {
            return Err(format(format!("impossible issue time {}", time)));
        }

        Ok(())
    }

    /// The type code as text.
    pub fn type_code(&self) -> String {
        ascii(&self.type_code)
    }

    /// The consignment identifier as text.
    pub fn consignment_id(&self) -> String {
        ascii(&self.consignment_id)
    }

    /// The consignment file identifier as text.
    pub fn consignment_file_id(&self) -> String {
        ascii(&self.consignment_file_id)
    }

    /// The packed-decimal issuer identifier as its digit string.
    pub fn issuer_id(&self) -> String {
        packed_decimal_digits(&self.issuer_id)
    }

    /// The integrity hash as a hex string.
    pub fn integrity_hash_hex(&self) -> String {
        to_hex(&self.integrity_hash)
    }

    /// The issue date.
    pub fn issue_date(&self) -> IssueDate {
        IssueDate {
            year: self.issue_year.get(),
            month: self.issue_month,
            day: self.issue_day,
        }
    }

    /// The issue time.
    pub fn issue_time(&self) -> IssueTime {
        IssueTime {
            hour: self.issue_hour,
            minute: self.issue_minute,
            second: self.issue_second,
        }
    }
}

/// Binary issue date from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IssueDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl fmt::Display for IssueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Binary issue time from the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IssueTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl fmt::Display for IssueTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Template header describing one load-unit template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct TemplateHeader {
    /// Issuer template identifier.
    pub issuer_template_id: [u8; 8],
    /// Software product identifier.
    pub software_product_id: [u8; 8],
    /// Hash-modulus identifier.
    pub hash_modulus_id: U16<BigEndian>,
    /// Certificate serial number.
    pub certificate_serial: [u8; 3],
    /// Application provider public key set identifier.
    pub provider_key_set_id: u8,
    /// Issuer master key index.
    pub master_key_index: u8,
    /// Total length of the ALU data record.
    pub data_record_length: U32<BigEndian>,
    /// Length of one field descriptor record (always 8).
    pub field_record_length: U16<BigEndian>,
    /// Number of field descriptor records.
    pub field_record_count: U16<BigEndian>,
    /// Session data length.
    pub session_data_length: U16<BigEndian>,
}

const _: () = assert!(std::mem::size_of::<TemplateHeader>() == TemplateHeader::SIZE);

impl TemplateHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 33;

    /// Number of field descriptor records that follow the sections.
    pub fn field_count(&self) -> usize {
        self.field_record_count.get() as usize
    }

    /// Check that descriptor records have the expected size.
    pub fn validate(&self, offset: usize) -> Result<()> {
        let record_len = self.field_record_length.get() as usize;
        if self.field_count() > 0 && record_len != crate::descriptor::FieldDescriptor::SIZE {
            return Err(Error::Format {
                region: Region::TemplateHeader,
                offset,
                reason: format!(
                    "field record length is {}, expected {}",
                    record_len,
                    crate::descriptor::FieldDescriptor::SIZE
                ),
            });
        }
        Ok(())
    }

    /// Issuer template identifier as hex.
    pub fn issuer_template_id_hex(&self) -> String {
        to_hex(&self.issuer_template_id)
    }

    /// Software product identifier as hex.
    pub fn software_product_id_hex(&self) -> String {
        to_hex(&self.software_product_id)
    }

    /// Certificate serial number as hex.
    pub fn certificate_serial_hex(&self) -> String {
        to_hex(&self.certificate_serial)
    }
}

/// Decode fixed-width ASCII, dropping trailing NUL and space padding.
fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(&['\0', ' '][..])
        .to_string()
}
