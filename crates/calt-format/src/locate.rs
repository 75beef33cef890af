//! Field location within the data and FCI sections.

use std::ops::Range;

use log::warn;

use crate::descriptor::{DataCategory, DataFormat, FieldDescriptor};
use crate::{tlv, Error, Result};

/// Where a field's bytes sit inside its section.
///
/// All offsets are relative to the start of the section named by `category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResolvedField {
    pub category: DataCategory,
    pub format: DataFormat,
    /// Offset of the first byte of the entry (the tag for TLV fields).
    pub address: usize,
    /// Tag octets before the length; zero for raw fields.
    pub tag_width: usize,
    /// Length octets before the value; zero for raw fields.
    pub length_octets: usize,
    pub value_offset: usize,
    pub value_length: usize,
}

impl ResolvedField {
    /// Byte range of the value.
    pub fn value_range(&self) -> Range<usize> {
        self.value_offset..self.value_offset + self.value_length
    }

    /// Total bytes the entry occupies, including tag and length octets.
    pub fn span(&self) -> usize {
        self.tag_width + self.length_octets + self.value_length
    }

    /// Byte range of the whole entry.
    pub fn entry_range(&self) -> Range<usize> {
        self.address..self.address + self.span()
    }

    /// The field's current value in `section`.
    pub fn value<'a>(&self, section: &'a [u8]) -> Option<&'a [u8]> {
        section.get(self.value_range())
    }
}

/// Locate a field's value inside `section`.
///
/// Raw fields take their length from the descriptor. TLV fields skip the tag
/// octets and take their length from the BER length that follows.
pub fn locate(descriptor: &FieldDescriptor, section: &[u8]) -> Result<ResolvedField> {
    let region = descriptor.category.region();
    let address = descriptor.address as usize;
    let check = |offset: usize, length: usize| {
        if offset + length > section.len() {
            Err(Error::Bounds {
                region,
                offset,
                length,
                limit: section.len(),
            })
        } else {
            Ok(())
        }
    };

    match descriptor.format {
        DataFormat::Raw => {
            let length = descriptor.length as usize;
            check(address, length)?;
            Ok(ResolvedField {
                category: descriptor.category,
                format: DataFormat::Raw,
                address,
                tag_width: 0,
                length_octets: 0,
                value_offset: address,
                value_length: length,
            })
        }
        DataFormat::Tlv => {
            let tag_width = descriptor.tag_width();
            check(address, tag_width)?;

            let tag_bytes = descriptor.tag.to_be_bytes();
            let expected = &tag_bytes[2 - tag_width..];
            let found = &section[address..address + tag_width];
            if found != expected {
                warn!(
                    "Field {} at {} in {}: section holds tag {:02X?}",
                    descriptor.tag_hex(),
                    address,
                    region,
                    found
                );
            }

            let (value_length, length_octets) = tlv::read_length(section, address + tag_width)?;
            let value_offset = address + tag_width + length_octets;
            check(value_offset, value_length)?;

            Ok(ResolvedField {
                category: descriptor.category,
                format: DataFormat::Tlv,
                address,
                tag_width,
                length_octets,
                value_offset,
                value_length,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Region;

    fn descriptor(hex: &str) -> FieldDescriptor {
        let bytes = hex::decode(hex).unwrap();
        FieldDescriptor::decode(0, bytes.try_into().unwrap())
    }

    #[test]
    fn test_raw_field() {
        // raw, application, tag 005A, length 8, address 4
        let field = descriptor("0000005A00080004");
        let section = [0u8; 20];
        let resolved = locate(&field, &section).unwrap();

        assert_eq!(resolved.format, DataFormat::Raw);
        assert_eq!(resolved.value_offset, 4);
        assert_eq!(resolved.value_length, 8);
        assert_eq!(resolved.span(), 8);
    }

    #[test]
    fn test_raw_field_out_of_bounds() {
        let field = descriptor("0000005A0008000A");
        let section = [0u8; 16];
        assert!(matches!(
            locate(&field, &section),
            Err(Error::Bounds {
                region: Region::DataSection,
                offset: 10,
                length: 8,
                limit: 16,
            })
        ));
    }

    #[test]
    fn test_tlv_two_byte_tag() {
        // TLV, FCI, tag 5F20 at address 2
        let field = descriptor("00885F2000050002");
        let section = hex::decode("AAAA5F2003414243BB").unwrap();
        let resolved = locate(&field, &section).unwrap();

        assert_eq!(resolved.category, DataCategory::Fci);
        assert_eq!(resolved.tag_width, 2);
        assert_eq!(resolved.length_octets, 1);
        assert_eq!(resolved.value_offset, 5);
        assert_eq!(resolved.value_length, 3);
        assert_eq!(resolved.value(&section).unwrap(), b"ABC");
        assert_eq!(resolved.entry_range(), 2..8);
    }

    #[test]
    fn test_tlv_one_byte_tag_long_length() {
        let field = descriptor("0080005A00000000");
        let mut section = vec![0x5A, 0x81, 0x90];
        section.extend(std::iter::repeat(0x11).take(0x90));
        let resolved = locate(&field, &section).unwrap();

        assert_eq!(resolved.tag_width, 1);
        assert_eq!(resolved.length_octets, 2);
        assert_eq!(resolved.value_offset, 3);
        assert_eq!(resolved.value_length, 0x90);
    }

    #[test]
    fn test_tlv_value_past_section() {
        let field = descriptor("0080005A00000000");
        let section = hex::decode("5A0A0102").unwrap();
        assert!(matches!(
            locate(&field, &section),
            Err(Error::Bounds { offset: 2, length: 10, limit: 4, .. })
        ));
    }

    #[test]
    fn test_tlv_indefinite_length() {
        let field = descriptor("0080005A00000000");
        let section = hex::decode("5A80").unwrap();
        assert!(matches!(
            locate(&field, &section),
            Err(Error::MalformedLength { offset: 1, .. })
        ));
    }

    #[test]
    fn test_tlv_tag_past_section() {
        let field = descriptor("00885F2000000003");
        let section = [0u8; 4];
        assert!(matches!(locate(&field, &section), Err(Error::Bounds { .. })));
    }

    #[test]
    fn test_tag_mismatch_still_locates() {
        let field = descriptor("0080005A00000000");
        let section = hex::decode("57020102").unwrap();
        let resolved = locate(&field, &section).unwrap();
        assert_eq!(resolved.value_length, 2);
    }
}
