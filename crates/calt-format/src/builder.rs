//! ALU image assembly.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace};

use crate::container::DataSections;
use crate::descriptor::{DataFormat, FieldDescriptor};
use crate::layout::AluLayout;
use crate::locate::ResolvedField;
use crate::{tlv, Error, FieldFailure, Result};

/// Builds an ALU image from template sections and personalized values.
///
/// The image is allocated once at its final size. Every write goes to a
/// contiguous range inside the data or FCI section, so a field either lands
/// whole or not at all.
#[derive(Debug, Clone)]
pub struct AluBuilder {
    layout: AluLayout,
    buffer: Vec<u8>,
}

impl AluBuilder {
    /// Create an image laid out for `sections`, with the template contents copied in.
    pub fn new(sections: &DataSections) -> Self {
        let layout = AluLayout::new(sections.lengths());
        let mut buffer = vec![0u8; layout.total_size];

        for ((_, slot), (_, section)) in layout.slots().into_iter().zip(sections.iter()) {
            BigEndian::write_u16(
                &mut buffer[slot.length_offset..slot.start],
                slot.len as u16,
            );
            buffer[slot.range()].copy_from_slice(section);
        }

        debug!(
            "ALU image of {} bytes (code {}, data {}, dir {}, fci {})",
            layout.total_size, layout.code.len, layout.data.len, layout.dir.len, layout.fci.len
        );

        Self { layout, buffer }
    }

    /// The image layout.
    pub fn layout(&self) -> AluLayout {
        self.layout
    }

    /// The image as built so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the builder and return the image.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write one field's replacement value into the image.
    ///
    /// Raw values must have exactly the descriptor length. TLV values are
    /// re-encoded behind the original tag octets and the resulting entry must
    /// occupy the same number of bytes as the one it replaces. The tag octets
    /// are never written; a write that disturbs them is undone and reported
    /// as [`Error::TagMismatch`].
    pub fn apply_field(
        &mut self,
        descriptor: &FieldDescriptor,
        resolved: &ResolvedField,
        replacement: &[u8],
    ) -> Result<()> {
        match resolved.format {
            DataFormat::Raw => self.apply_raw(descriptor, resolved, replacement),
            DataFormat::Tlv => self.apply_tlv(descriptor, resolved, replacement),
        }
    }

    /// Write several fields, collecting the ones that failed.
    ///
    /// A failed field leaves its bytes untouched; the others are still written.
    pub fn apply_fields<'f, I>(&mut self, fields: I) -> Vec<FieldFailure>
    where
        I: IntoIterator<Item = (&'f FieldDescriptor, &'f ResolvedField, &'f [u8])>,
    {
        fields
            .into_iter()
            .filter_map(|(descriptor, resolved, replacement)| {
                self.apply_field(descriptor, resolved, replacement)
                    .err()
                    .map(|error| FieldFailure {
                        index: descriptor.index,
                        tag: descriptor.tag_hex(),
                        error,
                    })
            })
            .collect()
    }

    fn apply_raw(
        &mut self,
        descriptor: &FieldDescriptor,
        resolved: &ResolvedField,
        replacement: &[u8],
    ) -> Result<()> {
        if replacement.len() != resolved.value_length {
            return Err(Error::LengthMismatch {
                tag: descriptor.tag_hex(),
                expected: resolved.value_length,
                actual: replacement.len(),
            });
        }

        let start = self.absolute(resolved, resolved.value_offset, replacement.len())?;
        self.buffer[start..start + replacement.len()].copy_from_slice(replacement);
        trace!(
            "Wrote {} raw bytes for {} at {}",
            replacement.len(),
            descriptor.tag_hex(),
            start
        );
        Ok(())
    }

    fn apply_tlv(
        &mut self,
        descriptor: &FieldDescriptor,
        resolved: &ResolvedField,
        replacement: &[u8],
    ) -> Result<()> {
        let length_octets = tlv::encode_length(replacement.len())?;
        let span = resolved.tag_width + length_octets.len() + replacement.len();
        if span != resolved.span() {
            return Err(Error::SpanChanged {
                tag: descriptor.tag_hex(),
                original: resolved.span(),
                replacement: span,
            });
        }

        let start = self.absolute(resolved, resolved.address, span)?;
        let tag_range = start..start + resolved.tag_width;
        let tag = self.buffer[tag_range.clone()].to_vec();

        let value_start = self.absolute(resolved, resolved.value_offset, replacement.len())?;
        let write_range = value_start - length_octets.len()..value_start + replacement.len();
        let previous = self.buffer[write_range.clone()].to_vec();

        self.buffer[write_range.start..value_start].copy_from_slice(&length_octets);
        self.buffer[value_start..write_range.end].copy_from_slice(replacement);

        if self.buffer[tag_range.clone()] != tag[..] {
            let actual = self.buffer[tag_range].to_vec();
            self.buffer[write_range].copy_from_slice(&previous);
            return Err(Error::TagMismatch {
                offset: start,
                expected: tag,
                actual,
            });
        }

        trace!(
            "Wrote {}-byte TLV entry for {} at {}",
            span,
            descriptor.tag_hex(),
            start
        );
        Ok(())
    }

    /// Convert a section-relative range to an absolute image offset.
    fn absolute(&self, resolved: &ResolvedField, offset: usize, length: usize) -> Result<usize> {
        let slot = self.layout.slot(resolved.category);
        if offset + length > slot.len {
            return Err(Error::Bounds {
                region: resolved.category.region(),
                offset,
                length,
                limit: slot.len,
            });
        }
        Ok(slot.start + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::locate;

    fn descriptor(hex: &str) -> FieldDescriptor {
        let bytes = hex::decode(hex).unwrap();
        FieldDescriptor::decode(0, bytes.try_into().unwrap())
    }

    fn sections() -> DataSections {
        let mut data = vec![0u8; 50];
        data[10..18].copy_from_slice(&[0xFF; 8]);
        let mut fci = vec![0u8; 30];
        // 5F20 03 "XYZ" at offset 4
        fci[4..10].copy_from_slice(&[0x5F, 0x20, 0x03, b'X', b'Y', b'Z']);
        DataSections::new(vec![0xC0; 100], data, vec![0xD1; 20], fci).unwrap()
    }

    #[test]
    fn test_template_copied_into_image() {
        let sections = sections();
        let builder = AluBuilder::new(&sections);
        let image = builder.as_bytes();
        let layout = builder.layout();

        assert_eq!(image.len(), 220);
        assert_eq!(&image[layout.mcd()], &[0u8; 8]);
        assert_eq!(&image[8..10], &[0x00, 100]);
        assert_eq!(&image[layout.code.range()], sections.code());
        assert_eq!(&image[110..112], &[0x00, 50]);
        assert_eq!(&image[layout.dir.range()], sections.dir());
        assert_eq!(&image[layout.fci.range()], sections.fci());
        assert_eq!(&image[216..220], &[0u8; 4]);
    }

    #[test]
    fn test_raw_write() {
        let sections = sections();
        let field = descriptor("0000005A0008000A");
        let resolved = locate(&field, sections.data()).unwrap();
        let mut builder = AluBuilder::new(&sections);

        let pan = hex::decode("4111111111111111").unwrap();
        builder.apply_field(&field, &resolved, &pan).unwrap();

        let start = builder.layout().data.start + 10;
        assert_eq!(&builder.as_bytes()[start..start + 8], pan.as_slice());
    }

    #[test]
    fn test_raw_length_mismatch_leaves_image_untouched() {
        let sections = sections();
        let field = descriptor("0000005A0008000A");
        let resolved = locate(&field, sections.data()).unwrap();
        let mut builder = AluBuilder::new(&sections);
        let before = builder.as_bytes().to_vec();

        let err = builder
            .apply_field(&field, &resolved, &[0x41; 7])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                expected: 8,
                actual: 7,
                ..
            }
        ));
        assert_eq!(builder.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_tlv_write_preserves_tag() {
        let sections = sections();
        let field = descriptor("00885F2000030004");
        let resolved = locate(&field, sections.fci()).unwrap();
        let mut builder = AluBuilder::new(&sections);

        builder.apply_field(&field, &resolved, b"ABC").unwrap();

        let start = builder.layout().fci.start + 4;
        assert_eq!(
            &builder.as_bytes()[start..start + 6],
            &[0x5F, 0x20, 0x03, b'A', b'B', b'C']
        );
    }

    #[test]
    fn test_tlv_span_change_rejected() {
        let sections = sections();
        let field = descriptor("00885F2000030004");
        let resolved = locate(&field, sections.fci()).unwrap();
        let mut builder = AluBuilder::new(&sections);
        let before = builder.as_bytes().to_vec();

        let err = builder.apply_field(&field, &resolved, b"ABCD").unwrap_err();
        assert!(matches!(
            err,
            Error::SpanChanged {
                original: 6,
                replacement: 7,
                ..
            }
        ));
        assert_eq!(builder.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_apply_fields_collects_failures() {
        let sections = sections();
        let raw = descriptor("0000005A0008000A");
        let tlv = FieldDescriptor::decode(1, [0x00, 0x88, 0x5F, 0x20, 0x00, 0x03, 0x00, 0x04]);
        let raw_resolved = locate(&raw, sections.data()).unwrap();
        let tlv_resolved = locate(&tlv, sections.fci()).unwrap();
        let mut builder = AluBuilder::new(&sections);

        let short = [0u8; 4];
        let failures = builder.apply_fields([
            (&raw, &raw_resolved, &short[..]),
            (&tlv, &tlv_resolved, &b"DEF"[..]),
        ]);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 0);
        assert_eq!(failures[0].tag, "005A");
        let start = builder.layout().fci.start + 7;
        assert_eq!(&builder.as_bytes()[start..start + 3], b"DEF");
    }

    #[test]
    fn test_tlv_one_octet_tag_short_form() {
        let mut data = vec![0u8; 50];
        data[19] = 0x11;
        data[20..24].copy_from_slice(&[0x5A, 0x02, 0xAA, 0xBB]);
        data[24] = 0x22;
        let sections = DataSections::new(vec![0xC0; 100], data, vec![0xD1; 20], vec![0; 30]).unwrap();
        // TLV, application, tag 005A, length 2, address 20
        let field = descriptor("0080005A00020014");
        let resolved = locate(&field, sections.data()).unwrap();
        assert_eq!(resolved.tag_width, 1);
        let mut builder = AluBuilder::new(&sections);

        builder.apply_field(&field, &resolved, &[0x12, 0x34]).unwrap();

        let start = builder.layout().data.start + 19;
        assert_eq!(
            &builder.as_bytes()[start..start + 6],
            &[0x11, 0x5A, 0x02, 0x12, 0x34, 0x22]
        );
    }

    #[test]
    fn test_tlv_long_form_length_rewritten_in_place() {
        let mut fci = vec![0u8; 160];
        fci[1] = 0x11;
        fci[2..6].copy_from_slice(&[0xBF, 0x0C, 0x81, 0x90]);
        fci[150] = 0x22;
        let sections = DataSections::new(vec![0xC0; 10], vec![0; 10], vec![0; 10], fci).unwrap();
        // TLV, FCI, tag BF0C, length 0x90, address 2
        let field = descriptor("0088BF0C00900002");
        let resolved = locate(&field, sections.fci()).unwrap();
        assert_eq!(resolved.length_octets, 2);
        assert_eq!(resolved.value_length, 0x90);
        let mut builder = AluBuilder::new(&sections);

        builder.apply_field(&field, &resolved, &[0xA5; 0x90]).unwrap();

        let fci_start = builder.layout().fci.start;
        let image = builder.as_bytes();
        assert_eq!(image[fci_start + 1], 0x11);
        assert_eq!(&image[fci_start + 2..fci_start + 6], &[0xBF, 0x0C, 0x81, 0x90]);
        assert!(image[fci_start + 6..fci_start + 150].iter().all(|&b| b == 0xA5));
        assert_eq!(image[fci_start + 150], 0x22);

        // A 127-byte value would drop to a short-form length and shrink the entry
        let err = builder.apply_field(&field, &resolved, &[0x5A; 127]).unwrap_err();
        assert!(matches!(
            err,
            Error::SpanChanged {
                original: 148,
                replacement: 130,
                ..
            }
        ));
    }

    #[test]
    fn test_tlv_write_over_tag_is_undone() {
        let sections = sections();
        let field = descriptor("00885F2000030004");
        let mut resolved = locate(&field, sections.fci()).unwrap();
        // Value offset one byte early puts the length octet on the tag's second byte
        resolved.value_offset -= 1;
        let mut builder = AluBuilder::new(&sections);
        let before = builder.as_bytes().to_vec();

        let err = builder.apply_field(&field, &resolved, b"ABC").unwrap_err();
        match err {
            Error::TagMismatch {
                offset,
                expected,
                actual,
            } => {
                assert_eq!(offset, builder.layout().fci.start + 4);
                assert_eq!(expected, vec![0x5F, 0x20]);
                assert_eq!(actual, vec![0x5F, 0x03]);
            }
            other => panic!("expected tag mismatch, got {:?}", other),
        }
        assert_eq!(builder.as_bytes(), before.as_slice());
    }
}
