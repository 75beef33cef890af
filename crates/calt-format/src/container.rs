//! ALT template container reading and writing.

use std::fs;
use std::path::Path;

use calt_common::BinaryReader;
use log::{debug, trace};
use zerocopy::{FromBytes, IntoBytes};

use crate::descriptor::{DataCategory, FieldDescriptor};
use crate::header::{AltFileHeader, TemplateHeader};
use crate::layout::SectionLengths;
use crate::{Error, Region, Result};

/// Size of the MCD number between the template header and the sections.
pub const MCD_SIZE: usize = 8;

/// Size of the reserved trailer between the FCI section and the descriptors.
pub const PADDING_SIZE: usize = 4;

/// The four variable-length sections of a template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataSections {
    code: Vec<u8>,
    data: Vec<u8>,
    dir: Vec<u8>,
    fci: Vec<u8>,
}

impl DataSections {
    /// Create sections from owned buffers.
    ///
    /// Each section is length-prefixed with a u16, so none may exceed 65535 bytes.
    pub fn new(code: Vec<u8>, data: Vec<u8>, dir: Vec<u8>, fci: Vec<u8>) -> Result<Self> {
        for (region, section) in [
            (Region::CodeSection, &code),
            (Region::DataSection, &data),
            (Region::DirSection, &dir),
            (Region::FciSection, &fci),
        ] {
            if section.len() > u16::MAX as usize {
                return Err(Error::Range {
                    region,
                    offset: 0,
                    declared: section.len(),
                    buffer_len: u16::MAX as usize,
                });
            }
        }
        Ok(Self {
            code,
            data,
            dir,
            fci,
        })
    }

    /// The code section.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The data section.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The directory section.
    pub fn dir(&self) -> &[u8] {
        &self.dir
    }

    /// The FCI section.
    pub fn fci(&self) -> &[u8] {
        &self.fci
    }

    /// The section a field of the given category lives in.
    pub fn by_category(&self, category: DataCategory) -> &[u8] {
        match category {
            DataCategory::Application => &self.data,
            DataCategory::Fci => &self.fci,
        }
    }

    /// All four sections with their region names, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (Region, &[u8])> {
        [
            (Region::CodeSection, self.code.as_slice()),
            (Region::DataSection, self.data.as_slice()),
            (Region::DirSection, self.dir.as_slice()),
            (Region::FciSection, self.fci.as_slice()),
        ]
        .into_iter()
    }

    /// Section lengths for layout computation.
    pub fn lengths(&self) -> SectionLengths {
        // new() and the parser both bound every section to u16
        SectionLengths {
            code: self.code.len() as u16,
            data: self.data.len() as u16,
            dir: self.dir.len() as u16,
            fci: self.fci.len() as u16,
        }
    }
}

/// A decoded ALT template file.
///
/// # Example
///
/// ```no_run
/// use calt_format::AltFile;
///
/// let alt = AltFile::open("template.alt")?;
/// println!("Consignment: {}", alt.file_header().consignment_id());
/// for descriptor in alt.descriptors() {
///     println!("{} at {}", descriptor.tag_hex(), descriptor.address_hex());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct AltFile {
    file_header: AltFileHeader,
    template_header: TemplateHeader,
    mcd: [u8; MCD_SIZE],
    sections: DataSections,
    padding: [u8; PADDING_SIZE],
    descriptors: Vec<FieldDescriptor>,
}

impl AltFile {
    /// Assemble a template from its parts.
    ///
    /// The template header's descriptor count and record length are set from
    /// `descriptors`. The count is a u16, so at most 65535 descriptors fit.
    pub fn new(
        file_header: AltFileHeader,
        mut template_header: TemplateHeader,
        mcd: [u8; MCD_SIZE],
        sections: DataSections,
        descriptors: Vec<FieldDescriptor>,
    ) -> Result<Self> {
        let count = u16::try_from(descriptors.len()).map_err(|_| Error::Range {
            region: Region::FieldDescriptors,
            offset: AltFileHeader::SIZE + TemplateHeader::SIZE,
            declared: descriptors.len(),
            buffer_len: u16::MAX as usize,
        })?;
        template_header.field_record_count.set(count);
        template_header
            .field_record_length
            .set(FieldDescriptor::SIZE as u16);

        Ok(Self {
            file_header,
            template_header,
            mcd,
            sections,
            padding: [0; PADDING_SIZE],
            descriptors,
        })
    }

    /// Read and decode an ALT file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading ALT file {}", path.display());
        let data = fs::read(path)?;
        Self::parse(&data)
    }

    /// Decode an ALT file from bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);

        let file_header: AltFileHeader = read_fixed(&mut reader, Region::FileHeader)?;
        file_header.validate(0)?;

        let template_offset = reader.position();
        let template_header: TemplateHeader = read_fixed(&mut reader, Region::TemplateHeader)?;
        template_header.validate(template_offset)?;
        debug!(
            "Template {} declares {} field descriptors",
            template_header.issuer_template_id_hex(),
            template_header.field_count()
        );

        let mcd = checked_read(&mut reader, MCD_SIZE, Region::Mcd, |r| {
            r.read_array::<MCD_SIZE>()
        })?;
        trace!("MCD number: {:02X?}", mcd);

        let code = read_section(&mut reader, Region::CodeSection)?;
        let section_data = read_section(&mut reader, Region::DataSection)?;
        let dir = read_section(&mut reader, Region::DirSection)?;
        let fci = read_section(&mut reader, Region::FciSection)?;

        let mut padding = [0u8; PADDING_SIZE];
        padding.copy_from_slice(take(&mut reader, PADDING_SIZE, Region::Padding)?);

        let count = template_header.field_count();
        let descriptors = if count > 0 {
            let bytes = take(&mut reader, count * FieldDescriptor::SIZE, Region::FieldDescriptors)?;
            trace!("First field descriptor: {:02X?}", &bytes[..FieldDescriptor::SIZE]);
            FieldDescriptor::decode_all(bytes)
        } else {
            Vec::new()
        };

        if !reader.is_empty() {
            debug!(
                "Ignoring {} trailing bytes after field descriptors at offset {}",
                reader.remaining(),
                reader.position()
            );
        }

        Ok(Self {
            file_header,
            template_header,
            mcd,
            sections: DataSections {
                code,
                data: section_data,
                dir,
                fci,
            },
            padding,
            descriptors,
        })
    }

    /// The file header.
    pub fn file_header(&self) -> &AltFileHeader {
        &self.file_header
    }

    /// The template header.
    pub fn template_header(&self) -> &TemplateHeader {
        &self.template_header
    }

    /// The MCD number stored after the template header.
    pub fn mcd(&self) -> &[u8; MCD_SIZE] {
        &self.mcd
    }

    /// The four data sections.
    pub fn sections(&self) -> &DataSections {
        &self.sections
    }

    /// The reserved bytes between the FCI section and the descriptors.
    pub fn padding(&self) -> &[u8; PADDING_SIZE] {
        &self.padding
    }

    /// The decoded field descriptors.
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// Descriptors for fields written into the ALU.
    pub fn load_unit_descriptors(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().filter(|d| d.is_load_unit_bound())
    }

    /// Serialize back into ALT bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let sections_len: usize = self.sections.iter().map(|(_, s)| 2 + s.len()).sum();
        let mut output = Vec::with_capacity(
            AltFileHeader::SIZE
                + TemplateHeader::SIZE
                + MCD_SIZE
                + sections_len
                + PADDING_SIZE
                + self.descriptors.len() * FieldDescriptor::SIZE,
        );

        output.extend_from_slice(self.file_header.as_bytes());
        output.extend_from_slice(self.template_header.as_bytes());
        output.extend_from_slice(&self.mcd);
        for (_, section) in self.sections.iter() {
            output.extend_from_slice(&(section.len() as u16).to_be_bytes());
            output.extend_from_slice(section);
        }
        output.extend_from_slice(&self.padding);
        for descriptor in &self.descriptors {
            output.extend_from_slice(&descriptor.raw);
        }

        output
    }
}

/// Run a `len`-byte read belonging to `region` with region-aware errors.
///
/// A length larger than the whole buffer is a range error; one that merely
/// runs past the bytes left is a truncation.
fn checked_read<'a, T>(
    reader: &mut BinaryReader<'a>,
    len: usize,
    region: Region,
    read: impl FnOnce(&mut BinaryReader<'a>) -> calt_common::Result<T>,
) -> Result<T> {
    let offset = reader.position();
    if len > reader.len() {
        return Err(Error::Range {
            region,
            offset,
            declared: len,
            buffer_len: reader.len(),
        });
    }

    let available = reader.remaining();
    read(reader).map_err(|_| Error::Truncated {
        region,
        offset,
        needed: len,
        available,
    })
}

/// Read exactly `len` bytes belonging to `region`.
fn take<'a>(reader: &mut BinaryReader<'a>, len: usize, region: Region) -> Result<&'a [u8]> {
    checked_read(reader, len, region, |r| r.read_bytes(len))
}

/// Read a fixed-size header struct.
fn read_fixed<T: FromBytes>(reader: &mut BinaryReader<'_>, region: Region) -> Result<T> {
    checked_read(reader, std::mem::size_of::<T>(), region, |r| r.read_struct())
}

/// Read a u16 length prefix followed by that many bytes.
fn read_section(reader: &mut BinaryReader<'_>, region: Region) -> Result<Vec<u8>> {
    let len = checked_read(reader, 2, region, |r| r.read_u16())? as usize;

    debug!("{} at offset {}: {} bytes", region, reader.position(), len);

    take(reader, len, region).map(<[u8]>::to_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::AltFixture;

    #[test]
    fn test_parse_fixture() {
        let fixture = AltFixture::standard();
        let bytes = fixture.to_bytes();
        let alt = AltFile::parse(&bytes).unwrap();

        assert_eq!(alt.file_header().type_code(), "CALT");
        assert_eq!(alt.template_header().field_count(), 2);
        assert_eq!(alt.sections().code().len(), 100);
        assert_eq!(alt.sections().data().len(), 50);
        assert_eq!(alt.sections().dir().len(), 20);
        assert_eq!(alt.sections().fci().len(), 30);
        assert_eq!(alt.descriptors().len(), 2);
        assert_eq!(alt.sections().data(), fixture.data.as_slice());
    }

    #[test]
    fn test_sections_start_after_headers() {
        let bytes = AltFixture::standard().to_bytes();
        // 65 + 33 header bytes, then the 8-byte MCD, then the code length prefix
        assert_eq!(&bytes[98..106], &[0u8; MCD_SIZE]);
        assert_eq!(&bytes[106..108], &[0x00, 100]);
    }

    #[test]
    fn test_parse_with_nonzero_mcd() {
        let mut fixture = AltFixture::standard();
        fixture.mcd = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        let bytes = fixture.to_bytes();
        let alt = AltFile::parse(&bytes).unwrap();

        assert_eq!(alt.mcd(), &fixture.mcd);
        assert_eq!(alt.sections().code(), fixture.code.as_slice());
        assert_eq!(alt.sections().data(), fixture.data.as_slice());
        assert_eq!(alt.sections().dir(), fixture.dir.as_slice());
        assert_eq!(alt.sections().fci(), fixture.fci.as_slice());
        assert_eq!(alt.descriptors()[1].tag_hex(), "5F20");
        assert_eq!(alt.to_bytes(), bytes);
    }

    #[test]
    fn test_truncated_mcd() {
        let bytes = AltFixture::standard().to_bytes();
        assert!(matches!(
            AltFile::parse(&bytes[..102]),
            Err(Error::Truncated {
                region: Region::Mcd,
                offset: 98,
                needed: 8,
                available: 4,
            })
        ));
    }

    #[test]
    fn test_alt_round_trip_is_byte_identical() {
        let bytes = AltFixture::standard().to_bytes();
        let alt = AltFile::parse(&bytes).unwrap();
        assert_eq!(alt.to_bytes(), bytes);
    }

    #[test]
    fn test_descriptor_decoding_in_file() {
        let alt = AltFile::parse(&AltFixture::standard().to_bytes()).unwrap();
        let descriptors = alt.descriptors();

        assert_eq!(descriptors[0].tag_hex(), "005A");
        assert_eq!(descriptors[0].category, DataCategory::Application);
        assert_eq!(descriptors[1].tag_hex(), "5F20");
        assert_eq!(descriptors[1].category, DataCategory::Fci);
        assert_eq!(alt.load_unit_descriptors().count(), 2);
    }

    #[test]
    fn test_truncated_code_section() {
        let fixture = AltFixture::with_lengths(50, 10, 4, 4);
        let bytes = fixture.to_bytes();
        // Keep the length prefix and the first 40 of 50 code bytes
        let cut = &bytes[..AltFixture::SECTIONS_OFFSET + 2 + 40];

        match AltFile::parse(cut) {
            Err(Error::Truncated {
                region,
                offset,
                needed,
                available,
            }) => {
                assert_eq!(region, Region::CodeSection);
                assert_eq!(offset, AltFixture::SECTIONS_OFFSET + 2);
                assert_eq!(needed, 50);
                assert_eq!(available, 40);
            }
            other => panic!("expected truncated code section, got {:?}", other),
        }
        let message = AltFile::parse(cut).unwrap_err().to_string();
        assert!(message.contains("code section"));
    }

    #[test]
    fn test_section_length_beyond_buffer_is_range_error() {
        let mut bytes = AltFixture::with_lengths(4, 4, 4, 4).to_bytes();
        let at = AltFixture::SECTIONS_OFFSET;
        bytes[at..at + 2].copy_from_slice(&0xFFFFu16.to_be_bytes());

        assert!(matches!(
            AltFile::parse(&bytes),
            Err(Error::Range {
                region: Region::CodeSection,
                declared: 0xFFFF,
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_descriptors() {
        let bytes = AltFixture::standard().to_bytes();
        let cut = &bytes[..bytes.len() - 3];

        assert!(matches!(
            AltFile::parse(cut),
            Err(Error::Truncated {
                region: Region::FieldDescriptors,
                needed: 16,
                available: 13,
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_file_header() {
        let bytes = AltFixture::standard().to_bytes();
        assert!(matches!(
            AltFile::parse(&bytes[..40]),
            Err(Error::Range {
                region: Region::FileHeader,
                ..
            })
        ));
        assert!(matches!(
            AltFile::parse(&bytes[..80]),
            Err(Error::Truncated {
                region: Region::TemplateHeader,
                offset: 65,
                ..
            })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = AltFixture::standard().to_bytes();
        bytes[..4].copy_from_slice(b"XALT");
        assert!(matches!(
            AltFile::parse(&bytes),
            Err(Error::Format {
                region: Region::FileHeader,
                offset: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_no_descriptors() {
        let mut fixture = AltFixture::standard();
        fixture.descriptors.clear();
        let alt = AltFile::parse(&fixture.to_bytes()).unwrap();
        assert!(alt.descriptors().is_empty());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = AltFixture::standard().to_bytes();
        bytes.extend_from_slice(&[0xEE; 5]);
        let alt = AltFile::parse(&bytes).unwrap();
        assert_eq!(alt.descriptors().len(), 2);
    }

    #[test]
    fn test_new_sets_descriptor_count() {
        let parsed = AltFile::parse(&AltFixture::standard().to_bytes()).unwrap();
        let mut template = *parsed.template_header();
        template.field_record_count.set(0);

        let alt = AltFile::new(
            *parsed.file_header(),
            template,
            *parsed.mcd(),
            parsed.sections().clone(),
            parsed.descriptors().to_vec(),
        )
        .unwrap();
        assert_eq!(alt.template_header().field_count(), 2);
        assert_eq!(alt.to_bytes(), parsed.to_bytes());
    }

    #[test]
    fn test_new_rejects_descriptor_count_overflow() {
        let parsed = AltFile::parse(&AltFixture::standard().to_bytes()).unwrap();
        let descriptors = FieldDescriptor::decode_all(&vec![0u8; 0x1_0000 * FieldDescriptor::SIZE]);
        assert_eq!(descriptors.len(), 0x1_0000);

        let err = AltFile::new(
            *parsed.file_header(),
            *parsed.template_header(),
            [0; MCD_SIZE],
            parsed.sections().clone(),
            descriptors,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Range {
                region: Region::FieldDescriptors,
                declared: 0x1_0000,
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_section_rejected() {
        let err = DataSections::new(vec![0; 0x1_0000], vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::Range { region: Region::CodeSection, .. }));
    }
}
