//! Synthetic ALT containers for tests.

use calt_common::{U16, U32};
use zerocopy::IntoBytes;

use crate::container::MCD_SIZE;
use crate::header::{AltFileHeader, TemplateHeader};

/// Raw descriptor: external source, ALU-bound, tag 005A, 8 bytes at data+10.
pub const PAN_DESCRIPTOR: [u8; 8] = [0x00, 0x00, 0x00, 0x5A, 0x00, 0x08, 0x00, 0x0A];
/// TLV descriptor: system source, ALU-bound, FCI, tag 5F20 at fci+4.
pub const NAME_DESCRIPTOR: [u8; 8] = [0x80, 0x88, 0x5F, 0x20, 0x00, 0x03, 0x00, 0x04];

/// Builds ALT bytes field by field, independently of the writer under test.
pub struct AltFixture {
    pub file_header: AltFileHeader,
    pub template_header: TemplateHeader,
    pub mcd: [u8; MCD_SIZE],
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub dir: Vec<u8>,
    pub fci: Vec<u8>,
    pub padding: [u8; 4],
    pub descriptors: Vec<[u8; 8]>,
}

impl AltFixture {
    /// Offset of the code section length prefix.
    pub const SECTIONS_OFFSET: usize = AltFileHeader::SIZE + TemplateHeader::SIZE + MCD_SIZE;

    /// Sections of 100/50/20/30 bytes with a raw PAN in data and a TLV name in FCI.
    pub fn standard() -> Self {
        let mut fixture = Self::with_lengths(100, 50, 20, 30);
        fixture.data[10..18].copy_from_slice(&[0xFF; 8]);
        fixture.fci[4..10].copy_from_slice(&[0x5F, 0x20, 0x03, b'X', b'Y', b'Z']);
        fixture
    }

    /// Sections of the given lengths filled with a per-section byte pattern.
    pub fn with_lengths(code: usize, data: usize, dir: usize, fci: usize) -> Self {
        Self {
            file_header: file_header(),
            template_header: template_header(),
            mcd: [0; MCD_SIZE],
            code: pattern(0xC0, code),
            data: pattern(0xD0, data),
            dir: pattern(0xE0, dir),
            fci: pattern(0xF0, fci),
            padding: [0; 4],
            descriptors: vec![PAN_DESCRIPTOR, NAME_DESCRIPTOR],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut template = self.template_header;
        template.field_record_count = U16::new(self.descriptors.len() as u16);

        let mut out = Vec::new();
        out.extend_from_slice(self.file_header.as_bytes());
        out.extend_from_slice(template.as_bytes());
        out.extend_from_slice(&self.mcd);
        for section in [&self.code, &self.data, &self.dir, &self.fci] {
            out.extend_from_slice(&(section.len() as u16).to_be_bytes());
            out.extend_from_slice(section);
        }
        out.extend_from_slice(&self.padding);
        for record in &self.descriptors {
            out.extend_from_slice(record);
        }
        out
    }
}

fn pattern(base: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| base ^ (i as u8 & 0x0F)).collect()
}

fn file_header() -> AltFileHeader {
    AltFileHeader {
        type_code: *AltFileHeader::MAGIC,
        protection_method_id: 1,
        structure_method_id: 2,
        consignment_id: *b"CONSIGN001",
        issue_year: U16::new(2024),
        issue_month: 6,
        issue_day: 30,
        issue_hour: 23,
        issue_minute: 59,
        issue_second: 1,
        consignment_file_id: *b"CFILE007",
        issuer_id: [0x12, 0x34, 0x56, 0x78],
        reserved: [0; 4],
        issuer_numeric_id: U32::new(0x0001_E240),
        integrity_hash: [0xA5; 20],
        template_count: U16::new(1),
    }
}

fn template_header() -> TemplateHeader {
    TemplateHeader {
        issuer_template_id: *b"TMPL0001",
        software_product_id: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
        hash_modulus_id: U16::new(0x0102),
        certificate_serial: [0x0A, 0x0B, 0x0C],
        provider_key_set_id: 3,
        master_key_index: 1,
        data_record_length: U32::new(220),
        field_record_length: U16::new(8),
        field_record_count: U16::new(0),
        session_data_length: U16::new(0),
    }
}
