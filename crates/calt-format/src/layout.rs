//! ALU image layout.
//!
//! The layout is computed once from the four section lengths and then passed
//! by value to everything that needs an absolute offset into the image.
//!
//! ```text
//! 8      MCD number (zeroed)
//! 2 + n  code section
//! 2 + n  data section
//! 2 + n  dir section
//! 2 + n  fci section
//! 2      application signature length (zero)
//! 2      KTU length (zero)
//! ```

use std::ops::Range;

use crate::descriptor::DataCategory;
use crate::Region;

/// Lengths of the four variable sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SectionLengths {
    pub code: u16,
    pub data: u16,
    pub dir: u16,
    pub fci: u16,
}

/// Position of one length-prefixed section inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSlot {
    /// Offset of the 2-byte length prefix.
    pub length_offset: usize,
    /// Offset of the first section byte.
    pub start: usize,
    /// Number of section bytes.
    pub len: usize,
}

impl SectionSlot {
    const fn after(offset: usize, len: u16) -> Self {
        Self {
            length_offset: offset,
            start: offset + 2,
            len: len as usize,
        }
    }

    /// Offset one past the last section byte.
    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    /// Byte range of the section contents.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Immutable description of where everything lives in an ALU image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluLayout {
    pub code: SectionSlot,
    pub data: SectionSlot,
    pub dir: SectionSlot,
    pub fci: SectionSlot,
    /// Offset of the application signature length.
    pub signature_length_offset: usize,
    /// Offset of the KTU length.
    pub ktu_length_offset: usize,
    /// Exact size of the image.
    pub total_size: usize,
}

impl AluLayout {
    /// Size of the MCD number placeholder.
    pub const MCD_SIZE: usize = 8;

    /// Compute the layout for the given section lengths.
    pub const fn new(lengths: SectionLengths) -> Self {
        let code = SectionSlot::after(Self::MCD_SIZE, lengths.code);
        let data = SectionSlot::after(code.end(), lengths.data);
        let dir = SectionSlot::after(data.end(), lengths.dir);
        let fci = SectionSlot::after(dir.end(), lengths.fci);
        let signature_length_offset = fci.end();
        let ktu_length_offset = signature_length_offset + 2;

        Self {
            code,
            data,
            dir,
            fci,
            signature_length_offset,
            ktu_length_offset,
            total_size: ktu_length_offset + 2,
        }
    }

    /// Byte range of the MCD number.
    pub fn mcd(&self) -> Range<usize> {
        0..Self::MCD_SIZE
    }

    /// The slot a field of the given category is written into.
    pub const fn slot(&self, category: DataCategory) -> SectionSlot {
        match category {
            DataCategory::Application => self.data,
            DataCategory::Fci => self.fci,
        }
    }

    /// All four slots with their region names, in image order.
    pub const fn slots(&self) -> [(Region, SectionSlot); 4] {
        [
            (Region::CodeSection, self.code),
            (Region::DataSection, self.data),
            (Region::DirSection, self.dir),
            (Region::FciSection, self.fci),
        ]
    }
}
