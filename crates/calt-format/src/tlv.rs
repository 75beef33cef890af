//! BER-TLV length codec.
//!
//! Only the length octets are interpreted here. Tags are never decoded; their
//! width comes from the field descriptor and their bytes are copied through.

use crate::{Error, Result};

/// Largest length the encoder can express (three long-form octets).
pub const MAX_ENCODED_LENGTH: usize = 0xFF_FFFF;

/// Longest long form accepted when decoding.
const MAX_LENGTH_OCTETS: usize = 4;

/// Read the BER length that starts at `offset`.
///
/// Returns the decoded length and the number of octets it occupies.
pub fn read_length(buffer: &[u8], offset: usize) -> Result<(usize, usize)> {
    let first = *buffer.get(offset).ok_or_else(|| Error::MalformedLength {
        offset,
        reason: format!("no length octet, buffer is {} bytes", buffer.len()),
    })?;

    if first & 0x80 == 0 {
        return Ok(((first & 0x7F) as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 {
        return Err(Error::MalformedLength {
            offset,
            reason: "indefinite length form is not allowed".to_string(),
        });
    }
    if count > MAX_LENGTH_OCTETS {
        return Err(Error::MalformedLength {
            offset,
            reason: format!("{} length octets exceed the supported {}", count, MAX_LENGTH_OCTETS),
        });
    }

    let start = offset + 1;
    let octets = buffer
        .get(start..start + count)
        .ok_or_else(|| Error::MalformedLength {
            offset,
            reason: format!(
                "long form declares {} octets but only {} remain",
                count,
                buffer.len().saturating_sub(start)
            ),
        })?;

    let value = octets
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);

    Ok((value, 1 + count))
}

/// Encode a length in its shortest BER form.
pub fn encode_length(length: usize) -> Result<Vec<u8>> {
    let octets = match length {
        0..=0x7F => vec![length as u8],
        0x80..=0xFF => vec![0x81, length as u8],
        0x100..=0xFFFF => vec![0x82, (length >> 8) as u8, length as u8],
        0x1_0000..=MAX_ENCODED_LENGTH => vec![
            0x83,
            (length >> 16) as u8,
            (length >> 8) as u8,
            length as u8,
        ],
        _ => {
            return Err(Error::MalformedLength {
                offset: 0,
                reason: format!("length {} exceeds {:#X}", length, MAX_ENCODED_LENGTH),
            })
        }
    };
    Ok(octets)
}

/// Number of octets [`encode_length`] produces for `length`.
pub const fn encoded_length_size(length: usize) -> usize {
    match length {
        0..=0x7F => 1,
        0x80..=0xFF => 2,
        0x100..=0xFFFF => 3,
        _ => 4,
    }
}
