//! Cardholder data file (CDF) provider.
//!
//! A CDF is a small XML document:
//!
//! ```xml
//! <CardholderData>
//!     <Pan>4111111111111111</Pan>
//!     <CardholderName>Jane Doe</CardholderName>
//!     <ExpiryDate>271231</ExpiryDate>
//! </CardholderData>
//! ```
//!
//! Each supported EMV tag maps to exactly one element and one conversion
//! into the hex value written on the card.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use calt_common::hex::{to_hex, trim_tag};
use calt_format::TagValueProvider;
use log::{debug, warn};

use crate::xml::{parse_document, read_document, Element};
use crate::{Error, Result};

/// Width the cardholder name is space-padded to.
pub const NAME_WIDTH: usize = 26;

/// A value carried by a cardholder data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardholderField {
    Pan,
    CardholderName,
    ExpiryDate,
    ServiceCode,
    PanSequenceNumber,
    Track1Data,
    Track2Data,
    PinBlock,
    Df47,
}

impl CardholderField {
    /// Every field, in document order.
    pub const ALL: [Self; 9] = [
        Self::Pan,
        Self::CardholderName,
        Self::ExpiryDate,
        Self::ServiceCode,
        Self::PanSequenceNumber,
        Self::Track1Data,
        Self::Track2Data,
        Self::PinBlock,
        Self::Df47,
    ];

    /// XML element name holding the field.
    pub const fn element_name(self) -> &'static str {
        match self {
            Self::Pan => "Pan",
            Self::CardholderName => "CardholderName",
            Self::ExpiryDate => "ExpiryDate",
            Self::ServiceCode => "ServiceCode",
            Self::PanSequenceNumber => "PanSequenceNumber",
            Self::Track1Data => "Track1Data",
            Self::Track2Data => "Track2Data",
            Self::PinBlock => "PinBlock",
            Self::Df47 => "DF47",
        }
    }

    /// EMV tag the field personalizes, without leading zeros.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Pan => "5A",
            Self::CardholderName => "5F20",
            Self::ExpiryDate => "5F24",
            Self::ServiceCode => "5F30",
            Self::PanSequenceNumber => "5F34",
            Self::Track1Data => "9F1F",
            Self::Track2Data => "57",
            Self::PinBlock => "DF45",
            Self::Df47 => "DF47",
        }
    }

    /// The field for an element name.
    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.element_name() == name)
    }

    /// The field personalizing `tag`, with or without leading zeros.
    pub fn for_tag(tag: &str) -> Option<Self> {
        let tag = trim_tag(tag.trim());
        Self::ALL
            .into_iter()
            .find(|f| f.tag().eq_ignore_ascii_case(tag))
    }

    /// Convert a document value into the hex written for this field.
    pub fn convert(self, value: &str) -> Result<String> {
        let fail = |reason: String| Error::Conversion {
            field: self,
            reason,
        };

        match self {
            Self::Pan => Ok(packed_digits(value, true)),
            Self::CardholderName => {
                if !value.is_ascii() {
                    return Err(fail("name is not ASCII".to_string()));
                }
                let name = format!("{:<width$}", value.to_ascii_uppercase(), width = NAME_WIDTH);
                Ok(to_hex(name.as_bytes()))
            }
            Self::ExpiryDate => {
                let count = value.chars().count();
                if count != 6 {
                    return Err(fail(format!("expected YYMMDD, got {} characters", count)));
                }
                Ok(packed_digits(value, false))
            }
            Self::ServiceCode => {
                let count = value.chars().count();
                if count != 4 {
                    return Err(fail(format!("expected 4 digits, got {} characters", count)));
                }
                Ok(packed_digits(value, false))
            }
            Self::PanSequenceNumber => Ok(packed_digits(&format!("{:0>2}", value), false)),
            Self::Track1Data | Self::Track2Data | Self::PinBlock | Self::Df47 => {
                Ok(value.to_string())
            }
        }
    }
}

impl fmt::Display for CardholderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.element_name(), self.tag())
    }
}

/// Keep the decimal digits of `value`, padding with `F` to a whole byte if asked.
fn packed_digits(value: &str, pad: bool) -> String {
    let mut digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if pad && digits.len() % 2 != 0 {
        digits.push('F');
    }
    digits
}

/// Outcome of looking up a tag in a cardholder data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The converted hex value.
    Value(String),
    /// The tag is supported but the document has no value for it.
    Missing(CardholderField),
    /// The tag is not a cardholder data tag.
    NoMapping,
}

/// Values loaded from a cardholder data file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardholderData {
    values: HashMap<CardholderField, String>,
}

impl CardholderData {
    /// Root element of a cardholder data file.
    pub const ROOT: &'static str = "CardholderData";

    /// Parse a cardholder data document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_root(parse_document(xml)?)
    }

    /// Read a cardholder data file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading cardholder data {}", path.display());
        Self::from_root(read_document(path)?)
    }

    fn from_root(root: Element) -> Result<Self> {
        if root.name != Self::ROOT {
            return Err(Error::MissingRoot(Self::ROOT));
        }

        let mut data = Self::default();
        for element in root.children {
            match CardholderField::from_element_name(&element.name) {
                Some(field) => data.set(field, element.text),
                None => debug!("Ignoring unknown CDF element {}", element.name),
            }
        }
        Ok(data)
    }

    /// The raw document value of `field`.
    pub fn value(&self, field: CardholderField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Set the raw value of `field`; an empty value clears it.
    pub fn set(&mut self, field: CardholderField, value: String) {
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
    }

    /// Look up and convert the value for `tag`.
    pub fn lookup(&self, tag: &str) -> Result<Lookup> {
        let Some(field) = CardholderField::for_tag(tag) else {
            return Ok(Lookup::NoMapping);
        };
        match self.value(field) {
            Some(value) => field.convert(value).map(Lookup::Value),
            None => Ok(Lookup::Missing(field)),
        }
    }
}

impl TagValueProvider for CardholderData {
    fn get(&self, tag: &str) -> Option<String> {
        match self.lookup(tag) {
            Ok(Lookup::Value(value)) => Some(value),
            Ok(Lookup::Missing(field)) => {
                debug!("Cardholder data has no {}", field);
                None
            }
            Ok(Lookup::NoMapping) => None,
            Err(e) => {
                warn!("Tag {}: {}", tag, e);
                None
            }
        }
    }
}
