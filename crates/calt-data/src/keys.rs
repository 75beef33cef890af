//! Key material provider.
//!
//! Keys come from an XML document whose root holds `Key` elements:
//!
//! ```xml
//! <Root>
//!     <Key Tag="DF42">00112233445566778899AABBCCDDEEFF</Key>
//! </Root>
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use calt_format::{is_key_material_tag, TagValueProvider};
use log::{debug, warn};

use crate::xml::{parse_document, read_document, Element};
use crate::{Error, Result};

/// Key values by tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Keyed by the tag as written in the document, uppercased.
    keys: BTreeMap<String, String>,
}

impl KeyMaterial {
    /// Parse a key document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_root(&parse_document(xml)?)
    }

    /// Read a key file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading key material {}", path.display());
        Self::from_root(&read_document(path)?)
    }

    fn from_root(root: &Element) -> Result<Self> {
        let elements: Vec<_> = root.children_named("Key").collect();
        if elements.is_empty() {
            return Err(Error::Xml("no Key elements found".to_string()));
        }

        let mut material = Self::default();
        for element in elements {
            let Some(tag) = element.attribute("Tag").map(str::trim) else {
                warn!("Skipping Key element without a Tag attribute");
                continue;
            };
            if tag.is_empty() {
                warn!("Skipping Key element with an empty Tag attribute");
            } else if !is_key_material_tag(tag) {
                warn!("Skipping unrecognized key tag {}", tag);
            } else if element.text.is_empty() {
                warn!("Skipping empty key value for tag {}", tag);
            } else {
                debug!("Loaded key for tag {}", tag);
                material
                    .keys
                    .insert(tag.to_ascii_uppercase(), element.text.clone());
            }
        }

        if material.keys.is_empty() {
            return Err(Error::NoKeys);
        }
        Ok(material)
    }

    /// The key value stored under `tag`, compared case-insensitively.
    pub fn key(&self, tag: &str) -> Option<&str> {
        self.keys
            .get(&tag.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Tags with a key, in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Number of loaded keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are loaded.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl TagValueProvider for KeyMaterial {
    fn get(&self, tag: &str) -> Option<String> {
        self.key(tag).map(str::to_string)
    }
}
