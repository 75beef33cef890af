//! EMV tag name dictionary.

use std::collections::HashMap;
use std::path::Path;

use calt_common::hex::trim_tag;
use log::{debug, warn};

use crate::xml::{parse_document, read_document, Element};
use crate::{Error, Result};

/// Description returned for tags the dictionary does not know.
pub const UNKNOWN_TAG: &str = "Unknown Tag";

const BUILTIN_TAGS: &str = include_str!("../data/emv_tags.xml");

/// Read-only map from EMV tag to a human-readable description.
///
/// Tags are matched case-insensitively with leading zeros ignored, so `005A`,
/// `5a` and `5A` all find the same entry.
///
/// # Example
///
/// ```
/// use calt_data::TagDictionary;
///
/// let tags = TagDictionary::builtin()?;
/// assert_eq!(tags.describe("005A"), "Application Primary Account Number (PAN)");
/// assert_eq!(tags.describe("FFFF"), "Unknown Tag");
/// # Ok::<(), calt_data::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDictionary {
    descriptions: HashMap<String, String>,
}

impl TagDictionary {
    /// Root element of a tag list document.
    pub const ROOT: &'static str = "Tags";

    /// The tag list shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_xml(BUILTIN_TAGS)
    }

    /// Parse a tag list document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        Self::from_root(&parse_document(xml)?)
    }

    /// Read a tag list file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading tag list {}", path.display());
        Self::from_root(&read_document(path)?)
    }

    fn from_root(root: &Element) -> Result<Self> {
        if root.name != Self::ROOT {
            return Err(Error::MissingRoot(Self::ROOT));
        }

        let mut dictionary = Self::default();
        for element in root.children_named("Tag") {
            match (element.attribute("Tag"), element.attribute("Description")) {
                (Some(tag), Some(description)) => dictionary.insert(tag, description),
                _ => warn!("Skipping Tag element without Tag and Description attributes"),
            }
        }
        debug!("Loaded {} tag descriptions", dictionary.len());
        Ok(dictionary)
    }

    fn key(tag: &str) -> String {
        trim_tag(tag.trim()).to_ascii_uppercase()
    }

    /// Add or replace a description.
    pub fn insert(&mut self, tag: &str, description: &str) {
        self.descriptions
            .insert(Self::key(tag), description.to_string());
    }

    /// Description of `tag`, or [`UNKNOWN_TAG`].
    pub fn describe(&self, tag: &str) -> &str {
        self.descriptions
            .get(&Self::key(tag))
            .map_or(UNKNOWN_TAG, String::as_str)
    }

    /// Number of known tags.
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}
