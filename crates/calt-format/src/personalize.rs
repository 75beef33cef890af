//! Personalization workflow: classify fields, resolve their values, build the ALU.
//!
//! Each ALU-bound descriptor becomes a [`PersonalizationField`]. Fields fed by
//! cardholder data or key material wait for a [`TagValueProvider`]; all other
//! fields keep the value already stored in the template.

use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;

use calt_common::hex::{parse_hex, to_hex, trim_tag};
use log::{debug, warn};

use crate::builder::AluBuilder;
use crate::container::AltFile;
use crate::descriptor::{DataSource, FieldDescriptor};
use crate::locate::{locate, ResolvedField};
use crate::{Error, PendingField, Result};

/// Tags whose values are key material rather than template defaults.
pub const KEY_MATERIAL_TAGS: [&str; 8] = [
    "DF42", "DF43", "DF44", "DF5E", "DF60", "DF61", "9F46", "0090",
];

/// Whether `tag` names key material, with or without leading zeros.
pub fn is_key_material_tag(tag: &str) -> bool {
    let tag = trim_tag(tag);
    KEY_MATERIAL_TAGS
        .iter()
        .any(|known| trim_tag(known).eq_ignore_ascii_case(tag))
}

/// A source of hex-encoded values keyed by tag.
pub trait TagValueProvider {
    /// The hex value for `tag`, if the provider has one.
    fn get(&self, tag: &str) -> Option<String>;
}

impl<S: BuildHasher> TagValueProvider for HashMap<String, String, S> {
    fn get(&self, tag: &str) -> Option<String> {
        HashMap::get(self, tag).cloned()
    }
}

/// Where a field's replacement value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldOrigin {
    Cardholder,
    KeyMaterial,
    Template,
}

impl FieldOrigin {
    fn classify(descriptor: &FieldDescriptor) -> Self {
        if descriptor.source == DataSource::External {
            FieldOrigin::Cardholder
        } else if is_key_material_tag(&descriptor.tag_hex()) {
            FieldOrigin::KeyMaterial
        } else {
            FieldOrigin::Template
        }
    }
}

impl fmt::Display for FieldOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldOrigin::Cardholder => "cardholder data",
            FieldOrigin::KeyMaterial => "key material",
            FieldOrigin::Template => "template",
        })
    }
}

/// Readiness of a field for building.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FieldStatus {
    /// Waiting for a value from an external provider.
    PendingExternal(FieldOrigin),
    /// A replacement value is set.
    Ready,
    /// The field cannot be built.
    Error(String),
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldStatus::PendingExternal(origin) => write!(f, "pending {}", origin),
            FieldStatus::Ready => f.write_str("ready"),
            FieldStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// One ALU-bound field with its current and replacement values.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PersonalizationField {
    pub descriptor: FieldDescriptor,
    /// Location in the template; `None` when the field could not be located.
    pub resolved: Option<ResolvedField>,
    /// Bytes currently stored at the field's value range.
    pub current: Vec<u8>,
    /// Bytes to write at build time.
    pub replacement: Option<Vec<u8>>,
    pub origin: FieldOrigin,
    pub status: FieldStatus,
}

impl PersonalizationField {
    fn new(descriptor: &FieldDescriptor, alt: &AltFile) -> Self {
        let origin = FieldOrigin::classify(descriptor);
        let section = alt.sections().by_category(descriptor.category);

        match locate(descriptor, section) {
            Ok(resolved) => {
                let current = resolved.value(section).unwrap_or_default().to_vec();
                debug!(
                    "Field {} ({}) in {}: value {}..{}",
                    descriptor.tag_hex(),
                    origin,
                    descriptor.category.region(),
                    resolved.value_offset,
                    resolved.value_offset + resolved.value_length
                );
                let (replacement, status) = match origin {
                    FieldOrigin::Template => (Some(current.clone()), FieldStatus::Ready),
                    other => (None, FieldStatus::PendingExternal(other)),
                };
                Self {
                    descriptor: descriptor.clone(),
                    resolved: Some(resolved),
                    current,
                    replacement,
                    origin,
                    status,
                }
            }
            Err(e) => {
                warn!("Cannot locate field {}: {}", descriptor.tag_hex(), e);
                Self {
                    descriptor: descriptor.clone(),
                    resolved: None,
                    current: Vec::new(),
                    replacement: None,
                    origin,
                    status: FieldStatus::Error(e.to_string()),
                }
            }
        }
    }

    /// Whether the field can be written.
    pub fn is_ready(&self) -> bool {
        self.status == FieldStatus::Ready
    }

    /// The current value as hex.
    pub fn current_hex(&self) -> String {
        to_hex(&self.current)
    }

    /// The replacement value as hex, if set.
    pub fn replacement_hex(&self) -> Option<String> {
        self.replacement.as_deref().map(to_hex)
    }

    /// Set the replacement value and mark the field ready.
    ///
    /// A field that could not be located keeps its error status and the value
    /// is refused.
    pub fn set_replacement(&mut self, value: Vec<u8>) -> Result<()> {
        if self.resolved.is_none() {
            return Err(Error::FieldStatus(vec![PendingField {
                index: self.descriptor.index,
                tag: self.descriptor.tag_hex(),
                status: self.status.to_string(),
            }]));
        }
        self.replacement = Some(value);
        self.status = FieldStatus::Ready;
        Ok(())
    }

    /// Set the replacement value from a hex string; whitespace is ignored.
    pub fn set_hex(&mut self, value: &str) -> Result<()> {
        let bytes = parse_hex(value).map_err(|e| Error::InvalidHex {
            tag: self.descriptor.tag_hex(),
            reason: e.to_string(),
        })?;
        self.set_replacement(bytes)
    }

    fn pending(&self) -> Option<PendingField> {
        (!self.is_ready()).then(|| PendingField {
            index: self.descriptor.index,
            tag: self.descriptor.tag_hex(),
            status: self.status.to_string(),
        })
    }
}

/// The set of ALU-bound fields of one template.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Personalization {
    fields: Vec<PersonalizationField>,
}

impl Personalization {
    /// Classify and locate every ALU-bound field of `alt`.
    pub fn from_container(alt: &AltFile) -> Self {
        let fields = alt
            .load_unit_descriptors()
            .map(|descriptor| PersonalizationField::new(descriptor, alt))
            .collect::<Vec<_>>();
        debug!("{} ALU-bound fields", fields.len());
        Self { fields }
    }

    /// All fields in descriptor order.
    pub fn fields(&self) -> &[PersonalizationField] {
        &self.fields
    }

    /// Mutable access for manual edits.
    pub fn fields_mut(&mut self) -> &mut [PersonalizationField] {
        &mut self.fields
    }

    /// The first field with the given tag, with or without leading zeros.
    pub fn field_mut(&mut self, tag: &str) -> Option<&mut PersonalizationField> {
        let tag = trim_tag(tag);
        self.fields
            .iter_mut()
            .find(|f| f.descriptor.normalized_tag().eq_ignore_ascii_case(tag))
    }

    /// Fill every located field of `origin` from `provider`.
    ///
    /// Returns the number of fields that became ready. Fields the provider has
    /// no value for, or whose value is not hex, are put in error.
    pub fn resolve<P: TagValueProvider + ?Sized>(
        &mut self,
        origin: FieldOrigin,
        provider: &P,
    ) -> usize {
        let mut ready = 0;
        for field in self
            .fields
            .iter_mut()
            .filter(|f| f.origin == origin && f.resolved.is_some())
        {
            let value = provider
                .get(&field.descriptor.tag_hex())
                .or_else(|| provider.get(&field.descriptor.normalized_tag()));

            match value {
                Some(value) => match field.set_hex(&value) {
                    Ok(()) => ready += 1,
                    Err(e) => {
                        warn!("{}", e);
                        field.status = FieldStatus::Error(e.to_string());
                    }
                },
                None => {
                    debug!("No {} for tag {}", origin, field.descriptor.tag_hex());
                    field.status = FieldStatus::Error(format!("no {}", origin));
                }
            }
        }
        ready
    }

    /// Every field that is not ready.
    pub fn pending(&self) -> Vec<PendingField> {
        self.fields
            .iter()
            .filter_map(PersonalizationField::pending)
            .collect()
    }

    /// Build the ALU image for `alt`.
    ///
    /// Fails with [`Error::FieldStatus`] if any field is not ready. Fields the
    /// builder rejects are put in error and reported together.
    pub fn build(&mut self, alt: &AltFile) -> Result<Vec<u8>> {
        let pending = self.pending();
        if !pending.is_empty() {
            return Err(Error::FieldStatus(pending));
        }

        let mut builder = AluBuilder::new(alt.sections());
        let failures = builder.apply_fields(self.fields.iter().filter_map(|field| {
            match (&field.resolved, &field.replacement) {
                (Some(resolved), Some(value)) => {
                    Some((&field.descriptor, resolved, value.as_slice()))
                }
                _ => None,
            }
        }));

        if !failures.is_empty() {
            for failure in &failures {
                if let Some(field) = self
                    .fields
                    .iter_mut()
                    .find(|f| f.descriptor.index == failure.index)
                {
                    field.status = FieldStatus::Error(failure.error.to_string());
                }
            }
            return Err(Error::FieldsRejected(failures));
        }

        debug!("Built {}-byte ALU image", builder.as_bytes().len());
        Ok(builder.into_bytes())
    }
}
