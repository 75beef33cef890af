//! Value providers for calt personalization.
//!
//! This crate loads the documents that supply replacement values and labels:
//!
//! - [`CardholderData`] - cardholder data file (`<CardholderData>` XML)
//! - [`KeyMaterial`] - key file (`<Key Tag="..">` XML)
//! - [`TagDictionary`] - EMV tag descriptions, with a built-in list
//!
//! [`CardholderData`] and [`KeyMaterial`] implement
//! [`calt_format::TagValueProvider`] and can be passed straight to
//! [`calt_format::Personalization::resolve`].

mod error;
mod xml;

pub mod cardholder;
pub mod keys;
pub mod tags;

pub use cardholder::{CardholderData, CardholderField, Lookup};
pub use error::{Error, Result};
pub use keys::KeyMaterial;
pub use tags::{TagDictionary, UNKNOWN_TAG};
