//! # Record Trait
//!
//! The `Record` trait defines the contract that every ingested value must implement to
//! flow through the pipeline: it names its identifier, knows how to decode itself from a
//! wire payload, and may refuse structurally valid but unusable input through a
//! validation hook.
//!
//! # Architecture Note
//! The consumer, cache, bootstrapper and store traits are all written once against
//! `Record`. A concrete domain (orders, shipments, ...) implements this trait and gets the
//! whole ingestion-to-cache pipeline for free.
//!
//! # Provided Methods (Hooks)
//! - [`Record::validate`]: defaults to accepting everything.
//! - [`Record::decode`] / [`Record::encode`]: JSON through `serde_json`.
//!
//! Records are values. Once decoded they are never patched in place; a newer version of
//! the same identifier replaces the old one wholesale.

use crate::error::{DecodeError, EncodeError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait that any value must implement to be ingested, stored and cached.
pub trait Record: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The unique identifier of the record (e.g. `String`, `u64`).
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug + 'static;

    /// Borrow the identifier.
    fn id(&self) -> &Self::Id;

    /// Structural checks that serde cannot express (e.g. non-empty identifier).
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// Decode a wire payload and run [`Record::validate`] on the result.
    fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let record: Self = serde_json::from_slice(payload)?;
        record.validate().map_err(DecodeError::Invalid)?;
        Ok(record)
    }

    /// Encode the record in its wire representation.
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(self)?)
    }
}
