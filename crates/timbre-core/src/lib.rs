//! Core domain model for timbre.
//!
//! This crate defines the catalog item model, the two identifier spaces
//! (external catalog IDs and dense index positions), the feature schema
//! used to turn audio-feature payloads into vectors, and the identifier
//! bridge that keeps both ID spaces consistent.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod bridge;
pub mod error;
pub mod features;
pub mod model;

pub use bridge::IdentifierBridge;
pub use error::{Error, Result};
pub use features::{FeatureKind, FeatureSchema, FeatureSpec, FeatureVector};
pub use model::{Attributes, CatalogId, CatalogItem, IndexPosition, NamedRef, ResponseEvent};
