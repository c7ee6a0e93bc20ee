//! Feature extraction.
//!
//! A [`FeatureSchema`] declares, in order, which attributes of an audio
//! feature payload become vector components and which numeric kind each
//! one must have. The schema is fixed per index: changing the order or the
//! kinds changes the feature space and invalidates a saved index.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::CatalogItem;

/// Multiplier applied to floating-point attributes before truncation, so
/// that 0.0-1.0 confidences keep three decimal places of resolution.
pub const FLOAT_SCALE: f64 = 1000.0;

/// The numeric kind an attribute is declared to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Scaled by [`FLOAT_SCALE`] and truncated. Integer JSON values are
    /// accepted and widened.
    Float,
    /// Passed through unchanged. Only integer JSON values are accepted.
    Int,
}

/// One declared vector component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Convert a raw attribute value, or `None` if it does not match the
    /// declared kind.
    fn convert(&self, value: &serde_json::Value) -> Option<i64> {
        match self.kind {
            FeatureKind::Float => value.as_f64().map(|v| (v * FLOAT_SCALE).trunc() as i64),
            FeatureKind::Int => value.as_i64(),
        }
    }
}

/// Fixed-length integer vector derived from one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<i64>);

impl FeatureVector {
    #[must_use]
    pub fn new(values: Vec<i64>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

impl From<Vec<i64>> for FeatureVector {
    fn from(values: Vec<i64>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    features: Vec<FeatureSpec>,
}

/// Ordered, validated list of feature declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    specs: Vec<FeatureSpec>,
}

impl FeatureSchema {
    /// Build a schema, rejecting an empty list or repeated names.
    pub fn new(specs: Vec<FeatureSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::InvalidData(
                "feature schema declares no features".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if spec.name.trim().is_empty() {
                return Err(Error::InvalidData(
                    "feature schema contains an unnamed feature".to_string(),
                ));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(Error::InvalidData(format!(
                    "feature '{}' is declared more than once",
                    spec.name
                )));
            }
        }

        Ok(Self { specs })
    }

    /// The 13 numeric audio features of the catalog, in payload order.
    #[must_use]
    pub fn audio_features() -> Self {
        use FeatureKind::{Float, Int};

        let specs = [
            ("danceability", Float),
            ("energy", Float),
            ("key", Int),
            ("loudness", Float),
            ("mode", Int),
            ("speechiness", Float),
            ("acousticness", Float),
            ("instrumentalness", Float),
            ("liveness", Float),
            ("valence", Float),
            ("tempo", Float),
            ("duration_ms", Int),
            ("time_signature", Int),
        ]
        .into_iter()
        .map(|(name, kind)| FeatureSpec::new(name, kind))
        .collect();

        Self { specs }
    }

    /// Load a schema from a TOML file of `[[features]]` tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::InvalidData(msg) => {
                Error::InvalidData(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    /// Parse a schema from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: SchemaFile = toml::from_str(content)
            .map_err(|e| Error::InvalidData(format!("failed to parse feature schema: {e}")))?;
        Self::new(file.features)
    }

    /// Number of vector components, i.e. `n_features` of any index built
    /// with this schema.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    #[must_use]
    pub fn specs(&self) -> &[FeatureSpec] {
        &self.specs
    }

    /// Derive the feature vector of an item.
    ///
    /// Declared attributes that are missing or of the wrong kind are
    /// skipped, so the result can be shorter than [`Self::len`]; callers
    /// decide what to do with undersized vectors.
    #[must_use]
    pub fn extract(&self, item: &CatalogItem) -> FeatureVector {
        let Some(attributes) = &item.attributes else {
            return FeatureVector::default();
        };

        let values = self
            .specs
            .iter()
            .filter_map(|spec| attributes.get(&spec.name).and_then(|v| spec.convert(v)))
            .collect();

        FeatureVector(values)
    }

    /// Names of declared attributes the item cannot supply.
    #[must_use]
    pub fn missing<'a>(&'a self, item: &CatalogItem) -> Vec<&'a str> {
        self.specs
            .iter()
            .filter(|spec| {
                item.attributes
                    .as_ref()
                    .and_then(|attrs| attrs.get(&spec.name))
                    .and_then(|v| spec.convert(v))
                    .is_none()
            })
            .map(|spec| spec.name.as_str())
            .collect()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::audio_features()
    }
}
