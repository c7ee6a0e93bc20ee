//! Bidirectional mapping between catalog IDs and index positions.
//!
//! The forward (`CatalogId -> IndexPosition`) and reverse
//! (`IndexPosition -> CatalogId`) tables are only ever modified together,
//! so they stay mutually inverse. On disk they are two independent JSON
//! objects; the reverse table is keyed by the decimal form of the
//! position because JSON object keys are strings.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{CatalogId, IndexPosition};

/// Forward table as persisted: external ID to position.
pub type ForwardTable = BTreeMap<String, u32>;

/// Reverse table as persisted: position (decimal string) to external ID.
pub type ReverseTable = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierBridge {
    forward: HashMap<CatalogId, IndexPosition>,
    reverse: BTreeMap<IndexPosition, CatalogId>,
}

impl IdentifierBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an external ID to a position in both directions.
    ///
    /// Nothing is inserted if either side is already bound.
    pub fn bind(&mut self, id: CatalogId, position: IndexPosition) -> Result<()> {
        if self.forward.contains_key(&id) || self.reverse.contains_key(&position) {
            return Err(Error::DuplicateBinding {
                id: id.to_string(),
                position,
            });
        }

        self.reverse.insert(position, id.clone());
        self.forward.insert(id, position);
        Ok(())
    }

    pub fn resolve_to_position(&self, id: &CatalogId) -> Result<IndexPosition> {
        self.forward.get(id).copied().ok_or_else(|| Error::NotFound {
            entity: "catalog id",
            id: id.to_string(),
        })
    }

    pub fn resolve_to_external_id(&self, position: IndexPosition) -> Result<&CatalogId> {
        self.reverse.get(&position).ok_or_else(|| Error::NotFound {
            entity: "index position",
            id: position.to_string(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Bindings in position order.
    pub fn iter(&self) -> impl Iterator<Item = (IndexPosition, &CatalogId)> {
        self.reverse.iter().map(|(position, id)| (*position, id))
    }

    #[must_use]
    pub fn forward_table(&self) -> ForwardTable {
        self.forward
            .iter()
            .map(|(id, position)| (id.to_string(), position.get()))
            .collect()
    }

    #[must_use]
    pub fn reverse_table(&self) -> ReverseTable {
        self.reverse
            .iter()
            .map(|(position, id)| (position.to_string(), id.to_string()))
            .collect()
    }

    /// Rebuild a bridge from its two persisted tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] if a reverse key is not a position,
    /// or if the tables are not exact inverses of each other.
    pub fn from_tables(forward: ForwardTable, reverse: ReverseTable) -> Result<Self> {
        let mut bridge = Self::new();
        for (id, position) in forward {
            bridge
                .bind(CatalogId::new(id), IndexPosition::new(position))
                .map_err(|e| Error::InvalidData(format!("forward table: {e}")))?;
        }

        if reverse.len() != bridge.len() {
            return Err(Error::InvalidData(format!(
                "bridge tables disagree: {} forward entries, {} reverse entries",
                bridge.len(),
                reverse.len()
            )));
        }

        for (key, id) in &reverse {
            let position: u32 = key.parse().map_err(|_| {
                Error::InvalidData(format!("reverse table key is not a position: {key:?}"))
            })?;
            let bound = bridge.reverse.get(&IndexPosition::new(position));
            if bound.map(CatalogId::as_str) != Some(id.as_str()) {
                return Err(Error::InvalidData(format!(
                    "reverse entry {key} -> {id} has no matching forward entry"
                )));
            }
        }

        Ok(bridge)
    }

    /// Write both tables as JSON files.
    pub fn save(&self, forward_path: &Path, reverse_path: &Path) -> Result<()> {
        write_json(forward_path, &self.forward_table())?;
        write_json(reverse_path, &self.reverse_table())?;
        log::debug!(
            "Saved identifier bridge ({} bindings) to {} and {}",
            self.len(),
            forward_path.display(),
            reverse_path.display()
        );
        Ok(())
    }

    /// Read both tables and rebuild the bridge.
    pub fn load(forward_path: &Path, reverse_path: &Path) -> Result<Self> {
        let forward: ForwardTable =
            serde_json::from_reader(BufReader::new(File::open(forward_path)?))?;
        let reverse: ReverseTable =
            serde_json::from_reader(BufReader::new(File::open(reverse_path)?))?;
        Self::from_tables(forward, reverse)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
