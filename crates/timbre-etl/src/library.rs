//! On-disk layout of an ingested library.
//!
//! A library directory holds four files written by one ingestion run:
//!
//! - `library.ann`: the built vector index
//! - `forward_ids.json`: catalog ID to position
//! - `reverse_ids.json`: position (decimal string) to catalog ID
//! - `library.json`: snapshot of every listed item plus run metadata
//!
//! Queries only need the index and the two ID tables; the snapshot is
//! informational.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use timbre_core::{CatalogItem, IdentifierBridge};
use timbre_search::{IndexError, VectorIndex};

use crate::error::LibraryError;
use crate::ingest::{IngestReport, LibraryIngest};

pub const INDEX_FILE: &str = "library.ann";
pub const FORWARD_FILE: &str = "forward_ids.json";
pub const REVERSE_FILE: &str = "reverse_ids.json";
pub const SNAPSHOT_FILE: &str = "library.json";

/// Persisted record of one ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub ingested_at: DateTime<Utc>,
    pub n_features: usize,
    pub report: IngestReport,
    /// Every listed item, in listing order.
    pub items: Vec<CatalogItem>,
}

/// A library directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryStore {
    dir: PathBuf,
}

impl LibraryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    pub fn forward_path(&self) -> PathBuf {
        self.dir.join(FORWARD_FILE)
    }

    pub fn reverse_path(&self) -> PathBuf {
        self.dir.join(REVERSE_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Whether the files needed for queries are present.
    pub fn exists(&self) -> bool {
        self.index_path().is_file() && self.forward_path().is_file() && self.reverse_path().is_file()
    }

    /// Write every artifact of `library`, replacing any previous run.
    pub fn save(&self, library: &LibraryIngest) -> Result<(), LibraryError> {
        fs::create_dir_all(&self.dir).map_err(timbre_core::Error::from)?;

        library.index.save(&self.index_path())?;
        library
            .bridge
            .save(&self.forward_path(), &self.reverse_path())?;

        let snapshot = LibrarySnapshot {
            ingested_at: Utc::now(),
            n_features: library.index.n_features(),
            report: library.report,
            items: library.items.clone(),
        };
        write_json(&self.snapshot_path(), &snapshot)?;

        log::info!(
            "Saved library of {} tracks to {}",
            library.items.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Load the vector index, which must have `n_features` components.
    pub fn load_index(&self, n_features: usize) -> Result<VectorIndex, LibraryError> {
        self.ensure_exists()?;
        match VectorIndex::load(&self.index_path(), n_features) {
            Ok(index) => Ok(index),
            Err(IndexError::DimensionMismatch { expected, actual }) => {
                Err(LibraryError::SchemaChanged {
                    dir: self.dir.clone(),
                    stored: actual,
                    configured: expected,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn load_bridge(&self) -> Result<IdentifierBridge, LibraryError> {
        self.ensure_exists()?;
        Ok(IdentifierBridge::load(
            &self.forward_path(),
            &self.reverse_path(),
        )?)
    }

    pub fn load_snapshot(&self) -> Result<LibrarySnapshot, LibraryError> {
        let path = self.snapshot_path();
        if !path.is_file() {
            return Err(LibraryError::Missing(self.dir.clone()));
        }
        let file = File::open(&path).map_err(timbre_core::Error::from)?;
        let snapshot =
            serde_json::from_reader(BufReader::new(file)).map_err(timbre_core::Error::from)?;
        Ok(snapshot)
    }

    fn ensure_exists(&self) -> Result<(), LibraryError> {
        if self.exists() {
            Ok(())
        } else {
            Err(LibraryError::Missing(self.dir.clone()))
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), timbre_core::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use timbre_core::{CatalogId, FeatureKind, FeatureSchema, FeatureSpec, IndexPosition};

    fn sample_library() -> LibraryIngest {
        let schema = FeatureSchema::new(vec![
            FeatureSpec::new("energy", FeatureKind::Float),
            FeatureSpec::new("key", FeatureKind::Int),
        ])
        .unwrap();

        let mut bridge = IdentifierBridge::new();
        let mut index = VectorIndex::create(schema.len()).unwrap();
        let mut items = Vec::new();

        for (i, (energy, key)) in [(0.9, 1), (0.8, 2), (0.1, 9)].into_iter().enumerate() {
            let position = IndexPosition::new(u32::try_from(i).unwrap());
            let id = CatalogId::new(format!("id{i}"));
            let attributes = match json!({ "energy": energy, "key": key }) {
                serde_json::Value::Object(map) => map,
                _ => unreachable!(),
            };
            let mut item = CatalogItem::new(id.clone(), format!("Song {i}"), format!("spotify:track:id{i}"))
                .with_attributes(attributes);
            item.position = Some(position);

            bridge.bind(id, position).unwrap();
            index.insert(position, &schema.extract(&item)).unwrap();
            items.push(item);
        }
        index.build(4).unwrap();

        LibraryIngest {
            items,
            bridge,
            index,
            report: IngestReport {
                listed: 3,
                hydrated: 3,
                indexed: 3,
                ..IngestReport::default()
            },
        }
    }

    #[test]
    fn test_save_writes_all_files() {
        let dir = TempDir::new().unwrap();
        let store = LibraryStore::new(dir.path().join("lib"));
        assert!(!store.exists());

        store.save(&sample_library()).unwrap();

        assert!(store.exists());
        assert!(store.snapshot_path().is_file());
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LibraryStore::new(dir.path());
        let library = sample_library();
        store.save(&library).unwrap();

        let bridge = store.load_bridge().unwrap();
        assert_eq!(bridge, library.bridge);

        let index = store.load_index(2).unwrap();
        let position = IndexPosition::new(0);
        assert_eq!(
            index.query(position, 3).unwrap(),
            library.index.query(position, 3).unwrap()
        );

        let snapshot = store.load_snapshot().unwrap();
        assert_eq!(snapshot.n_features, 2);
        assert_eq!(snapshot.items, library.items);
        assert_eq!(snapshot.report.indexed, 3);
    }

    #[test]
    fn test_snapshot_layout() {
        let dir = TempDir::new().unwrap();
        let store = LibraryStore::new(dir.path());
        store.save(&sample_library()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.snapshot_path()).unwrap()).unwrap();
        assert!(raw["ingested_at"].is_string());
        assert_eq!(raw["items"].as_array().unwrap().len(), 3);
        assert_eq!(raw["items"][0]["external_id"], "id0");
    }

    #[test]
    fn test_missing_library() {
        let dir = TempDir::new().unwrap();
        let store = LibraryStore::new(dir.path().join("nothing"));

        assert!(matches!(store.load_bridge(), Err(LibraryError::Missing(_))));
        assert!(matches!(store.load_index(13), Err(LibraryError::Missing(_))));
        assert!(matches!(store.load_snapshot(), Err(LibraryError::Missing(_))));
    }

    #[test]
    fn test_wrong_dimension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LibraryStore::new(dir.path());
        store.save(&sample_library()).unwrap();

        assert!(matches!(
            store.load_index(13),
            Err(LibraryError::SchemaChanged {
                stored: 2,
                configured: 13,
                ..
            })
        ));
    }
}
