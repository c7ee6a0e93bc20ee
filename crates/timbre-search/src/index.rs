//! The vector index engine.
//!
//! Lifecycle: [`VectorIndex::create`] → any number of
//! [`VectorIndex::insert`] calls → exactly one [`VectorIndex::build`] →
//! queries, [`VectorIndex::save`]. A loaded index is already built.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use timbre_core::{FeatureVector, IndexPosition};

use crate::distance::{angular, normalized};
use crate::error::{IndexError, IndexResult};
use crate::forest::Forest;

/// Number of trees built when the caller has no preference.
pub const DEFAULT_TREE_COUNT: usize = 10;

/// Number of neighbours returned when the caller has no preference.
pub const DEFAULT_NEIGHBOURS: usize = 5;

/// Seed of the tree-building RNG; fixed so that rebuilding the same
/// library yields the same index.
pub const DEFAULT_SEED: u64 = 42;

const MAGIC: [u8; 4] = *b"TMBR";
const FORMAT_VERSION: u32 = 1;

/// Approximate nearest-neighbor index over fixed-length feature vectors,
/// using angular distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    n_features: usize,
    seed: u64,
    items: BTreeMap<IndexPosition, Vec<f32>>,
    forest: Option<Forest>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    magic: [u8; 4],
    version: u32,
    index: &'a VectorIndex,
}

#[derive(Deserialize)]
struct IndexFile {
    magic: [u8; 4],
    version: u32,
    index: VectorIndex,
}

impl VectorIndex {
    /// Create an empty index for vectors of exactly `n_features` values.
    pub fn create(n_features: usize) -> IndexResult<Self> {
        if n_features == 0 {
            return Err(IndexError::InvalidArgument(
                "n_features must be positive".to_string(),
            ));
        }
        Ok(Self {
            n_features,
            seed: DEFAULT_SEED,
            items: BTreeMap::new(),
            forest: None,
        })
    }

    /// Use a different seed for tree construction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.forest.is_some()
    }

    #[must_use]
    pub fn contains(&self, position: IndexPosition) -> bool {
        self.items.contains_key(&position)
    }

    /// Number of trees, or 0 before build.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.forest.as_ref().map_or(0, Forest::tree_count)
    }

    /// Positions of every inserted vector, ascending.
    pub fn positions(&self) -> impl Iterator<Item = IndexPosition> + '_ {
        self.items.keys().copied()
    }

    /// Add one vector. Only valid before [`Self::build`].
    pub fn insert(&mut self, position: IndexPosition, vector: &FeatureVector) -> IndexResult<()> {
        if self.is_built() {
            return Err(IndexError::AlreadyBuilt);
        }
        if vector.len() != self.n_features {
            return Err(IndexError::DimensionMismatch {
                expected: self.n_features,
                actual: vector.len(),
            });
        }
        if self.items.contains_key(&position) {
            return Err(IndexError::DuplicatePosition(position));
        }

        let values = vector.as_slice().iter().map(|&v| v as f32).collect();
        self.items.insert(position, values);
        Ok(())
    }

    /// Freeze the index into `tree_count` random-projection trees.
    ///
    /// More trees give better recall at the cost of memory and build time;
    /// they never change which positions are valid.
    pub fn build(&mut self, tree_count: usize) -> IndexResult<()> {
        if self.is_built() {
            return Err(IndexError::AlreadyBuilt);
        }
        if tree_count == 0 {
            return Err(IndexError::InvalidArgument(
                "tree_count must be positive".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let forest = Forest::build(&self.items, tree_count, self.n_features + 2, &mut rng);
        log::debug!(
            "Built index: {} vectors, {} trees, {} nodes",
            self.items.len(),
            forest.tree_count(),
            forest.node_count()
        );
        self.forest = Some(forest);
        Ok(())
    }

    /// Up to `k` positions nearest to `position`, closest first.
    ///
    /// The query position itself is normally the first result.
    pub fn query(&self, position: IndexPosition, k: usize) -> IndexResult<Vec<IndexPosition>> {
        Ok(self
            .query_with_distances(position, k)?
            .into_iter()
            .map(|(position, _)| position)
            .collect())
    }

    /// Like [`Self::query`], paired with each result's angular distance.
    pub fn query_with_distances(
        &self,
        position: IndexPosition,
        k: usize,
    ) -> IndexResult<Vec<(IndexPosition, f32)>> {
        if k == 0 {
            return Err(IndexError::InvalidArgument("k must be positive".to_string()));
        }
        let vector = self
            .items
            .get(&position)
            .ok_or(IndexError::NotFound(position))?;
        let forest = self.forest.as_ref().ok_or(IndexError::NotBuilt)?;

        let search_k = k.saturating_mul(forest.tree_count()).max(k);
        let mut scored: Vec<(IndexPosition, f32)> = forest
            .candidates(&normalized(vector), search_k)
            .into_iter()
            .map(|candidate| (candidate, self.distance_from(position, vector, candidate)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Exact angular distance between two inserted vectors.
    pub fn distance(&self, a: IndexPosition, b: IndexPosition) -> IndexResult<f32> {
        let va = self.items.get(&a).ok_or(IndexError::NotFound(a))?;
        if !self.items.contains_key(&b) {
            return Err(IndexError::NotFound(b));
        }
        Ok(self.distance_from(a, va, b))
    }

    // An item is at distance exactly 0 from itself; float rounding in the
    // cosine would otherwise let a same-direction neighbour sort first.
    fn distance_from(&self, origin: IndexPosition, vector: &[f32], other: IndexPosition) -> f32 {
        if origin == other {
            0.0
        } else {
            angular(vector, &self.items[&other])
        }
    }

    /// Write the built index to a binary file.
    pub fn save(&self, path: &Path) -> IndexResult<()> {
        if !self.is_built() {
            return Err(IndexError::NotBuilt);
        }

        let file = File::create(path).map_err(|e| IndexError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(
            &mut writer,
            &IndexFileRef {
                magic: MAGIC,
                version: FORMAT_VERSION,
                index: self,
            },
        )?;
        writer.flush().map_err(|e| IndexError::io(path, e))?;

        log::debug!("Saved index with {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Read an index written by [`Self::save`].
    ///
    /// `n_features` must match the value the index was created with.
    pub fn load(path: &Path, n_features: usize) -> IndexResult<Self> {
        let file = File::open(path).map_err(|e| IndexError::io(path, e))?;
        let IndexFile {
            magic,
            version,
            index,
        } = bincode::deserialize_from(BufReader::new(file))?;

        if magic != MAGIC {
            return Err(IndexError::InvalidArgument(format!(
                "{} is not an index file",
                path.display()
            )));
        }
        if version != FORMAT_VERSION {
            return Err(IndexError::InvalidArgument(format!(
                "unsupported index format version {version} in {}",
                path.display()
            )));
        }
        if index.n_features != n_features {
            return Err(IndexError::DimensionMismatch {
                expected: n_features,
                actual: index.n_features,
            });
        }
        if !index.is_built() {
            return Err(IndexError::NotBuilt);
        }

        log::debug!("Loaded index with {} vectors from {}", index.len(), path.display());
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn pos(n: u32) -> IndexPosition {
        IndexPosition::new(n)
    }

    fn fv(values: &[i64]) -> FeatureVector {
        FeatureVector::new(values.to_vec())
    }

    fn random_index(count: u32, dims: usize, seed: u64) -> VectorIndex {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut index = VectorIndex::create(dims).unwrap();
        for i in 0..count {
            let values: Vec<i64> = (0..dims).map(|_| rng.gen_range(-1000..1000)).collect();
            index.insert(pos(i), &FeatureVector::new(values)).unwrap();
        }
        index.build(DEFAULT_TREE_COUNT).unwrap();
        index
    }

    #[test]
    fn test_create_rejects_zero_features() {
        assert!(matches!(
            VectorIndex::create(0),
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_insert_wrong_length_fails() {
        let mut index = VectorIndex::create(3).unwrap();
        let short = index.insert(pos(0), &fv(&[1, 2])).unwrap_err();
        assert!(matches!(
            short,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        let long = index.insert(pos(0), &fv(&[1, 2, 3, 4])).unwrap_err();
        assert!(matches!(long, IndexError::DimensionMismatch { actual: 4, .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn test_insert_duplicate_position_fails() {
        let mut index = VectorIndex::create(2).unwrap();
        index.insert(pos(0), &fv(&[1, 0])).unwrap();
        let err = index.insert(pos(0), &fv(&[0, 1])).unwrap_err();
        assert!(matches!(err, IndexError::DuplicatePosition(p) if p == pos(0)));
    }

    #[test]
    fn test_insert_after_build_fails() {
        let mut index = VectorIndex::create(2).unwrap();
        index.build(1).unwrap();
        assert!(matches!(
            index.insert(pos(0), &fv(&[1, 0])),
            Err(IndexError::AlreadyBuilt)
        ));
    }

    #[test]
    fn test_build_twice_fails() {
        let mut index = VectorIndex::create(2).unwrap();
        index.build(2).unwrap();
        assert!(matches!(index.build(2), Err(IndexError::AlreadyBuilt)));
    }

    #[test]
    fn test_build_rejects_zero_trees() {
        let mut index = VectorIndex::create(2).unwrap();
        assert!(matches!(index.build(0), Err(IndexError::InvalidArgument(_))));
        assert!(!index.is_built());
    }

    #[test]
    fn test_query_before_build_fails() {
        let mut index = VectorIndex::create(2).unwrap();
        index.insert(pos(0), &fv(&[1, 0])).unwrap();
        assert!(matches!(index.query(pos(0), 1), Err(IndexError::NotBuilt)));
    }

    #[test]
    fn test_query_unknown_position_is_not_found() {
        let index = random_index(10, 4, 1);
        let err = index.query(pos(99), 3).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_query_zero_k_fails() {
        let index = random_index(10, 4, 1);
        assert!(matches!(index.query(pos(0), 0), Err(IndexError::InvalidArgument(_))));
    }

    #[test]
    fn test_query_orders_by_angle() {
        let mut index = VectorIndex::create(2).unwrap();
        index.insert(pos(0), &fv(&[1000, 0])).unwrap();
        index.insert(pos(1), &fv(&[0, 1000])).unwrap();
        index.insert(pos(2), &fv(&[1000, 100])).unwrap();
        index.insert(pos(3), &fv(&[500, 500])).unwrap();
        index.build(DEFAULT_TREE_COUNT).unwrap();

        let result = index.query(pos(0), 4).unwrap();
        assert_eq!(result, vec![pos(0), pos(2), pos(3), pos(1)]);

        let with_distances = index.query_with_distances(pos(0), 2).unwrap();
        assert!(with_distances[0].1.abs() < 1e-6);
        assert!((with_distances[1].1 - index.distance(pos(0), pos(2)).unwrap()).abs() < 1e-6);
    }

    #[test]
    fn test_query_ignores_magnitude() {
        let mut index = VectorIndex::create(2).unwrap();
        index.insert(pos(0), &fv(&[1, 1])).unwrap();
        index.insert(pos(1), &fv(&[900, 1000])).unwrap();
        index.insert(pos(2), &fv(&[1000, 1000])).unwrap();
        index.build(3).unwrap();

        assert_eq!(index.query(pos(0), 2).unwrap(), vec![pos(0), pos(2)]);
    }

    #[test]
    fn test_query_returns_fewer_than_k_for_small_index() {
        let mut index = VectorIndex::create(2).unwrap();
        index.insert(pos(0), &fv(&[1, 0])).unwrap();
        index.insert(pos(1), &fv(&[0, 1])).unwrap();
        index.build(2).unwrap();
        assert_eq!(index.query(pos(1), 5).unwrap().len(), 2);
    }

    #[test]
    fn test_query_is_deterministic() {
        let index = random_index(300, 13, 5);
        for p in [0, 17, 150, 299] {
            assert_eq!(index.query(pos(p), 5).unwrap(), index.query(pos(p), 5).unwrap());
        }
    }

    #[test]
    fn test_same_seed_builds_same_index() {
        assert_eq!(random_index(120, 6, 9), random_index(120, 6, 9));
    }

    #[test]
    fn test_query_recall_against_brute_force() {
        let index = random_index(400, 4, 21);
        let mut hits = 0;
        let mut total = 0;
        for p in (0..400).step_by(20) {
            let mut exact: Vec<(IndexPosition, f32)> = index
                .positions()
                .map(|other| (other, index.distance(pos(p), other).unwrap()))
                .collect();
            exact.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            let truth: HashSet<IndexPosition> = exact.iter().take(5).map(|(p, _)| *p).collect();

            let approx = index.query(pos(p), 5).unwrap();
            hits += approx.iter().filter(|p| truth.contains(p)).count();
            total += 5;
        }
        assert!(hits * 2 >= total, "recall too low: {hits}/{total}");
    }

    #[test]
    fn test_save_and_load_answer_identically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.ann");
        let index = random_index(250, 13, 3);
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path, 13).unwrap();
        assert_eq!(loaded.len(), 250);
        for p in index.positions() {
            assert_eq!(index.query(p, 5).unwrap(), loaded.query(p, 5).unwrap());
        }
    }

    #[test]
    fn test_load_with_wrong_dimension_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.ann");
        random_index(5, 4, 0).save(&path).unwrap();

        let err = VectorIndex::load(&path, 13).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 13,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_save_before_build_fails() {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::create(3).unwrap();
        assert!(matches!(
            index.save(&dir.path().join("x.ann")),
            Err(IndexError::NotBuilt)
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = VectorIndex::load(&dir.path().join("absent.ann"), 3).unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
    }

    #[test]
    fn test_empty_index_builds_saves_and_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.ann");

        let mut index = VectorIndex::create(13).unwrap();
        index.build(DEFAULT_TREE_COUNT).unwrap();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path, 13).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.is_built());
        assert!(loaded.query(pos(0), 5).unwrap_err().is_not_found());
    }

    mod proptest_index {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Results never repeat a position and never exceed k.
            #[test]
            fn query_results_are_distinct_and_bounded(
                vectors in proptest::collection::vec(
                    proptest::collection::vec(-5000i64..5000, 6), 1..80),
                k in 1usize..12,
                trees in 1usize..6,
            ) {
                let mut index = VectorIndex::create(6).unwrap();
                for (i, values) in vectors.iter().enumerate() {
                    index.insert(pos(i as u32), &FeatureVector::new(values.clone())).unwrap();
                }
                index.build(trees).unwrap();

                for p in index.positions().collect::<Vec<_>>() {
                    let result = index.query_with_distances(p, k).unwrap();
                    prop_assert!(result.len() <= k);
                    let unique: HashSet<IndexPosition> = result.iter().map(|(p, _)| *p).collect();
                    prop_assert_eq!(unique.len(), result.len());
                    prop_assert!(result.windows(2).all(|w| w[0].1 <= w[1].1));
                }
            }
        }
    }
}
