use std::path::PathBuf;

use thiserror::Error;
use timbre_core::IndexPosition;

/// Errors raised by the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector's length disagrees with the index configuration.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The position was already inserted into this index.
    #[error("position already inserted: {0}")]
    DuplicatePosition(IndexPosition),

    /// The position was never inserted into this index.
    #[error("position not found: {0}")]
    NotFound(IndexPosition),

    /// Insert or build was called on an index that is already built.
    #[error("index is already built")]
    AlreadyBuilt,

    /// Query or save was called before build.
    #[error("index has not been built")]
    NotBuilt,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("index encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl IndexError {
    /// Returns `true` when the error only means "no such position".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = std::result::Result<T, IndexError>;
