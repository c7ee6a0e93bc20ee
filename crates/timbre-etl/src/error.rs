//! Error types for ingestion, persistence, and queries.

use std::path::PathBuf;

use thiserror::Error;
use timbre_search::IndexError;

/// Errors raised by a catalog source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source answered with an unexpected HTTP status.
    #[error("HTTP error from {source_name}: {message}")]
    Http {
        source_name: String,
        status: u16,
        message: String,
    },

    /// The access token was rejected.
    #[error("{source_name} rejected the access token")]
    Unauthorized { source_name: String },

    /// The source returned a rate-limit response.
    #[error("rate limited by {source_name}")]
    RateLimited { source_name: String },

    /// The requested entity does not exist at the source.
    #[error("not found: {entity} at {source_name}")]
    NotFound { entity: String, source_name: String },

    /// A response could not be parsed.
    #[error("parse error from {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// An error propagated from `reqwest`.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl SourceError {
    /// Returns `true` when the error is transient and the request may
    /// succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` when the error indicates the entity was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias for source results.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Listing the saved library failed; no index is built from a
    /// partial listing.
    #[error("listing saved items failed at offset {offset}: {source}")]
    Listing {
        offset: usize,
        #[source]
        source: SourceError,
    },

    /// An ID or position was bound twice in one run.
    #[error("identifier bridge error: {0}")]
    Bridge(#[from] timbre_core::Error),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] LibraryError),
}

/// Errors reading or writing a library directory.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("no library found in {}; run an ingest first", .0.display())]
    Missing(PathBuf),

    /// The library was ingested with a different number of features than
    /// the configured schema declares.
    #[error(
        "library in {} was ingested with {stored} features but the configured schema has {configured}; run `timbre ingest` again",
        .dir.display()
    )]
    SchemaChanged {
        dir: PathBuf,
        stored: usize,
        configured: usize,
    },

    #[error("library data error: {0}")]
    Data(#[from] timbre_core::Error),

    #[error("library index error: {0}")]
    Index(#[from] IndexError),
}

/// Errors from a similarity query other than "not found".
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("vector index error: {0}")]
    Index(#[from] IndexError),

    #[error("identifier bridge error: {0}")]
    Bridge(#[from] timbre_core::Error),
}
