//! Library ingestion and similarity queries for timbre.
//!
//! Pulls a user's saved tracks from the catalog, hydrates their audio
//! features, builds the vector index, persists everything as a library
//! directory, and answers "tracks similar to X" from that directory.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod library;
pub mod resilience;
pub mod similar;
pub mod source;
pub mod spotify;

pub use config::Config;
pub use error::{IngestError, LibraryError, QueryError, SourceError, SourceResult};
pub use ingest::{ingest, ingest_into, IngestOptions, IngestReport, LibraryIngest};
pub use library::{LibrarySnapshot, LibraryStore};
pub use similar::{similar_tracks_events, SimilarityService};
pub use source::{CatalogSource, SavedPage};
pub use spotify::SpotifyClient;
