//! Vector search for timbre.
//!
//! An angular approximate-nearest-neighbor index built from a forest of
//! random-projection trees. The index is filled once, built once, and
//! then frozen; adding a track means rebuilding from scratch.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod distance;
pub mod error;
mod forest;
pub mod index;

pub use error::{IndexError, IndexResult};
pub use index::{VectorIndex, DEFAULT_NEIGHBOURS, DEFAULT_SEED, DEFAULT_TREE_COUNT};
