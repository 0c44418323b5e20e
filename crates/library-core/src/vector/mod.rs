//! Vector index: cosine-similarity storage and ranked search
//!
//! Owns the in-memory map of [`crate::volume::Volume`]s keyed by identifier.
//! Performs a linear cosine-similarity scan and returns ranked
//! [`crate::volume::Lookup`]s. Per spec §1 Non-goals, no approximate
//! nearest-neighbor index is used — a linear scan is sufficient at the
//! target scale (<100k volumes).

mod index;
mod snapshot;

pub use index::{VectorIndex, VectorIndexError};
