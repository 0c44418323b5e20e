//! Topic catalog: canonical topic names with fuzzy resolution
//!
//! Incoming topic strings are normalized against a growing set of canonical
//! names so that near-duplicate spellings (typos, casing, whitespace) collapse
//! onto the same topic rather than fragmenting the catalog.

mod catalog;
mod levenshtein;

pub use catalog::{TopicCatalog, TopicNode};
