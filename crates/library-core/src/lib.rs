//! Library Core: a content-addressed semantic storage engine.
//!
//! Ingests free-form text, embeds it into vector space, organizes it under
//! a hierarchical topic catalog, and supports hybrid (semantic + graph +
//! recency + frequency) retrieval. Detects near-duplicates, compacts and
//! reorganizes itself through pluggable text-generation "librarians", and
//! adapts its ranking to observed user behavior.
//!
//! This crate consumes two capabilities injected by the host application —
//! an [`provider::EmbeddingProvider`] (text → unit vectors) and a
//! [`provider::TextGenerationProvider`] (prompt → string) — and exposes its
//! own API to the rest of the system. It does not render a UI, parse
//! command-line arguments, dispatch slash commands, or speak any wire
//! protocol; those are the host's job.
//!
//! # Layering
//!
//! - [`vector`] — in-memory cosine-similarity index over [`volume::Volume`]s.
//! - [`graph`] — typed edges between volume ids, neighbor/traversal queries.
//! - [`topic`] — canonical topic names with fuzzy (Levenshtein) resolution.
//! - [`storage`] — pluggable byte-map persistence.
//! - [`learning`] — query/feedback-driven relevance, interest, and ranking weights.
//! - [`stacks`] — the single writer façade over all of the above.
//! - [`library`] — the user-facing API: embeds text, drives hybrid search and compendia.
//! - [`librarian`] — named policies that own topic scopes and implement
//!   extraction/summarization/reorganization/optimization by prompting.
//! - [`circulation`] — the background job scheduler that drives librarians.

pub mod circulation;
pub mod error;
pub mod graph;
pub mod learning;
pub mod librarian;
pub mod library;
pub mod provider;
pub mod stacks;
pub mod storage;
pub mod topic;
pub mod vector;
pub mod volume;

pub use circulation::{CirculationConfig, CirculationDesk, Job, VolumeSink};
pub use error::{LibraryError, Result};
pub use library::{AdvancedSearchQuery, BoostConfig, CompendiumResult, Library, TextMode, TopicFilter};
pub use librarian::{LibrarianDefinition, LibrarianRegistry, Permissions, Thresholds};
pub use provider::{EmbeddingProvider, ProviderError, TextGenerationProvider};
pub use stacks::{DuplicateBehavior, DuplicatePolicy, Stacks, StacksConfig, StackEvent};
pub use storage::{FileStorageBackend, MemoryStorageBackend, StorageBackend};
pub use volume::{Lookup, ScoreComponents, Volume};
