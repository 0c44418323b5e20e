//! Volume — the fundamental unit of storage
//!
//! A [`Volume`] is a piece of free-form text together with its embedding,
//! metadata, and access bookkeeping. Volumes are created by `Stacks::add`,
//! mutated only through explicit updates (metadata, access counter,
//! last-access), and destroyed by `delete`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum allowed deviation from unit magnitude for an embedding vector.
pub const MAGNITUDE_TOLERANCE: f32 = 1e-3;

/// Reserved metadata key holding a volume's canonical topic.
pub const META_TOPIC: &str = "topic";
/// Reserved metadata key holding comma-separated free-form tags.
pub const META_TAGS: &str = "tags";
/// Reserved metadata key holding the entry type (`fact`, `note`, `compendium`, ...).
pub const META_ENTRY_TYPE: &str = "entryType";
/// Reserved metadata key naming the librarian that owned the insertion.
pub const META_LIBRARIAN: &str = "librarian";
/// Prefix for metadata keys that encode a graph edge, e.g. `rel:related:<id>`.
pub const META_REL_PREFIX: &str = "rel:";

/// A stored text unit with an embedding, metadata, and timestamps.
///
/// Invariant: `embedding` has magnitude `1.0 ± 1e-3`. Construction through
/// [`Volume::new`] does not itself enforce this — `VectorIndex::put` is the
/// authoritative check, per spec §4.1.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Stable, opaque identifier.
    pub id: String,
    /// Original text.
    pub text: String,
    /// Unit-length embedding vector.
    pub embedding: Vec<f32>,
    /// Metadata mapping. Reserved keys: `topic`, `tags`, `entryType`,
    /// `librarian`, `rel:*`. Sorted for deterministic snapshotting.
    pub metadata: BTreeMap<String, String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Number of times this volume has been returned by a search.
    pub access_count: u64,
    /// Timestamp of the most recent access.
    pub last_accessed_at: DateTime<Utc>,
}

impl Volume {
    /// Construct a new volume. Does not validate the embedding's magnitude;
    /// callers normalize before insertion and `VectorIndex::put` enforces it.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            metadata,
            created_at: now,
            access_count: 0,
            last_accessed_at: now,
        }
    }

    /// The volume's canonical (or pre-canonical, before catalog resolution)
    /// topic, if set.
    pub fn topic(&self) -> Option<&str> {
        self.metadata.get(META_TOPIC).map(String::as_str)
    }

    /// Comma-separated tags, split and trimmed.
    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .get(META_TAGS)
            .map(|t| t.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// The entry type, defaulting to `"fact"` when unset.
    pub fn entry_type(&self) -> &str {
        self.metadata
            .get(META_ENTRY_TYPE)
            .map(String::as_str)
            .unwrap_or("fact")
    }

    /// Name of the librarian that owned this volume's insertion, if recorded.
    pub fn librarian(&self) -> Option<&str> {
        self.metadata.get(META_LIBRARIAN).map(String::as_str)
    }

    /// Iterate the volume's `rel:*` metadata entries as `(type_str, target_id)`.
    pub fn relation_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata.iter().filter_map(|(k, v)| {
            k.strip_prefix(META_REL_PREFIX)
                .and_then(|rest| rest.split_once(':'))
                .map(|(ty, _)| (ty, v.as_str()))
        })
    }

    /// Record an access: bumps the counter and timestamp.
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Utc::now();
    }

    /// Euclidean magnitude of the embedding vector.
    pub fn magnitude(&self) -> f32 {
        self.embedding.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Whether the embedding's magnitude is within tolerance of 1.0.
    pub fn has_unit_embedding(&self) -> bool {
        (self.magnitude() - 1.0).abs() <= MAGNITUDE_TOLERANCE
    }
}

/// Component scores contributing to a [`Lookup`]'s total.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Cosine similarity against the query vector.
    pub vector: Option<f32>,
    /// Recency-derived component.
    pub recency: Option<f32>,
    /// Frequency (access-count derived) component.
    pub frequency: Option<f32>,
    /// Additive bonus from neighboring volumes in the knowledge graph.
    pub graph_boost: Option<f32>,
    /// Additive bonus from the learning engine's interest model.
    pub learning_boost: Option<f32>,
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lookup {
    /// The matched volume.
    pub volume: Volume,
    /// Total score (vector similarity plus any enabled boosts).
    pub score: f32,
    /// Breakdown of `score` into its contributing components.
    pub components: ScoreComponents,
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` for
/// mismatched lengths or zero-magnitude inputs rather than erroring —
/// callers that need strictness check dimensions up front.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_embedding_detects_drift() {
        let v = Volume::new("a", "hello", vec![1.0, 0.0, 0.0], BTreeMap::new());
        assert!(v.has_unit_embedding());

        let v2 = Volume::new("b", "hello", vec![2.0, 0.0, 0.0], BTreeMap::new());
        assert!(!v2.has_unit_embedding());
    }

    #[test]
    fn metadata_accessors() {
        let mut meta = BTreeMap::new();
        meta.insert("topic".to_string(), "programming".to_string());
        meta.insert("tags".to_string(), "rust, async ".to_string());
        let v = Volume::new("a", "text", vec![1.0], meta);
        assert_eq!(v.topic(), Some("programming"));
        assert_eq!(v.tags(), vec!["rust", "async"]);
        assert_eq!(v.entry_type(), "fact");
    }

    #[test]
    fn relation_entries_parse_rel_keys() {
        let mut meta = BTreeMap::new();
        meta.insert("rel:parent:abc-123".to_string(), "abc-123".to_string());
        meta.insert("topic".to_string(), "x".to_string());
        let v = Volume::new("a", "text", vec![1.0], meta);
        let rels: Vec<_> = v.relation_entries().collect();
        assert_eq!(rels, vec![("parent", "abc-123")]);
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![0.6, 0.8];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
