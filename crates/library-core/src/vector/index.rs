//! Linear-scan cosine similarity index

use std::collections::HashMap;

use crate::volume::{cosine_similarity, Lookup, ScoreComponents, Volume, MAGNITUDE_TOLERANCE};

/// Errors raised by [`VectorIndex::put`] and [`VectorIndex::search`].
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VectorIndexError {
    /// Magnitude deviates from 1.0 by more than [`MAGNITUDE_TOLERANCE`].
    #[error("invalid vector: {0}")]
    InvalidVector(String),
    /// Embedding dimension differs from the dimension of the first
    /// volume ever inserted into this index.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// In-memory store of volumes, ranked by cosine similarity on demand.
#[derive(Debug, Default)]
pub struct VectorIndex {
    volumes: HashMap<String, Volume>,
    dimension: Option<usize>,
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a volume.
    ///
    /// Fails with [`VectorIndexError::DimensionMismatch`] if the embedding
    /// dimension differs from the first inserted volume's, or
    /// [`VectorIndexError::InvalidVector`] if the magnitude deviates from 1
    /// by more than [`MAGNITUDE_TOLERANCE`].
    pub fn put(&mut self, volume: Volume) -> Result<(), VectorIndexError> {
        let dim = volume.embedding.len();

        if !volume.has_unit_embedding() {
            return Err(VectorIndexError::InvalidVector(format!(
                "magnitude {:.6} deviates from 1.0 by more than {MAGNITUDE_TOLERANCE}",
                volume.magnitude()
            )));
        }

        match self.dimension {
            Some(expected) if expected != dim => {
                return Err(VectorIndexError::DimensionMismatch { expected, got: dim });
            }
            None => self.dimension = Some(dim),
            _ => {}
        }

        self.volumes.insert(volume.id.clone(), volume);
        Ok(())
    }

    /// Insert a volume without validating its magnitude or dimension,
    /// trusting the caller (restore from a snapshot that was valid when
    /// written).
    pub(crate) fn insert_raw(&mut self, volume: Volume) {
        if self.dimension.is_none() {
            self.dimension = Some(volume.embedding.len());
        }
        self.volumes.insert(volume.id.clone(), volume);
    }

    /// Look up a volume by id.
    pub fn get(&self, id: &str) -> Option<&Volume> {
        self.volumes.get(id)
    }

    /// Mutable lookup, used to bump access bookkeeping after a search hit.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Volume> {
        self.volumes.get_mut(id)
    }

    /// Remove a volume, returning it if it existed.
    pub fn remove(&mut self, id: &str) -> Option<Volume> {
        let removed = self.volumes.remove(id);
        if self.volumes.is_empty() {
            self.dimension = None;
        }
        removed
    }

    /// All ids currently stored, in arbitrary order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.volumes.keys().map(String::as_str)
    }

    /// Number of volumes stored.
    pub fn size(&self) -> usize {
        self.volumes.len()
    }

    /// Embedding dimension of this index, if any volume has been inserted.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Rank every volume by cosine similarity to `query_vector`, dropping
    /// those below `min_similarity`, breaking ties by more recent
    /// `created_at`, and returning the top `max_results`.
    ///
    /// An empty, whitespace-only (zero-length), or zero-magnitude query
    /// yields an empty result set without error.
    pub fn search(&self, query_vector: &[f32], max_results: usize, min_similarity: f32) -> Vec<Lookup> {
        if query_vector.is_empty() || query_vector.iter().all(|x| *x == 0.0) {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &Volume)> = self
            .volumes
            .values()
            .map(|v| (cosine_similarity(query_vector, &v.embedding), v))
            .filter(|(score, _)| *score >= min_similarity)
            .collect();

        scored.sort_by(|(score_a, vol_a), (score_b, vol_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| vol_b.created_at.cmp(&vol_a.created_at))
        });

        scored
            .into_iter()
            .take(max_results)
            .map(|(score, v)| Lookup {
                volume: v.clone(),
                score,
                components: ScoreComponents {
                    vector: Some(score),
                    ..Default::default()
                },
            })
            .collect()
    }

    /// All volumes, for callers (e.g. `Stacks`) that need to iterate the
    /// full set without going through `search`.
    pub fn iter(&self) -> impl Iterator<Item = &Volume> {
        self.volumes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn unit(id: &str, dims: usize, lead: f32) -> Volume {
        let mut v = vec![0.0; dims];
        v[0] = lead;
        let rest = (1.0 - lead * lead).max(0.0).sqrt();
        if dims > 1 {
            v[1] = rest;
        }
        Volume::new(id, format!("text-{id}"), v, BTreeMap::new())
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let mut idx = VectorIndex::new();
        idx.put(unit("a", 3, 1.0)).unwrap();
        let err = idx.put(unit("b", 4, 1.0)).unwrap_err();
        assert!(matches!(err, VectorIndexError::DimensionMismatch { .. }));
    }

    #[test]
    fn rejects_non_unit_magnitude() {
        let mut idx = VectorIndex::new();
        let mut v = unit("a", 2, 1.0);
        v.embedding = vec![2.0, 0.0];
        assert!(matches!(
            idx.put(v),
            Err(VectorIndexError::InvalidVector(_))
        ));
    }

    #[test]
    fn search_orders_by_similarity_then_recency() {
        let mut idx = VectorIndex::new();
        idx.put(unit("a", 2, 1.0)).unwrap();
        idx.put(unit("b", 2, 0.0)).unwrap();
        let results = idx.search(&[1.0, 0.0], 10, 0.0);
        assert_eq!(results[0].volume.id, "a");
    }

    #[test]
    fn search_respects_min_similarity() {
        let mut idx = VectorIndex::new();
        idx.put(unit("a", 2, 1.0)).unwrap();
        idx.put(unit("b", 2, 0.0)).unwrap();
        let results = idx.search(&[1.0, 0.0], 10, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].volume.id, "a");
    }

    #[test]
    fn zero_magnitude_query_returns_empty() {
        let mut idx = VectorIndex::new();
        idx.put(unit("a", 2, 1.0)).unwrap();
        assert!(idx.search(&[0.0, 0.0], 10, 0.0).is_empty());
        assert!(idx.search(&[], 10, 0.0).is_empty());
    }

    #[test]
    fn remove_resets_dimension_when_empty() {
        let mut idx = VectorIndex::new();
        idx.put(unit("a", 2, 1.0)).unwrap();
        idx.remove("a");
        assert_eq!(idx.dimension(), None);
        // A different dimension is now accepted since the index is empty.
        idx.put(unit("b", 3, 1.0)).unwrap();
        assert_eq!(idx.dimension(), Some(3));
    }
}
