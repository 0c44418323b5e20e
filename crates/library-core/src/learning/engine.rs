//! Operations over [`crate::learning::state::LearningState`]

use std::collections::HashSet;

use chrono::Utc;

use crate::error::LibraryError;
use crate::volume::cosine_similarity;

use super::state::{
    pair_key, split_pair_key, LearningState, Profile, RelevanceRecord, DEFAULT_WEIGHTS,
    MIN_QUERIES_FOR_SCOPE, WEIGHT_MAX, WEIGHT_MIN,
};
pub use super::state::{AdaptedWeights, RelevanceFeedback};

/// Upper bound a [`Self::compute_boost`] result can reach.
const MAX_BOOST: f32 = 0.3;
/// Weight of an implicit touch relative to explicit feedback in
/// [`Self::get_relevance_feedback`].
const IMPLICIT_WEIGHT: f32 = 0.3;
const EXPLICIT_WEIGHT: f32 = 1.5;

/// Records query and feedback history and turns it into relevance scores,
/// interest embeddings, and adapted ranking weights.
#[derive(Debug, Default)]
pub struct LearningEngine {
    state: LearningState,
}

impl LearningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query: updates the global (and, if given, per-topic)
    /// interest-embedding accumulator via an exponential moving average,
    /// increments query counts, bumps co-appearance counts for every pair
    /// within `result_ids`, and bumps an implicit-touch counter on each id.
    pub fn record_query(&mut self, query_vector: &[f32], result_ids: &[String], topic: Option<&str>) {
        self.state.global.accumulate(query_vector);
        if let Some(topic) = topic {
            self.state
                .topics
                .entry(topic.to_string())
                .or_default()
                .accumulate(query_vector);
        }

        let now = Utc::now();
        for id in result_ids {
            let record = self.state.global.relevance.entry(id.clone()).or_default();
            record.implicit += 1;
            record.last_touched = Some(now);

            if let Some(topic) = topic {
                let record = self
                    .state
                    .topics
                    .entry(topic.to_string())
                    .or_default()
                    .relevance
                    .entry(id.clone())
                    .or_default();
                record.implicit += 1;
                record.last_touched = Some(now);
            }
        }

        for i in 0..result_ids.len() {
            for j in (i + 1)..result_ids.len() {
                if result_ids[i] == result_ids[j] {
                    continue;
                }
                *self
                    .state
                    .co_appearance
                    .entry(pair_key(&result_ids[i], &result_ids[j]))
                    .or_insert(0) += 1;
            }
        }
    }

    /// Record explicit feedback on the global profile's relevance record
    /// for `entry_id`.
    pub fn record_feedback(&mut self, entry_id: &str, positive: bool) {
        let record = self
            .state
            .global
            .relevance
            .entry(entry_id.to_string())
            .or_default();
        if positive {
            record.positive += 1;
        } else {
            record.negative += 1;
        }
        record.last_touched = Some(Utc::now());
    }

    /// `tanh(0.3·implicit + 1.5·positive − 1.5·negative)`, or `None` if
    /// nothing has ever been recorded for `entry_id`.
    pub fn get_relevance_feedback(&self, entry_id: &str) -> Option<RelevanceFeedback> {
        let record = self.state.global.relevance.get(entry_id)?;
        Some(relevance_feedback(record))
    }

    /// Entries that have co-appeared with `entry_id`, sorted by strength
    /// descending.
    pub fn get_correlated_entries(&self, entry_id: &str) -> Vec<(String, f32)> {
        let mut correlated: Vec<(String, f32)> = self
            .state
            .co_appearance
            .iter()
            .filter_map(|(key, count)| {
                let (a, b) = split_pair_key(key)?;
                if a == entry_id {
                    Some((b.to_string(), *count as f32))
                } else if b == entry_id {
                    Some((a.to_string(), *count as f32))
                } else {
                    None
                }
            })
            .collect();
        correlated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        correlated
    }

    /// The accumulated interest vector (renormalized to unit length) for
    /// `topic`, or the global one if `topic` is `None`. `None` below 10
    /// queries observed at that scope.
    pub fn get_interest_embedding(&self, topic: Option<&str>) -> Option<Vec<f32>> {
        match topic {
            Some(topic) => self.state.topics.get(topic)?.renormalized_interest(),
            None => self.state.global.renormalized_interest(),
        }
    }

    /// `{vector, recency, frequency}` weights for the ranker at `topic`,
    /// falling back to the global profile and then to
    /// `{0.6, 0.2, 0.2}` defaults below 10 queries at the requested scope.
    pub fn get_adapted_weights(&self, topic: Option<&str>) -> AdaptedWeights {
        let scoped = topic.and_then(|t| self.state.topics.get(t));
        match scoped {
            Some(profile) if profile.query_count >= MIN_QUERIES_FOR_SCOPE => adapt(profile),
            _ => {
                if self.state.global.query_count >= MIN_QUERIES_FOR_SCOPE {
                    adapt(&self.state.global)
                } else {
                    DEFAULT_WEIGHTS
                }
            }
        }
    }

    /// Cosine similarity between `entry_vector` and the topic (or global)
    /// interest embedding, scaled into `[0, 0.3]`.
    pub fn compute_boost(&self, _entry_id: &str, entry_vector: &[f32], topic: Option<&str>) -> f32 {
        let interest = match self.get_interest_embedding(topic) {
            Some(vector) => vector,
            None => return 0.0,
        };
        if interest.len() != entry_vector.len() {
            return 0.0;
        }
        let cos = cosine_similarity(entry_vector, &interest);
        (cos.max(0.0) * MAX_BOOST).min(MAX_BOOST)
    }

    /// Drop relevance records and correlation entries not referencing an
    /// id in `keep_set`.
    pub fn prune_entries(&mut self, keep_set: &HashSet<String>) {
        self.state.global.relevance.retain(|id, _| keep_set.contains(id));
        for profile in self.state.topics.values_mut() {
            profile.relevance.retain(|id, _| keep_set.contains(id));
        }
        self.state.co_appearance.retain(|key, _| {
            split_pair_key(key)
                .map(|(a, b)| keep_set.contains(a) && keep_set.contains(b))
                .unwrap_or(false)
        });
    }

    /// Serialize the full learning state to bytes.
    pub fn snapshot(&self) -> Vec<u8> {
        serde_json::to_vec(&self.state).expect("LearningState serialization is infallible")
    }

    /// Replace the current state with one restored from [`Self::snapshot`].
    pub fn restore(bytes: &[u8]) -> Result<Self, LibraryError> {
        let state: LearningState = serde_json::from_slice(bytes)
            .map_err(|e| LibraryError::Corrupt(format!("learning snapshot: {e}")))?;
        Ok(Self { state })
    }
}

fn relevance_feedback(record: &RelevanceRecord) -> RelevanceFeedback {
    let raw = IMPLICIT_WEIGHT * record.implicit as f32
        + EXPLICIT_WEIGHT * record.positive as f32
        - EXPLICIT_WEIGHT * record.negative as f32;
    RelevanceFeedback {
        relevance_score: raw.tanh(),
        impressions: record.implicit + record.positive + record.negative,
    }
}

/// Entropy of the implicit-touch distribution (normalized to `[0, 1]`) and
/// the fraction of records touched within the last day drive bounded
/// adjustments around the default `{0.6, 0.2, 0.2}` profile: a concentrated,
/// recently-touched profile favors vector similarity; a diffuse,
/// stale profile favors frequency.
fn adapt(profile: &Profile) -> AdaptedWeights {
    if profile.relevance.is_empty() {
        return DEFAULT_WEIGHTS;
    }

    let total_touches: f32 = profile
        .relevance
        .values()
        .map(|r| (r.implicit + r.positive + r.negative).max(1) as f32)
        .sum();
    let entropy: f32 = profile
        .relevance
        .values()
        .map(|r| {
            let p = (r.implicit + r.positive + r.negative).max(1) as f32 / total_touches;
            -p * p.ln()
        })
        .sum();
    let max_entropy = (profile.relevance.len() as f32).ln().max(f32::EPSILON);
    let normalized_entropy = (entropy / max_entropy).clamp(0.0, 1.0);

    let now = Utc::now();
    let recent_fraction = {
        let recent = profile
            .relevance
            .values()
            .filter(|r| {
                r.last_touched
                    .map(|t| (now - t).num_hours() < 24)
                    .unwrap_or(false)
            })
            .count();
        recent as f32 / profile.relevance.len() as f32
    };

    let vector = DEFAULT_WEIGHTS.vector + 0.15 * (1.0 - normalized_entropy) - 0.1 * normalized_entropy;
    let recency = DEFAULT_WEIGHTS.recency + 0.1 * recent_fraction;
    let frequency = DEFAULT_WEIGHTS.frequency + 0.1 * normalized_entropy;

    normalize_weights(vector, recency, frequency)
}

fn normalize_weights(vector: f32, recency: f32, frequency: f32) -> AdaptedWeights {
    let clamp = |x: f32| x.clamp(WEIGHT_MIN, WEIGHT_MAX);
    let (mut vector, mut recency, mut frequency) = (clamp(vector), clamp(recency), clamp(frequency));
    let sum = vector + recency + frequency;
    if sum > 0.0 {
        vector /= sum;
        recency /= sum;
        frequency /= sum;
    }
    AdaptedWeights {
        vector,
        recency,
        frequency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn record_query_bumps_implicit_counts() {
        let mut engine = LearningEngine::new();
        engine.record_query(&[1.0, 0.0], &ids(&["a", "b"]), None);
        let feedback = engine.get_relevance_feedback("a").unwrap();
        assert!(feedback.relevance_score > 0.0);
        assert_eq!(feedback.impressions, 1);
    }

    #[test]
    fn feedback_is_monotonic_in_positive_votes() {
        let mut engine = LearningEngine::new();
        engine.record_feedback("a", true);
        let one_positive = engine.get_relevance_feedback("a").unwrap().relevance_score;
        engine.record_feedback("a", true);
        let two_positive = engine.get_relevance_feedback("a").unwrap().relevance_score;
        assert!(two_positive >= one_positive);
    }

    #[test]
    fn negative_feedback_lowers_score() {
        let mut engine = LearningEngine::new();
        engine.record_feedback("a", true);
        let positive = engine.get_relevance_feedback("a").unwrap().relevance_score;
        engine.record_feedback("a", false);
        engine.record_feedback("a", false);
        let mixed = engine.get_relevance_feedback("a").unwrap().relevance_score;
        assert!(mixed < positive);
    }

    #[test]
    fn correlated_entries_are_symmetric() {
        let mut engine = LearningEngine::new();
        engine.record_query(&[1.0, 0.0], &ids(&["a", "b"]), None);
        let from_a = engine.get_correlated_entries("a");
        let from_b = engine.get_correlated_entries("b");
        assert_eq!(from_a, vec![("b".to_string(), 1.0)]);
        assert_eq!(from_b, vec![("a".to_string(), 1.0)]);
    }

    #[test]
    fn interest_embedding_absent_below_threshold() {
        let mut engine = LearningEngine::new();
        for _ in 0..9 {
            engine.record_query(&[1.0, 0.0], &ids(&["a"]), None);
        }
        assert!(engine.get_interest_embedding(None).is_none());
        engine.record_query(&[1.0, 0.0], &ids(&["a"]), None);
        assert!(engine.get_interest_embedding(None).is_some());
    }

    #[test]
    fn adapted_weights_default_below_threshold() {
        let engine = LearningEngine::new();
        assert_eq!(engine.get_adapted_weights(None), DEFAULT_WEIGHTS);
    }

    #[test]
    fn adapted_weights_stay_bounded_and_sum_to_one() {
        let mut engine = LearningEngine::new();
        for i in 0..20 {
            let id = format!("entry-{}", i % 3);
            engine.record_query(&[1.0, 0.0], &ids(&[&id]), None);
        }
        let weights = engine.get_adapted_weights(None);
        let sum = weights.vector + weights.recency + weights.frequency;
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(weights.vector >= WEIGHT_MIN && weights.vector <= WEIGHT_MAX);
        assert!(weights.recency >= WEIGHT_MIN && weights.recency <= WEIGHT_MAX);
        assert!(weights.frequency >= WEIGHT_MIN && weights.frequency <= WEIGHT_MAX);
    }

    #[test]
    fn compute_boost_is_bounded() {
        let mut engine = LearningEngine::new();
        for _ in 0..10 {
            engine.record_query(&[1.0, 0.0], &ids(&["a"]), None);
        }
        let boost = engine.compute_boost("a", &[1.0, 0.0], None);
        assert!(boost >= 0.0 && boost <= MAX_BOOST);
    }

    #[test]
    fn prune_entries_drops_unreferenced_ids() {
        let mut engine = LearningEngine::new();
        engine.record_query(&[1.0, 0.0], &ids(&["a", "b"]), None);
        let mut keep = HashSet::new();
        keep.insert("a".to_string());
        engine.prune_entries(&keep);
        assert!(engine.get_relevance_feedback("a").is_some());
        assert!(engine.get_relevance_feedback("b").is_none());
        assert!(engine.get_correlated_entries("a").is_empty());
    }

    #[test]
    fn snapshot_round_trips() {
        let mut engine = LearningEngine::new();
        engine.record_query(&[1.0, 0.0], &ids(&["a", "b"]), Some("topic-x"));
        engine.record_feedback("a", true);

        let bytes = engine.snapshot();
        let restored = LearningEngine::restore(&bytes).unwrap();

        assert_eq!(
            restored.get_relevance_feedback("a"),
            engine.get_relevance_feedback("a")
        );
    }
}
