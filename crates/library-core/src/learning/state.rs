//! Data held by [`super::LearningEngine`]

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum query count, at a given scope, before that scope's interest
/// embedding or adapted weights are trusted over the fallback chain.
pub(super) const MIN_QUERIES_FOR_SCOPE: u64 = 10;

pub(super) const INTEREST_DECAY: f32 = 0.95;

pub(super) const DEFAULT_WEIGHTS: AdaptedWeights = AdaptedWeights {
    vector: 0.6,
    recency: 0.2,
    frequency: 0.2,
};

pub(super) const WEIGHT_MIN: f32 = 0.05;
pub(super) const WEIGHT_MAX: f32 = 0.9;

/// Relevance feedback for a single entry: `tanh(0.3·implicit + 1.5·positive
/// − 1.5·negative)` and the raw impression count it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceFeedback {
    pub relevance_score: f32,
    pub impressions: u32,
}

/// A `{vector, recency, frequency}` weight profile for the ranker, always
/// summing to 1 with each component in `[0.05, 0.9]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptedWeights {
    pub vector: f32,
    pub recency: f32,
    pub frequency: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct RelevanceRecord {
    pub implicit: u32,
    pub positive: u32,
    pub negative: u32,
    pub last_touched: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct Profile {
    pub query_count: u64,
    pub interest_embedding: Vec<f32>,
    pub relevance: HashMap<String, RelevanceRecord>,
}

impl Profile {
    pub(super) fn accumulate(&mut self, query_vector: &[f32]) {
        if self.interest_embedding.is_empty() {
            self.interest_embedding = query_vector.to_vec();
        } else if self.interest_embedding.len() == query_vector.len() {
            for (acc, q) in self.interest_embedding.iter_mut().zip(query_vector) {
                *acc = INTEREST_DECAY * *acc + (1.0 - INTEREST_DECAY) * q;
            }
        }
        self.query_count += 1;
    }

    pub(super) fn renormalized_interest(&self) -> Option<Vec<f32>> {
        if self.query_count < MIN_QUERIES_FOR_SCOPE || self.interest_embedding.is_empty() {
            return None;
        }
        let norm = self
            .interest_embedding
            .iter()
            .map(|x| x * x)
            .sum::<f32>()
            .sqrt();
        if norm <= f32::EPSILON {
            return None;
        }
        Some(self.interest_embedding.iter().map(|x| x / norm).collect())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct LearningState {
    pub global: Profile,
    pub topics: HashMap<String, Profile>,
    /// Sparse symmetric co-appearance counts. Keyed by `pair_key(a, b)`
    /// rather than a `(String, String)` tuple since JSON object keys must
    /// be strings.
    pub co_appearance: HashMap<String, u32>,
}

const PAIR_SEPARATOR: char = '\u{1}';

/// Order-independent key for an unordered pair of entry ids.
pub(super) fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}{PAIR_SEPARATOR}{b}")
    } else {
        format!("{b}{PAIR_SEPARATOR}{a}")
    }
}

/// Split a key back into its two entry ids.
pub(super) fn split_pair_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(PAIR_SEPARATOR)
}
