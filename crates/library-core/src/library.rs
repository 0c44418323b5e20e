//! User-facing API built on [`Stacks`]
//!
//! `Library` owns the embedding provider (and, optionally, a text
//! generation provider) and converts raw text to vectors before handing
//! off to `Stacks`, which never sees text — only vectors.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::circulation::VolumeSink;
use crate::error::{LibraryError, Result};
use crate::provider::{EmbeddingProvider, TextGenerationProvider};
use crate::stacks::{AddItem, DuplicateCheck, Stacks};
use crate::storage::StorageBackend;
use crate::volume::{Lookup, Volume, META_ENTRY_TYPE, META_TOPIC};

/// Text-scoring mode for [`AdvancedSearchQuery`]. `Fuzzy` is the only mode
/// spec.md §4.7 names; kept as an enum so a future mode doesn't need an
/// API break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMode {
    #[default]
    Fuzzy,
}

/// A boost toggle with its weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostConfig {
    pub enabled: bool,
    pub weight: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self { enabled: false, weight: 0.0 }
    }
}

/// How `topic_filter` restricts candidates before ranking.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicFilter {
    Exact(String),
    AnyOf(Vec<String>),
}

impl TopicFilter {
    fn matches(&self, topic: Option<&str>) -> bool {
        match (self, topic) {
            (TopicFilter::Exact(expected), Some(topic)) => expected == topic,
            (TopicFilter::AnyOf(options), Some(topic)) => options.iter().any(|o| o == topic),
            _ => false,
        }
    }
}

/// Parameters for [`Library::advanced_search`].
#[derive(Debug, Clone)]
pub struct AdvancedSearchQuery {
    pub query: String,
    pub text_mode: TextMode,
    pub graph_boost: BoostConfig,
    pub learning_boost: BoostConfig,
    pub topic_filter: Option<TopicFilter>,
    pub max_results: usize,
    pub min_similarity: f32,
}

/// Result of [`Library::compendium`].
#[derive(Debug, Clone)]
pub struct CompendiumResult {
    pub text: String,
    pub source_ids: Vec<String>,
    pub deleted_originals: bool,
}

/// User-facing API over [`Stacks`].
pub struct Library {
    stacks: Arc<Stacks>,
    embeddings: Arc<dyn EmbeddingProvider>,
    text_generator: Option<Arc<dyn TextGenerationProvider>>,
}

impl Library {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        embeddings: Arc<dyn EmbeddingProvider>,
        text_generator: Option<Arc<dyn TextGenerationProvider>>,
    ) -> Self {
        Self {
            stacks: Stacks::new(storage),
            embeddings,
            text_generator,
        }
    }

    pub fn with_stacks(
        stacks: Arc<Stacks>,
        embeddings: Arc<dyn EmbeddingProvider>,
        text_generator: Option<Arc<dyn TextGenerationProvider>>,
    ) -> Self {
        Self { stacks, embeddings, text_generator }
    }

    /// The underlying façade, shared (e.g. with a `CirculationDesk`).
    pub fn stacks(&self) -> Arc<Stacks> {
        self.stacks.clone()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embeddings
            .embed(text)
            .await
            .map_err(|e| LibraryError::ProviderFailed {
                provider: "embedding".to_string(),
                cause: e.to_string(),
            })
    }

    /// Embed `text` and forward to [`Stacks::add`].
    pub async fn add(&self, text: &str, metadata: Option<BTreeMap<String, String>>) -> Result<String> {
        let vector = self.embed(text).await?;
        self.stacks.add(text, vector, metadata.unwrap_or_default()).await
    }

    /// Embed every item's text, then forward as one atomic batch.
    pub async fn add_batch(&self, items: Vec<(String, BTreeMap<String, String>)>) -> Result<Vec<String>> {
        let mut batch = Vec::with_capacity(items.len());
        for (text, metadata) in items {
            let vector = self.embed(&text).await?;
            batch.push(AddItem { text, vector, metadata });
        }
        self.stacks.add_batch(batch).await
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.stacks.delete(id).await
    }

    pub async fn delete_batch(&self, ids: &[String]) -> usize {
        let mut deleted = 0;
        for id in ids {
            if self.stacks.delete(id).await {
                deleted += 1;
            }
        }
        deleted
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Volume> {
        self.stacks.get(id).await
    }

    pub async fn size(&self) -> usize {
        self.stacks.size().await
    }

    pub async fn clear(&self) {
        self.stacks.clear().await;
    }

    /// Embed `query`, forward to [`Stacks::search`].
    pub async fn search(&self, query: &str, max_results: usize, min_similarity: f32) -> Result<Vec<Lookup>> {
        let vector = self.embed(query).await?;
        Ok(self.stacks.search(&vector, max_results, min_similarity).await)
    }

    /// Hybrid scoring: vector similarity, optionally boosted by graph
    /// neighbor similarity and the learning engine's interest model,
    /// restricted by `topic_filter`, ranked by final score.
    pub async fn advanced_search(&self, query: AdvancedSearchQuery) -> Result<Vec<Lookup>> {
        let TextMode::Fuzzy = query.text_mode;
        let query_vector = self.embed(&query.query).await?;

        // Over-fetch before filtering/boosting so the final top-N is
        // chosen from the full candidate pool, not a pre-filtered slice.
        let candidates = self
            .stacks
            .search_candidates(&query_vector, 10_000, query.min_similarity)
            .await;

        let topic_ids: Option<Vec<String>> = match &query.topic_filter {
            Some(filter) => Some(
                candidates
                    .iter()
                    .filter(|l| filter.matches(l.volume.topic()))
                    .map(|l| l.volume.id.clone())
                    .collect(),
            ),
            None => None,
        };

        let mut results = Vec::with_capacity(candidates.len());
        for mut lookup in candidates {
            if let Some(ids) = &topic_ids {
                if !ids.contains(&lookup.volume.id) {
                    continue;
                }
            }

            let mut score = lookup.score;

            if query.graph_boost.enabled {
                let neighbors = self.stacks.graph_neighbors(&lookup.volume.id, None).await;
                if !neighbors.is_empty() {
                    let mut total = 0.0f32;
                    let mut n = 0usize;
                    for neighbor in &neighbors {
                        if let Some(other) = self.stacks.get(&neighbor.other_id).await {
                            total += crate::volume::cosine_similarity(&query_vector, &other.embedding);
                            n += 1;
                        }
                    }
                    if n > 0 {
                        let avg_similarity = (total / n as f32).max(0.0);
                        let boost = (query.graph_boost.weight * avg_similarity).min(query.graph_boost.weight);
                        lookup.components.graph_boost = Some(boost);
                        score += boost;
                    }
                }
            }

            if query.learning_boost.enabled {
                let topic = lookup.volume.topic();
                let boost = query.learning_boost.weight
                    * self
                        .stacks
                        .compute_learning_boost(&lookup.volume.id, &lookup.volume.embedding, topic)
                        .await;
                lookup.components.learning_boost = Some(boost);
                score += boost;
            }

            lookup.score = score;
            results.push(lookup);
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(query.max_results);

        let recorded_ids: Vec<String> = results
            .iter()
            .take(query.max_results.min(20))
            .map(|l| l.volume.id.clone())
            .collect();
        let topic_scope = match &query.topic_filter {
            Some(TopicFilter::Exact(t)) => Some(t.clone()),
            _ => None,
        };
        self.stacks
            .record_learning_query(&query_vector, &recorded_ids, topic_scope.as_deref())
            .await;

        Ok(results)
    }

    /// Concatenate source texts, summarize via the text generator, insert
    /// the result tagged `entryType=compendium`.
    pub async fn compendium(&self, ids: &[String], delete_originals: bool) -> Result<CompendiumResult> {
        if ids.len() < 2 {
            return Err(LibraryError::Validation(
                "compendium requires at least 2 source ids".into(),
            ));
        }
        let generator = self
            .text_generator
            .as_ref()
            .ok_or_else(|| LibraryError::Validation("no text generation provider configured".into()))?;

        let mut volumes = Vec::with_capacity(ids.len());
        for id in ids {
            let volume = self
                .stacks
                .get(id)
                .await
                .ok_or_else(|| LibraryError::NotFound(id.clone()))?;
            volumes.push(volume);
        }

        let combined = volumes
            .iter()
            .map(|v| v.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let summary = generator
            .generate(&format!("Summarize the following into a single cohesive passage:\n\n{combined}"))
            .await
            .map_err(|e| LibraryError::ProviderFailed {
                provider: "text-generation".to_string(),
                cause: e.to_string(),
            })?;

        let mut metadata = BTreeMap::new();
        metadata.insert(META_ENTRY_TYPE.to_string(), "compendium".to_string());
        if let Some(topic) = volumes[0].topic() {
            metadata.insert(META_TOPIC.to_string(), topic.to_string());
        }

        self.add(&summary, Some(metadata)).await?;

        if delete_originals {
            for id in ids {
                self.stacks.delete(id).await;
            }
        }

        Ok(CompendiumResult {
            text: summary,
            source_ids: ids.to_vec(),
            deleted_originals: delete_originals,
        })
    }

    /// Embed `text` and forward to [`Stacks::check_duplicate`].
    pub async fn check_duplicate(&self, text: &str, threshold: f32) -> Result<DuplicateCheck> {
        let vector = self.embed(text).await?;
        Ok(self.stacks.check_duplicate(&vector, threshold).await)
    }

    /// Volumes whose canonical topic matches one of `topics`.
    pub async fn filter_by_topic(&self, topics: &[String]) -> Vec<Volume> {
        let wanted: HashSet<&str> = topics.iter().map(String::as_str).collect();
        self.stacks
            .all_volumes()
            .await
            .into_iter()
            .filter(|v| v.topic().map(|t| wanted.contains(t)).unwrap_or(false))
            .collect()
    }

    /// Every canonical topic name currently in the catalog.
    pub async fn get_topics(&self) -> Vec<String> {
        self.stacks.topic_names().await
    }
}

/// `Library` is the natural `VolumeSink` for a `CirculationDesk`: it's the
/// one collaborator that both owns the embedding provider and can reach
/// `Stacks`, so extraction/optimization jobs (which produce raw text, not
/// vectors) insert and delete through it rather than through `Stacks`
/// directly.
#[async_trait]
impl VolumeSink for Library {
    async fn add_volume(&self, text: &str, metadata: BTreeMap<String, String>) -> Result<String> {
        self.add(text, Some(metadata)).await
    }

    async fn delete_volume(&self, id: &str) -> bool {
        self.delete(id).await
    }
}
