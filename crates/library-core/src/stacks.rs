//! The transactional façade over the indices, catalog, learning engine, and storage
//!
//! `Stacks` is the single writer over `VectorIndex` + `GraphIndex` +
//! `TopicCatalog` + `LearningEngine`, backed by a pluggable
//! [`StorageBackend`]. Reads (`search`, `graph_neighbors`, `graph_traverse`)
//! may run concurrently with each other; mutations are serialized behind a
//! `tokio::sync::RwLock`, matching spec §5's "parallel I/O, single-writer
//! state" model.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::error::{LibraryError, Result};
use crate::graph::{EdgeOrigin, EdgeType, GraphIndex};
use crate::learning::LearningEngine;
use crate::storage::{Sections, StorageBackend};
use crate::topic::TopicCatalog;
use crate::vector::VectorIndex;
use crate::volume::{Lookup, Volume, META_TOPIC};

/// How a near-duplicate `add` is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateBehavior {
    /// Keep the existing volume; return its id without inserting.
    Skip,
    /// Insert anyway; publish a [`StackEvent::DuplicateWarning`].
    Warn,
    /// Fail the `add` with [`LibraryError::Duplicate`].
    Error,
}

/// Threshold + behavior governing near-duplicate detection on `add`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicatePolicy {
    /// Cosine-similarity threshold in `[0, 1]`. `0.0` disables the check.
    pub threshold: f32,
    pub behavior: DuplicateBehavior,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            behavior: DuplicateBehavior::Skip,
        }
    }
}

/// Construction-time configuration for [`Stacks`].
#[derive(Debug, Clone)]
pub struct StacksConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// How long to wait after a mutation before persisting, coalescing
    /// bursts of writes into one. `None` disables debouncing entirely
    /// (every mutation saves synchronously).
    pub persist_debounce: Option<Duration>,
}

impl Default for StacksConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            persist_debounce: Some(Duration::from_secs(2)),
        }
    }
}

/// An item for [`Stacks::add_batch`].
#[derive(Debug, Clone)]
pub struct AddItem {
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
}

/// Result of [`Stacks::check_duplicate`].
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub similarity: f32,
    pub id: Option<String>,
}

/// Events publishable by [`Stacks`].
#[derive(Debug, Clone, PartialEq)]
pub enum StackEvent {
    Added { id: String, topic: Option<String> },
    Removed { id: String },
    DuplicateWarning {
        candidate_id: String,
        existing_id: String,
        similarity: f32,
    },
}

struct WriterState {
    vectors: VectorIndex,
    graph: GraphIndex,
    catalog: TopicCatalog,
    learning: LearningEngine,
}

/// The transactional façade described above.
pub struct Stacks {
    state: RwLock<WriterState>,
    storage: Arc<dyn StorageBackend>,
    config: StacksConfig,
    events: broadcast::Sender<StackEvent>,
    /// Guards the debounce timer so overlapping mutations coalesce into a
    /// single pending save rather than racing to spawn duplicate timers.
    pending_save: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Set at construction via `Arc::new_cyclic` so the debounce task can
    /// schedule a save against `self` without the caller needing to pass
    /// an `Arc<Stacks>` back in.
    self_weak: std::sync::Weak<Stacks>,
}

impl Stacks {
    /// Construct with default configuration, wrapped in the `Arc` the
    /// debounced-persistence task needs to reference `self` weakly.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Arc<Self> {
        Self::with_config(storage, StacksConfig::default())
    }

    pub fn with_config(storage: Arc<dyn StorageBackend>, config: StacksConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new_cyclic(|weak| Self {
            state: RwLock::new(WriterState {
                vectors: VectorIndex::new(),
                graph: GraphIndex::new(),
                catalog: TopicCatalog::new(),
                learning: LearningEngine::new(),
            }),
            storage,
            config,
            events,
            pending_save: Mutex::new(None),
            self_weak: weak.clone(),
        })
    }

    /// Subscribe to `Added`/`Removed`/`DuplicateWarning` events.
    pub fn subscribe(&self) -> broadcast::Receiver<StackEvent> {
        self.events.subscribe()
    }

    /// Validate text/vector, resolve topic, enforce duplicate policy,
    /// insert, register edges, publish `Added`, schedule persistence.
    pub async fn add(&self, text: &str, vector: Vec<f32>, mut metadata: BTreeMap<String, String>) -> Result<String> {
        if text.trim().is_empty() {
            return Err(LibraryError::Validation("text must not be empty".into()));
        }

        let mut state = self.state.write().await;
        let id = Uuid::new_v4().to_string();

        if self.config.duplicate_policy.threshold > 0.0 {
            let hit = top_duplicate(&state.vectors, &vector, self.config.duplicate_policy.threshold);
            if let Some((existing_id, similarity)) = hit {
                match self.config.duplicate_policy.behavior {
                    DuplicateBehavior::Skip => return Ok(existing_id),
                    DuplicateBehavior::Error => {
                        return Err(LibraryError::Duplicate { existing_id, similarity })
                    }
                    DuplicateBehavior::Warn => {
                        let _ = self.events.send(StackEvent::DuplicateWarning {
                            candidate_id: id.clone(),
                            existing_id,
                            similarity,
                        });
                    }
                }
            }
        }

        let topic = if let Some(raw_topic) = metadata.get(META_TOPIC).cloned() {
            let canonical = state.catalog.resolve(&raw_topic);
            metadata.insert(META_TOPIC.to_string(), canonical.clone());
            Some(canonical)
        } else {
            None
        };

        let volume = Volume::new(id.clone(), text, vector, metadata);
        let relations: Vec<(String, String)> = volume
            .relation_entries()
            .map(|(ty, target)| (ty.to_string(), target.to_string()))
            .collect();

        state.vectors.put(volume)?;

        if let Some(topic) = &topic {
            state.catalog.add_member(topic, &id);
        }

        for (ty, target) in relations {
            let edge_type = EdgeType::from_rel_key(&ty);
            if let Err(e) = state.graph.add_edge(&id, &target, edge_type, EdgeOrigin::Explicit) {
                tracing::warn!(error = %e, volume = %id, "skipping invalid edge from rel:* metadata");
            }
        }

        let _ = self.events.send(StackEvent::Added { id: id.clone(), topic });
        drop(state);
        self.schedule_persist().await;

        Ok(id)
    }

    /// Atomic at the batch level: if any item fails validation, nothing is
    /// inserted. Duplicate-policy rejections are still per-item.
    pub async fn add_batch(&self, items: Vec<AddItem>) -> Result<Vec<String>> {
        for item in &items {
            if item.text.trim().is_empty() {
                return Err(LibraryError::Validation("text must not be empty".into()));
            }
        }

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ids.push(self.add(&item.text, item.vector, item.metadata).await?);
        }
        Ok(ids)
    }

    /// Remove from every index, prune learning records, publish `Removed`.
    pub async fn delete(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        let removed = state.vectors.remove(id).is_some();
        if removed {
            state.catalog.remove_member(id);
            state.graph.remove_node(id);
            let keep: HashSet<String> = state.vectors.ids().map(str::to_string).collect();
            state.learning.prune_entries(&keep);
            let _ = self.events.send(StackEvent::Removed { id: id.to_string() });
        }
        drop(state);
        if removed {
            self.schedule_persist().await;
        }
        removed
    }

    /// Cosine-ranked search; bumps access bookkeeping and records the query
    /// with the learning engine.
    pub async fn search(&self, query_vector: &[f32], max_results: usize, min_similarity: f32) -> Vec<Lookup> {
        let results = self.search_candidates(query_vector, max_results, min_similarity).await;
        let ids: Vec<String> = results.iter().map(|l| l.volume.id.clone()).collect();
        self.record_learning_query(query_vector, &ids, None).await;
        results
    }

    /// Cosine-ranked search that bumps access bookkeeping but does not
    /// itself record a learning-engine query — used by `Library::advanced_search`,
    /// which records its own (post-ranking, post-truncation) query instead.
    pub async fn search_candidates(&self, query_vector: &[f32], max_results: usize, min_similarity: f32) -> Vec<Lookup> {
        let mut state = self.state.write().await;
        let results = state.vectors.search(query_vector, max_results, min_similarity);
        for lookup in &results {
            if let Some(v) = state.vectors.get_mut(&lookup.volume.id) {
                v.record_access();
            }
        }
        results
    }

    /// Record a query with the learning engine without performing a search
    /// (used after `Library::advanced_search` has ranked and truncated).
    pub async fn record_learning_query(&self, query_vector: &[f32], result_ids: &[String], topic: Option<&str>) {
        self.state.write().await.learning.record_query(query_vector, result_ids, topic);
    }

    /// [`crate::learning::LearningEngine::compute_boost`], delegated.
    pub async fn compute_learning_boost(&self, id: &str, entry_vector: &[f32], topic: Option<&str>) -> f32 {
        self.state.read().await.learning.compute_boost(id, entry_vector, topic)
    }

    /// Look up a volume by id without affecting access bookkeeping.
    pub async fn get(&self, id: &str) -> Option<Volume> {
        self.state.read().await.vectors.get(id).cloned()
    }

    /// Number of volumes currently stored.
    pub async fn size(&self) -> usize {
        self.state.read().await.vectors.size()
    }

    /// Every stored volume, in arbitrary order.
    pub async fn all_volumes(&self) -> Vec<Volume> {
        self.state.read().await.vectors.iter().cloned().collect()
    }

    /// Every canonical topic name currently in the catalog.
    pub async fn topic_names(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .catalog
            .sections()
            .into_iter()
            .map(|node| node.canonical().to_string())
            .collect()
    }

    /// Remove every volume, edge, topic, and learning record.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = WriterState {
            vectors: VectorIndex::new(),
            graph: GraphIndex::new(),
            catalog: TopicCatalog::new(),
            learning: LearningEngine::new(),
        };
        drop(state);
        self.schedule_persist().await;
    }

    pub async fn graph_neighbors(&self, id: &str, types: Option<&[EdgeType]>) -> Vec<crate::graph::NeighborEdge> {
        self.state.read().await.graph.neighbors(id, types)
    }

    pub async fn graph_traverse(&self, id: &str, depth: usize) -> Vec<crate::graph::TraversalHit> {
        self.state.read().await.graph.traverse(id, depth)
    }

    /// Resolve `topic` against the catalog (trim/lowercase, exact/alias
    /// match, then fuzzy match, then create), without inserting anything.
    /// Used by `CirculationDesk` to learn the canonical topic before
    /// consulting the librarian registry.
    pub async fn resolve_topic(&self, topic: &str) -> String {
        self.state.write().await.catalog.resolve(topic)
    }

    /// Move `volume_id` into `new_topic` (catalog-resolved) and keep the
    /// volume's own `topic` metadata in sync. A no-op if `volume_id` isn't
    /// currently stored. Returns the canonical topic the volume now
    /// belongs to.
    pub async fn relocate(&self, volume_id: &str, new_topic: &str) -> Option<String> {
        let mut state = self.state.write().await;
        if state.vectors.get(volume_id).is_none() {
            return None;
        }
        let canonical = state.catalog.relocate(volume_id, new_topic);
        if let Some(volume) = state.vectors.get_mut(volume_id) {
            volume.metadata.insert(META_TOPIC.to_string(), canonical.clone());
        }
        drop(state);
        self.schedule_persist().await;
        Some(canonical)
    }

    /// Fold `source` into `target` and re-point every relocated volume's
    /// `topic` metadata at `target`.
    pub async fn merge_topics(&self, source: &str, target: &str) {
        let mut state = self.state.write().await;
        let moved: Vec<String> = state
            .catalog
            .get(source)
            .map(|node| node.volumes().map(str::to_string).collect())
            .unwrap_or_default();
        state.catalog.merge(source, target);
        let canonical_target = target.trim().to_lowercase();
        for id in moved {
            if let Some(volume) = state.vectors.get_mut(&id) {
                volume.metadata.insert(META_TOPIC.to_string(), canonical_target.clone());
            }
        }
        drop(state);
        self.schedule_persist().await;
    }

    /// Top-1 cosine scan against every stored volume.
    pub async fn check_duplicate(&self, query_vector: &[f32], threshold: f32) -> DuplicateCheck {
        let state = self.state.read().await;
        match top_duplicate(&state.vectors, query_vector, threshold) {
            Some((id, similarity)) => DuplicateCheck {
                is_duplicate: true,
                similarity,
                id: Some(id),
            },
            None => DuplicateCheck {
                is_duplicate: false,
                similarity: 0.0,
                id: None,
            },
        }
    }

    /// Transitive closure of "cosine similarity ≥ threshold" over all
    /// stored volumes, via union-find. Singleton groups are excluded.
    pub async fn find_duplicate_groups(&self, threshold: f32) -> Vec<Vec<String>> {
        let state = self.state.read().await;
        let ids: Vec<&str> = state.vectors.ids().collect();

        let mut parent: HashMap<&str, &str> = ids.iter().map(|id| (*id, *id)).collect();

        fn find<'a>(parent: &mut HashMap<&'a str, &'a str>, x: &'a str) -> &'a str {
            let p = parent[x];
            if p == x {
                x
            } else {
                let root = find(parent, p);
                parent.insert(x, root);
                root
            }
        }

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (a, b) = (ids[i], ids[j]);
                let va = &state.vectors.get(a).expect("id came from ids()").embedding;
                let vb = &state.vectors.get(b).expect("id came from ids()").embedding;
                if crate::volume::cosine_similarity(va, vb) >= threshold {
                    let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
                    if ra != rb {
                        parent.insert(ra, rb);
                    }
                }
            }
        }

        let mut groups: HashMap<&str, Vec<String>> = HashMap::new();
        for id in &ids {
            let root = find(&mut parent, id);
            groups.entry(root).or_default().push((*id).to_string());
        }

        let mut result: Vec<Vec<String>> = groups.into_values().filter(|g| g.len() > 1).collect();
        for group in &mut result {
            group.sort();
        }
        result.sort();
        result
    }

    /// A single byte snapshot of the entire state: vector/catalog/graph/
    /// learning bytes concatenated under the tagged framing of spec §6.
    pub async fn snapshot(&self) -> Sections {
        let state = self.state.read().await;
        let mut sections = Sections::new();
        sections.insert("vectors".into(), state.vectors.snapshot());
        sections.insert("catalog".into(), serde_json::to_vec(&state.catalog.export()).unwrap_or_default());
        sections.insert("graph".into(), state.graph.snapshot());
        sections.insert("learning".into(), state.learning.snapshot());
        sections
    }

    /// Replace current state with one restored from [`Self::snapshot`].
    /// Clears current state first.
    pub async fn load_sections(&self, sections: &Sections) -> Result<()> {
        let vectors = match sections.get("vectors") {
            Some(bytes) => VectorIndex::restore(bytes)?,
            None => VectorIndex::new(),
        };
        let graph = match sections.get("graph") {
            Some(bytes) => GraphIndex::restore(bytes)?,
            None => GraphIndex::new(),
        };
        let catalog = match sections.get("catalog") {
            Some(bytes) => {
                let exported = serde_json::from_slice(bytes)
                    .map_err(|e| LibraryError::Corrupt(format!("catalog snapshot: {e}")))?;
                TopicCatalog::import(exported)
            }
            None => TopicCatalog::new(),
        };
        let learning = match sections.get("learning") {
            Some(bytes) => LearningEngine::restore(bytes)?,
            None => LearningEngine::new(),
        };

        let mut state = self.state.write().await;
        *state = WriterState { vectors, graph, catalog, learning };
        Ok(())
    }

    /// Load persisted state from the configured [`StorageBackend`].
    pub async fn load(&self) -> Result<()> {
        let sections = self.storage.load()?;
        self.load_sections(&sections).await
    }

    /// Cancel any pending debounced save and write synchronously.
    pub async fn dispose(&self) -> Result<()> {
        if let Some(handle) = self.pending_save.lock().await.take() {
            handle.abort();
        }
        self.save_now().await
    }

    async fn save_now(&self) -> Result<()> {
        let sections = self.snapshot().await;
        self.storage.save(&sections)?;
        Ok(())
    }

    async fn schedule_persist(&self) {
        let Some(debounce) = self.config.persist_debounce else {
            if let Err(e) = self.save_now().await {
                tracing::warn!(error = %e, "persistence write failed; will retry on next mutation");
            }
            return;
        };

        let mut pending = self.pending_save.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let weak_self = self.self_weak.clone();
        let debounce_handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(this) = weak_self.upgrade() {
                if let Err(e) = this.save_now().await {
                    tracing::warn!(error = %e, "debounced persistence write failed; will retry on next mutation");
                }
            }
        });
        *pending = Some(debounce_handle);
    }
}

fn top_duplicate(vectors: &VectorIndex, query_vector: &[f32], threshold: f32) -> Option<(String, f32)> {
    vectors
        .iter()
        .map(|v| (v.id.clone(), crate::volume::cosine_similarity(query_vector, &v.embedding)))
        .filter(|(_, score)| *score >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorageBackend;

    fn unit(lead: f32, dims: usize) -> Vec<f32> {
        let mut v = vec![0.0; dims];
        v[0] = lead;
        let rest = (1.0 - lead * lead).max(0.0).sqrt();
        if dims > 1 {
            v[1] = rest;
        }
        v
    }

    fn no_debounce_stacks() -> Arc<Stacks> {
        Stacks::with_config(
            Arc::new(MemoryStorageBackend::new()),
            StacksConfig {
                duplicate_policy: DuplicatePolicy::default(),
                persist_debounce: None,
            },
        )
    }

    #[tokio::test]
    async fn add_and_search_round_trips() {
        let stacks = no_debounce_stacks();
        let id = stacks.add("hello world", unit(1.0, 2), BTreeMap::new()).await.unwrap();
        let results = stacks.search(&unit(1.0, 2), 10, 0.0).await;
        assert_eq!(results[0].volume.id, id);
    }

    #[tokio::test]
    async fn topic_is_resolved_on_add() {
        let stacks = no_debounce_stacks();
        let mut meta = BTreeMap::new();
        meta.insert(META_TOPIC.to_string(), "Architecture/Database ".to_string());
        stacks.add("text", unit(1.0, 2), meta).await.unwrap();

        let mut meta2 = BTreeMap::new();
        meta2.insert(META_TOPIC.to_string(), "architecure/database".to_string());
        let id2 = stacks.add("other text", unit(0.0, 2), meta2).await.unwrap();

        let state = stacks.state.read().await;
        assert_eq!(state.vectors.get(&id2).unwrap().topic(), Some("architecture/database"));
    }

    #[tokio::test]
    async fn rel_metadata_creates_edges() {
        let stacks = no_debounce_stacks();
        let id_a = stacks.add("Programming languages overview", unit(1.0, 2), BTreeMap::new()).await.unwrap();

        let mut meta = BTreeMap::new();
        meta.insert(format!("rel:parent:{id_a}"), id_a.clone());
        let id_b = stacks.add("TypeScript language details", unit(0.0, 2), meta).await.unwrap();

        let from_b = stacks.graph_neighbors(&id_b, None).await;
        assert_eq!(from_b[0].edge.edge_type, EdgeType::Parent);
        assert_eq!(from_b[0].other_id, id_a);

        let from_a = stacks.graph_neighbors(&id_a, None).await;
        assert_eq!(from_a[0].edge.edge_type, EdgeType::Child);
    }

    #[tokio::test]
    async fn duplicate_skip_returns_existing_id() {
        let stacks = Stacks::with_config(
            Arc::new(MemoryStorageBackend::new()),
            StacksConfig {
                duplicate_policy: DuplicatePolicy {
                    threshold: 0.9,
                    behavior: DuplicateBehavior::Skip,
                },
                persist_debounce: None,
            },
        );

        let id1 = stacks.add("same text", unit(1.0, 2), BTreeMap::new()).await.unwrap();
        let id2 = stacks.add("same text", unit(1.0, 2), BTreeMap::new()).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(stacks.state.read().await.vectors.size(), 1);
    }

    #[tokio::test]
    async fn duplicate_error_rejects() {
        let stacks = Stacks::with_config(
            Arc::new(MemoryStorageBackend::new()),
            StacksConfig {
                duplicate_policy: DuplicatePolicy {
                    threshold: 0.9,
                    behavior: DuplicateBehavior::Error,
                },
                persist_debounce: None,
            },
        );

        stacks.add("same text", unit(1.0, 2), BTreeMap::new()).await.unwrap();
        let err = stacks.add("same text", unit(1.0, 2), BTreeMap::new()).await.unwrap_err();
        assert!(matches!(err, LibraryError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn delete_removes_from_every_index() {
        let stacks = no_debounce_stacks();
        let id = stacks.add("text", unit(1.0, 2), BTreeMap::new()).await.unwrap();
        assert!(stacks.delete(&id).await);
        assert!(stacks.search(&unit(1.0, 2), 10, 0.0).await.is_empty());
        assert!(!stacks.delete(&id).await);
    }

    #[tokio::test]
    async fn snapshot_round_trips() {
        let stacks = no_debounce_stacks();
        stacks.add("text", unit(1.0, 2), BTreeMap::new()).await.unwrap();

        let sections = stacks.snapshot().await;
        let restored = no_debounce_stacks();
        restored.load_sections(&sections).await.unwrap();

        let original_ids: HashSet<String> = stacks.state.read().await.vectors.ids().map(str::to_string).collect();
        let restored_ids: HashSet<String> = restored.state.read().await.vectors.ids().map(str::to_string).collect();
        assert_eq!(original_ids, restored_ids);
    }

    #[tokio::test]
    async fn find_duplicate_groups_excludes_singletons() {
        let stacks = no_debounce_stacks();
        stacks.add("a", unit(1.0, 2), BTreeMap::new()).await.unwrap();
        stacks.add("b", unit(1.0, 2), BTreeMap::new()).await.unwrap();
        stacks.add("c", unit(0.0, 2), BTreeMap::new()).await.unwrap();

        let groups = stacks.find_duplicate_groups(0.99).await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[tokio::test]
    async fn relocate_updates_volume_metadata_and_catalog() {
        let stacks = no_debounce_stacks();
        let mut meta = BTreeMap::new();
        meta.insert(META_TOPIC.to_string(), "rust".to_string());
        let id = stacks.add("text", unit(1.0, 2), meta).await.unwrap();

        let canonical = stacks.relocate(&id, "rust/async").await.unwrap();
        assert_eq!(canonical, "rust/async");
        let volume = stacks.get(&id).await.unwrap();
        assert_eq!(volume.topic(), Some("rust/async"));
    }

    #[tokio::test]
    async fn relocate_unknown_id_is_none() {
        let stacks = no_debounce_stacks();
        assert!(stacks.relocate("missing", "somewhere").await.is_none());
    }

    #[tokio::test]
    async fn merge_topics_repoints_volume_metadata() {
        let stacks = no_debounce_stacks();
        let mut meta = BTreeMap::new();
        meta.insert(META_TOPIC.to_string(), "js".to_string());
        let id = stacks.add("text", unit(1.0, 2), meta).await.unwrap();

        stacks.merge_topics("js", "javascript").await;
        let volume = stacks.get(&id).await.unwrap();
        assert_eq!(volume.topic(), Some("javascript"));
    }
}
