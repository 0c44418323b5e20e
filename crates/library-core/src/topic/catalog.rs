//! Canonical topic names with Levenshtein-based fuzzy resolution

use std::collections::{BTreeMap, HashMap, HashSet};

use super::levenshtein::levenshtein;

/// A single canonical topic: the volumes filed under it and the spellings
/// that have been folded into it.
#[derive(Debug, Clone, Default)]
pub struct TopicNode {
    canonical: String,
    volumes: HashSet<String>,
    aliases: HashSet<String>,
}

impl TopicNode {
    fn new(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            volumes: HashSet::new(),
            aliases: HashSet::new(),
        }
    }

    /// Canonical name of this topic, e.g. `"architecture/database/schema"`.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Ids of the volumes currently filed under this topic.
    pub fn volumes(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().map(String::as_str)
    }

    /// Spellings that resolve to this topic (not including the canonical
    /// name itself).
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }

    /// Number of volumes filed under this topic.
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

/// Catalog of canonical topics, resolved fuzzily from free-form input.
///
/// Resolution follows spec §4.3 exactly: trim and lowercase, then check for
/// an exact canonical match, then an exact alias match, then a Levenshtein
/// match within `max(1, floor(len(T) / 8))` edits (only if the closest
/// canonical name is unique at that distance), and only then fall back to
/// creating a brand-new topic (along with any missing path-prefix
/// ancestors: resolving `"architecture/database/schema"` for the first time
/// implicitly creates `"architecture"` and `"architecture/database"` too).
#[derive(Debug, Default)]
pub struct TopicCatalog {
    nodes: HashMap<String, TopicNode>,
    aliases: HashMap<String, String>,
    /// Canonical topic a given volume id currently belongs to, tracked so
    /// `relocate` can find and clear the previous membership in O(1).
    volume_topics: HashMap<String, String>,
}

impl TopicCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve free-form input to a canonical topic name, creating a new
    /// topic (and any missing ancestors) if nothing matches closely enough.
    pub fn resolve(&mut self, topic: &str) -> String {
        let normalized = topic.trim().to_lowercase();

        if self.nodes.contains_key(&normalized) {
            return normalized;
        }
        if let Some(canonical) = self.aliases.get(&normalized) {
            return canonical.clone();
        }

        if let Some(closest) = self.closest_within_threshold(&normalized) {
            self.aliases.insert(normalized, closest.clone());
            return closest;
        }

        self.ensure_with_ancestors(&normalized);
        normalized
    }

    /// Find the unique closest canonical name within the edit-distance
    /// threshold, or `None` if there's no match or a tie at the minimum
    /// distance.
    fn closest_within_threshold(&self, normalized: &str) -> Option<String> {
        let threshold = (normalized.chars().count() / 8).max(1);

        let mut best_distance = usize::MAX;
        let mut best_names: Vec<&str> = Vec::new();

        for canonical in self.nodes.keys() {
            let distance = levenshtein(normalized, canonical);
            match distance.cmp(&best_distance) {
                std::cmp::Ordering::Less => {
                    best_distance = distance;
                    best_names.clear();
                    best_names.push(canonical);
                }
                std::cmp::Ordering::Equal => best_names.push(canonical),
                std::cmp::Ordering::Greater => {}
            }
        }

        if best_distance <= threshold && best_names.len() == 1 {
            Some(best_names[0].to_string())
        } else {
            None
        }
    }

    /// Create `normalized` and every missing path-prefix ancestor
    /// (`"a/b/c"` creates `"a"`, `"a/b"`, and `"a/b/c"`), leaving any that
    /// already exist untouched.
    fn ensure_with_ancestors(&mut self, normalized: &str) {
        let segments: Vec<&str> = normalized.split('/').collect();
        let mut prefix = String::new();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                prefix.push('/');
            }
            prefix.push_str(segment);
            self.nodes
                .entry(prefix.clone())
                .or_insert_with(|| TopicNode::new(prefix.clone()));
        }
    }

    /// File `volume_id` under `canonical_topic`, creating the topic (and
    /// ancestors) if it doesn't already exist. Does not itself run fuzzy
    /// resolution; call [`Self::resolve`] first if `canonical_topic` is
    /// free-form input.
    pub fn add_member(&mut self, canonical_topic: &str, volume_id: &str) {
        self.ensure_with_ancestors(canonical_topic);
        self.nodes
            .get_mut(canonical_topic)
            .expect("just ensured")
            .volumes
            .insert(volume_id.to_string());
        self.volume_topics
            .insert(volume_id.to_string(), canonical_topic.to_string());
    }

    /// Remove `volume_id` from whatever topic it's currently filed under.
    pub fn remove_member(&mut self, volume_id: &str) {
        if let Some(topic) = self.volume_topics.remove(volume_id) {
            if let Some(node) = self.nodes.get_mut(&topic) {
                node.volumes.remove(volume_id);
            }
        }
    }

    /// Move `volume_id` to `new_topic` (resolved fuzzily), clearing any
    /// prior membership first. Returns the canonical topic it now belongs
    /// to.
    pub fn relocate(&mut self, volume_id: &str, new_topic: &str) -> String {
        let canonical = self.resolve(new_topic);
        self.remove_member(volume_id);
        self.add_member(&canonical, volume_id);
        canonical
    }

    /// Fold `source` into `target`: every volume filed under `source` is
    /// refiled under `target`, every alias of `source` is repointed at
    /// `target`, `source` itself becomes an alias of `target`, and the
    /// `source` node is deleted. A no-op if `source` doesn't exist or
    /// equals `target`. `target` is created if it doesn't already exist.
    pub fn merge(&mut self, source: &str, target: &str) {
        let source = source.trim().to_lowercase();
        let target = target.trim().to_lowercase();

        if source == target {
            return;
        }
        let Some(source_node) = self.nodes.remove(&source) else {
            return;
        };

        self.ensure_with_ancestors(&target);
        let target_node = self.nodes.get_mut(&target).expect("just ensured");
        for volume_id in &source_node.volumes {
            target_node.volumes.insert(volume_id.clone());
            self.volume_topics
                .insert(volume_id.clone(), target.clone());
        }
        target_node.aliases.insert(source.clone());
        target_node.aliases.extend(source_node.aliases.iter().cloned());

        for alias in &source_node.aliases {
            self.aliases.insert(alias.clone(), target.clone());
        }
        self.aliases.insert(source.clone(), target.clone());
    }

    /// Look up a topic node by its exact canonical name.
    pub fn get(&self, canonical: &str) -> Option<&TopicNode> {
        self.nodes.get(canonical)
    }

    /// Every topic node, ordered by canonical name for determinism.
    pub fn sections(&self) -> Vec<&TopicNode> {
        let mut nodes: Vec<&TopicNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.canonical.cmp(&b.canonical));
        nodes
    }

    /// Total number of canonical topics.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A snapshot-friendly view: canonical name -> (volume ids, aliases).
    pub(crate) fn export(&self) -> BTreeMap<String, (Vec<String>, Vec<String>)> {
        self.nodes
            .values()
            .map(|node| {
                let mut volumes: Vec<String> = node.volumes.iter().cloned().collect();
                volumes.sort();
                let mut aliases: Vec<String> = node.aliases.iter().cloned().collect();
                aliases.sort();
                (node.canonical.clone(), (volumes, aliases))
            })
            .collect()
    }

    /// Rebuild a catalog from the shape produced by [`Self::export`].
    pub(crate) fn import(data: BTreeMap<String, (Vec<String>, Vec<String>)>) -> Self {
        let mut catalog = Self::new();
        for (canonical, (volumes, aliases)) in data {
            let node = catalog
                .nodes
                .entry(canonical.clone())
                .or_insert_with(|| TopicNode::new(canonical.clone()));
            for volume_id in volumes {
                node.volumes.insert(volume_id.clone());
                catalog
                    .volume_topics
                    .insert(volume_id, canonical.clone());
            }
            for alias in aliases {
                node.aliases.insert(alias.clone());
                catalog.aliases.insert(alias, canonical.clone());
            }
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typo_resolves_to_same_canonical_topic() {
        let mut catalog = TopicCatalog::new();
        let first = catalog.resolve("architecture/database");
        let second = catalog.resolve("architecure/database");
        assert_eq!(first, second);
        assert_eq!(catalog.len(), 2); // architecture, architecture/database; the typo became an alias, not a new node
    }

    #[test]
    fn creates_path_prefix_ancestors() {
        let mut catalog = TopicCatalog::new();
        catalog.resolve("architecture/database/schema");
        assert!(catalog.get("architecture").is_some());
        assert!(catalog.get("architecture/database").is_some());
        assert!(catalog.get("architecture/database/schema").is_some());
    }

    #[test]
    fn distinct_topics_beyond_threshold_stay_distinct() {
        let mut catalog = TopicCatalog::new();
        let a = catalog.resolve("networking");
        let b = catalog.resolve("gardening");
        assert_ne!(a, b);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn merge_redirects_resolution() {
        let mut catalog = TopicCatalog::new();
        let x = catalog.resolve("frontend-ui");
        catalog.add_member(&x, "vol-1");
        let y = catalog.resolve("frontend");
        catalog.add_member(&y, "vol-2");

        catalog.merge(&x, &y);

        assert_eq!(catalog.resolve("frontend-ui"), y);
        let target = catalog.get(&y).unwrap();
        let volumes: HashSet<&str> = target.volumes().collect();
        assert!(volumes.contains("vol-1"));
        assert!(volumes.contains("vol-2"));
        assert!(catalog.get(&x).is_none());
    }

    #[test]
    fn relocate_moves_membership() {
        let mut catalog = TopicCatalog::new();
        let a = catalog.resolve("topic-a");
        catalog.add_member(&a, "vol-1");

        let new_topic = catalog.relocate("vol-1", "topic-b");

        assert_eq!(catalog.get(&a).unwrap().len(), 0);
        assert!(catalog.get(&new_topic).unwrap().volumes().any(|v| v == "vol-1"));
    }

    #[test]
    fn export_import_round_trips() {
        let mut catalog = TopicCatalog::new();
        let a = catalog.resolve("topic-a");
        catalog.add_member(&a, "vol-1");
        catalog.resolve("topik-a"); // registers as alias if within threshold

        let exported = catalog.export();
        let restored = TopicCatalog::import(exported);

        assert_eq!(restored.len(), catalog.len());
        assert_eq!(restored.resolve("topic-a"), a);
    }
}
