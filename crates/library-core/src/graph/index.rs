//! Typed-edge adjacency store with BFS traversal

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Directed relation types between two volumes.
///
/// `PrecededBy` never comes directly from `rel:*` metadata (spec §6 only
/// lists `rel:followsFrom:<id>`) — it only ever appears as the automatic
/// dual of [`EdgeType::FollowsFrom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Related,
    Parent,
    Child,
    Contradicts,
    Supports,
    FollowsFrom,
    PrecededBy,
}

impl EdgeType {
    /// Whether this type is its own dual when inserted (inverse edge has
    /// the same type), as opposed to a directed type whose dual is a
    /// different, paired type.
    fn is_symmetric(self) -> bool {
        matches!(self, EdgeType::Related | EdgeType::Contradicts | EdgeType::Supports)
    }

    /// The type used for the automatically-inserted inverse edge.
    fn dual(self) -> EdgeType {
        match self {
            EdgeType::Related => EdgeType::Related,
            EdgeType::Contradicts => EdgeType::Contradicts,
            EdgeType::Supports => EdgeType::Supports,
            EdgeType::Parent => EdgeType::Child,
            EdgeType::Child => EdgeType::Parent,
            EdgeType::FollowsFrom => EdgeType::PrecededBy,
            EdgeType::PrecededBy => EdgeType::FollowsFrom,
        }
    }

    /// Parse a `rel:<type>:<id>` metadata key's type segment. Unknown
    /// values default to [`EdgeType::Related`] per spec §4.6.
    pub fn from_rel_key(s: &str) -> Self {
        match s {
            "related" => EdgeType::Related,
            "parent" => EdgeType::Parent,
            "child" => EdgeType::Child,
            "contradicts" => EdgeType::Contradicts,
            "supports" => EdgeType::Supports,
            "followsFrom" => EdgeType::FollowsFrom,
            _ => EdgeType::Related,
        }
    }
}

/// Provenance of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeOrigin {
    /// Came from `rel:*` metadata at insertion time.
    Explicit,
    /// Added later, e.g. by the learning engine.
    Derived,
}

/// A typed edge, as seen from the node that owns it (the `src` of the
/// original `add_edge` call, or the dual's perspective for its partner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub edge_type: EdgeType,
    pub origin: EdgeOrigin,
}

/// One neighbor returned by [`GraphIndex::neighbors`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborEdge {
    pub edge: Edge,
    pub other_id: String,
}

/// One hit returned by [`GraphIndex::traverse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalHit {
    pub volume_id: String,
    pub depth: usize,
    pub path: Vec<String>,
}

/// Errors raised by [`GraphIndex::add_edge`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    #[error("self-loops are not allowed: {0}")]
    SelfLoop(String),
}

/// Aggregate counts over the graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct OutEdge {
    pub(crate) dst: String,
    pub(crate) edge_type: EdgeType,
}

/// Typed-edge adjacency store, keyed by source node id.
#[derive(Debug, Default)]
pub struct GraphIndex {
    /// src id -> outgoing edges (dst, type, origin)
    pub(crate) outgoing: HashMap<String, Vec<(OutEdge, EdgeOrigin)>>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a directed edge `src -> dst` of `edge_type`, with automatic
    /// inverse/dual insertion as described in spec §4.2. Idempotent on
    /// `(src, dst, edge_type)`; rejects self-loops.
    pub fn add_edge(
        &mut self,
        src: &str,
        dst: &str,
        edge_type: EdgeType,
        origin: EdgeOrigin,
    ) -> Result<(), GraphError> {
        if src == dst {
            return Err(GraphError::SelfLoop(src.to_string()));
        }

        if self.has_edge(src, dst, edge_type) {
            return Ok(());
        }

        self.insert_one(src, dst, edge_type, origin);

        let dual_type = edge_type.dual();
        // Symmetric types and directed duals both land here; the only
        // difference is which type label the reverse edge carries.
        if !self.has_edge(dst, src, dual_type) {
            self.insert_one(dst, src, dual_type, origin);
        }

        // Symmetric types are their own dual; avoid double-insertion
        // confusion is already handled since dual_type == edge_type and
        // has_edge/insert_one operate on the (dst, src, dual_type) key.
        let _ = edge_type.is_symmetric();

        Ok(())
    }

    fn has_edge(&self, src: &str, dst: &str, edge_type: EdgeType) -> bool {
        self.outgoing
            .get(src)
            .map(|edges| {
                edges
                    .iter()
                    .any(|(e, _)| e.dst == dst && e.edge_type == edge_type)
            })
            .unwrap_or(false)
    }

    fn insert_one(&mut self, src: &str, dst: &str, edge_type: EdgeType, origin: EdgeOrigin) {
        self.outgoing.entry(src.to_string()).or_default().push((
            OutEdge {
                dst: dst.to_string(),
                edge_type,
            },
            origin,
        ));
        // Ensure dst has an (possibly empty) adjacency entry so node_count
        // reflects every node that has ever appeared in an edge.
        self.outgoing.entry(dst.to_string()).or_default();
    }

    /// Distinct neighbors of `id`, optionally restricted to `type_filter`.
    pub fn neighbors(&self, id: &str, type_filter: Option<&[EdgeType]>) -> Vec<NeighborEdge> {
        let Some(edges) = self.outgoing.get(id) else {
            return Vec::new();
        };

        edges
            .iter()
            .filter(|(e, _)| {
                type_filter
                    .map(|types| types.contains(&e.edge_type))
                    .unwrap_or(true)
            })
            .map(|(e, origin)| NeighborEdge {
                edge: Edge {
                    edge_type: e.edge_type,
                    origin: *origin,
                },
                other_id: e.dst.clone(),
            })
            .collect()
    }

    /// BFS from `id`, excluding the origin, depth bounded by `max_depth`.
    /// Each node visited at most once (shortest path retained); results
    /// are in BFS order, with ties at the same depth broken by id.
    pub fn traverse(&self, id: &str, max_depth: usize) -> Vec<TraversalHit> {
        if max_depth == 0 || !self.outgoing.contains_key(id) {
            return Vec::new();
        }

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(id.to_string());

        let mut frontier: Vec<(String, Vec<String>)> = vec![(id.to_string(), vec![id.to_string()])];
        let mut hits = Vec::new();
        let mut depth = 0;

        while depth < max_depth && !frontier.is_empty() {
            frontier.sort_by(|a, b| a.0.cmp(&b.0));

            let mut candidates: Vec<(String, Vec<String>)> = Vec::new();
            for (current, path) in &frontier {
                let mut next_ids: Vec<String> = self
                    .outgoing
                    .get(current)
                    .map(|edges| edges.iter().map(|(e, _)| e.dst.clone()).collect())
                    .unwrap_or_default();
                next_ids.sort();
                next_ids.dedup();

                for next_id in next_ids {
                    if visited.contains(&next_id) || candidates.iter().any(|(id, _)| id == &next_id) {
                        continue;
                    }
                    let mut next_path = path.clone();
                    next_path.push(next_id.clone());
                    candidates.push((next_id, next_path));
                }
            }

            candidates.sort_by(|a, b| a.0.cmp(&b.0));
            depth += 1;

            for (next_id, path) in &candidates {
                visited.insert(next_id.clone());
                hits.push(TraversalHit {
                    volume_id: next_id.clone(),
                    depth,
                    path: path.clone(),
                });
            }

            frontier = candidates;
        }

        hits
    }

    /// Remove all edges incident to `id`, in either direction.
    pub fn remove_node(&mut self, id: &str) {
        self.outgoing.remove(id);
        for edges in self.outgoing.values_mut() {
            edges.retain(|(e, _)| e.dst != id);
        }
    }

    /// Aggregate node/edge counts.
    pub fn stats(&self) -> GraphStats {
        let node_count = self.outgoing.len();
        let edge_count: usize = self.outgoing.values().map(|e| e.len()).sum();
        GraphStats { node_count, edge_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_loops() {
        let mut g = GraphIndex::new();
        assert!(matches!(
            g.add_edge("a", "a", EdgeType::Related, EdgeOrigin::Explicit),
            Err(GraphError::SelfLoop(_))
        ));
    }

    #[test]
    fn symmetric_edge_is_bidirectional() {
        let mut g = GraphIndex::new();
        g.add_edge("a", "b", EdgeType::Related, EdgeOrigin::Explicit).unwrap();
        let from_b = g.neighbors("b", None);
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_b[0].other_id, "a");
        assert_eq!(from_b[0].edge.edge_type, EdgeType::Related);
    }

    #[test]
    fn parent_child_dual() {
        let mut g = GraphIndex::new();
        g.add_edge("b", "a", EdgeType::Parent, EdgeOrigin::Explicit).unwrap();
        let from_a = g.neighbors("a", None);
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].other_id, "b");
        assert_eq!(from_a[0].edge.edge_type, EdgeType::Child);
    }

    #[test]
    fn follows_from_preceded_by_dual() {
        let mut g = GraphIndex::new();
        g.add_edge("b", "a", EdgeType::FollowsFrom, EdgeOrigin::Explicit).unwrap();
        let from_a = g.neighbors("a", None);
        assert_eq!(from_a[0].edge.edge_type, EdgeType::PrecededBy);
    }

    #[test]
    fn add_edge_is_idempotent() {
        let mut g = GraphIndex::new();
        g.add_edge("a", "b", EdgeType::Related, EdgeOrigin::Explicit).unwrap();
        g.add_edge("a", "b", EdgeType::Related, EdgeOrigin::Explicit).unwrap();
        assert_eq!(g.neighbors("a", None).len(), 1);
        assert_eq!(g.neighbors("b", None).len(), 1);
    }

    #[test]
    fn traversal_depth_limits() {
        let mut g = GraphIndex::new();
        g.add_edge("a", "b", EdgeType::Related, EdgeOrigin::Explicit).unwrap();
        g.add_edge("b", "c", EdgeType::Related, EdgeOrigin::Explicit).unwrap();

        let depth1 = g.traverse("a", 1);
        assert_eq!(depth1.len(), 1);
        assert_eq!(depth1[0].volume_id, "b");
        assert_eq!(depth1[0].path, vec!["a", "b"]);

        let depth2 = g.traverse("a", 2);
        assert_eq!(depth2.len(), 2);
        assert_eq!(depth2[1].volume_id, "c");
        assert_eq!(depth2[1].depth, 2);
        assert_eq!(depth2[1].path, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut g = GraphIndex::new();
        g.add_edge("a", "b", EdgeType::Related, EdgeOrigin::Explicit).unwrap();
        g.remove_node("b");
        assert!(g.neighbors("a", None).is_empty());
    }

    #[test]
    fn neighbors_type_filter() {
        let mut g = GraphIndex::new();
        g.add_edge("a", "b", EdgeType::Related, EdgeOrigin::Explicit).unwrap();
        g.add_edge("a", "c", EdgeType::Supports, EdgeOrigin::Explicit).unwrap();
        let related_only = g.neighbors("a", Some(&[EdgeType::Related]));
        assert_eq!(related_only.len(), 1);
        assert_eq!(related_only[0].other_id, "b");
    }
}
