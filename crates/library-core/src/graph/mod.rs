//! Knowledge graph: typed edges between volumes
//!
//! Owns typed edges between volume identifiers. Answers neighbor queries
//! (filtered by edge type) and bounded-depth traversal with path tracking.

mod index;
mod snapshot;

pub use index::{Edge, EdgeOrigin, EdgeType, GraphError, GraphIndex, GraphStats, NeighborEdge, TraversalHit};
