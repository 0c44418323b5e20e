//! Snapshot encoding for [`GraphIndex`]
//!
//! The outer tagged container (spec §6) only mandates a 4-byte tag and a
//! 4-byte length for each section; the payload format is ours to choose.
//! Like the teacher's `VectorIndex::save` (which stores its key mappings as
//! a sidecar JSON document next to the native HNSW blob), we use
//! `serde_json` for the graph's adjacency map rather than hand-rolling a
//! second binary layout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::index::{EdgeOrigin, GraphIndex, OutEdge};
use crate::error::LibraryError;

#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    outgoing: HashMap<String, Vec<(OutEdge, EdgeOrigin)>>,
}

impl GraphIndex {
    /// Serialize the adjacency map to bytes.
    pub fn snapshot(&self) -> Vec<u8> {
        let snap = GraphSnapshot {
            outgoing: self.outgoing.clone(),
        };
        serde_json::to_vec(&snap).expect("GraphSnapshot serialization is infallible")
    }

    /// Restore a snapshot produced by [`GraphIndex::snapshot`].
    pub fn restore(bytes: &[u8]) -> Result<Self, LibraryError> {
        let snap: GraphSnapshot = serde_json::from_slice(bytes)
            .map_err(|e| LibraryError::Corrupt(format!("graph snapshot: {e}")))?;
        Ok(GraphIndex {
            outgoing: snap.outgoing,
        })
    }
}
