//! Committed mesh state

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use weft_core::{EdgeKey, PeerId};
use weft_topology::{MeshGraph, Vertex, VertexHandle};

/// Vertex list and the graph computed over it
///
/// Owned by the sequencer worker; only a settled join or leave replaces
/// it. Vertices keep insertion order, which the graph computation
/// depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshState {
    pub vertices: Vec<Vertex>,
    pub graph: MeshGraph,
}

impl MeshState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the vertex carrying `handle`
    pub fn find(&self, handle: VertexHandle) -> Option<usize> {
        self.vertices.iter().position(|v| v.handle == handle)
    }

    pub fn contains_peer(&self, peer: &PeerId) -> bool {
        self.vertices.iter().any(|v| &v.peer == peer)
    }

    /// Whether `peer` is in a multi-peer mesh without a single neighbor
    ///
    /// Happens when a peer shares its position with an earlier vertex:
    /// only the first of coincident points is triangulated.
    pub fn is_isolated(&self, peer: &PeerId) -> bool {
        self.len() > 1 && self.contains_peer(peer) && self.graph.neighbors(peer).is_empty()
    }

    /// The vertex list with `vertex` appended
    pub fn with_vertex(&self, vertex: Vertex) -> Vec<Vertex> {
        let mut vertices = self.vertices.clone();
        vertices.push(vertex);
        vertices
    }

    /// The vertex list with the vertex at `index` removed
    pub fn without_vertex(&self, index: usize) -> Vec<Vertex> {
        let mut vertices = self.vertices.clone();
        vertices.remove(index);
        vertices
    }

    /// Commit a new vertex list together with its graph
    pub fn replace(&mut self, vertices: Vec<Vertex>, graph: MeshGraph) {
        self.vertices = vertices;
        self.graph = graph;
    }

    pub fn edges(&self) -> BTreeSet<EdgeKey> {
        self.graph.edges()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
