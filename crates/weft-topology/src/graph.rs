//! Neighbor graph resolved to peer ids

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::trace;
use weft_core::{EdgeKey, PeerId, Position, TopologyError};

use crate::triangulation::{Triangle, triangulate};
use crate::vertex::Vertex;

/// A triangulation whose vertex indices have been replaced by peer ids
///
/// Triangles keep the order the triangulation produced them in, so two
/// graphs computed from the same vertex sequence compare equal.
///
/// When the vertex set cannot be triangulated (fewer than three usable
/// points, or all collinear) the graph is the complete graph over its
/// vertices instead, held as explicit pairs.
///
/// Invariant: every edge joins two distinct peers of the vertex set the
/// graph was computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshGraph {
    triangles: Vec<[PeerId; 3]>,
    pairs: Vec<EdgeKey>,
}

impl MeshGraph {
    /// The graph with no edges
    pub fn empty() -> Self {
        Self::default()
    }

    /// Triangulate `vertices` and resolve the result to peer ids
    ///
    /// Vertex sets that cannot be triangulated yield the complete graph.
    pub fn compute(vertices: &[Vertex]) -> Result<Self, TopologyError> {
        if let Some(bad) = vertices.iter().find(|v| !v.position.is_finite()) {
            return Err(TopologyError::NonFinitePosition(bad.peer.clone()));
        }

        let points: Vec<Position> = vertices.iter().map(|v| v.position).collect();
        let triangles = triangulate(&points);
        trace!(
            vertices = vertices.len(),
            triangles = triangles.len(),
            "Triangulated mesh"
        );

        Ok(Self::resolve(vertices, &triangles))
    }

    /// Resolve index triangles against the vertex slice they were computed over
    ///
    /// No triangles means no geometric graph: every pair of vertices is
    /// connected instead.
    pub fn resolve(vertices: &[Vertex], triangles: &[Triangle]) -> Self {
        if triangles.is_empty() {
            return Self {
                triangles: Vec::new(),
                pairs: complete_pairs(vertices),
            };
        }

        let triangles = triangles
            .iter()
            .map(|t| t.map(|i| vertices[i].peer.clone()))
            .collect();
        Self {
            triangles,
            pairs: Vec::new(),
        }
    }

    /// Triangles in triangulation order
    pub fn triangles(&self) -> &[[PeerId; 3]] {
        &self.triangles
    }

    /// Whether the graph came from a triangulation
    ///
    /// `false` means the complete-graph fallback is in effect.
    pub fn is_triangulated(&self) -> bool {
        !self.triangles.is_empty()
    }

    /// Whether the graph has no edges at all
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.pairs.is_empty()
    }

    /// Every edge as a key: triangle sides in triangle order, then
    /// fallback pairs
    ///
    /// Sides shared by two triangles are yielded twice.
    pub fn sides(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        let triangle_sides = self.triangles.iter().flat_map(|[a, b, c]| {
            [(a, b), (b, c), (c, a)]
                .into_iter()
                .filter_map(|(x, y)| EdgeKey::new(x.clone(), y.clone()))
        });
        triangle_sides.chain(self.pairs.iter().cloned())
    }

    /// The distinct undirected edges of the graph
    pub fn edges(&self) -> BTreeSet<EdgeKey> {
        self.sides().collect()
    }

    /// Whether `a` and `b` are adjacent
    pub fn contains_edge(&self, a: &PeerId, b: &PeerId) -> bool {
        EdgeKey::new(a.clone(), b.clone())
            .map(|key| self.sides().any(|side| side == key))
            .unwrap_or(false)
    }

    /// Peers adjacent to `peer`
    pub fn neighbors(&self, peer: &PeerId) -> BTreeSet<PeerId> {
        self.sides()
            .filter(|edge| edge.touches(peer))
            .map(|edge| {
                if edge.low() == peer {
                    edge.high().clone()
                } else {
                    edge.low().clone()
                }
            })
            .collect()
    }
}

/// Every pair of distinct peers, in vertex order
fn complete_pairs(vertices: &[Vertex]) -> Vec<EdgeKey> {
    let mut pairs = Vec::new();
    for (i, a) in vertices.iter().enumerate() {
        for b in &vertices[i + 1..] {
            if let Some(key) = EdgeKey::new(a.peer.clone(), b.peer.clone()) {
                pairs.push(key);
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::VertexHandle;

    fn vertex(id: &str, x: f64, y: f64) -> Vertex {
        Vertex::new(Position::new(x, y), PeerId::new(id), VertexHandle::new(0))
    }

    fn triangle_abc() -> Vec<Vertex> {
        vec![
            vertex("a", 0.0, 0.0),
            vertex("b", 10.0, 0.0),
            vertex("c", 5.0, 8.0),
        ]
    }

    #[test]
    fn test_compute_resolves_peer_ids() {
        let graph = MeshGraph::compute(&triangle_abc()).unwrap();
        assert!(graph.is_triangulated());
        assert_eq!(graph.triangles().len(), 1);

        let edges: Vec<String> = graph.edges().iter().map(|e| e.to_string()).collect();
        assert_eq!(edges, vec!["a~b", "a~c", "b~c"]);
    }

    #[test]
    fn test_small_sets_fall_back_to_complete_graph() {
        let vertices = vec![vertex("b", 0.0, 0.0), vertex("a", 1.0, 0.0)];
        let graph = MeshGraph::compute(&vertices).unwrap();
        assert!(!graph.is_triangulated());
        assert_eq!(graph.edges().len(), 1);
        assert!(graph.contains_edge(&"a".into(), &"b".into()));

        let single = MeshGraph::compute(&[vertex("a", 0.0, 0.0)]).unwrap();
        assert!(single.is_empty());
        assert!(MeshGraph::compute(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_collinear_vertices_fall_back_to_complete_graph() {
        let vertices = vec![
            vertex("a", 0.0, 0.0),
            vertex("b", 1.0, 0.0),
            vertex("c", 2.0, 0.0),
            vertex("d", 3.0, 0.0),
        ];
        let graph = MeshGraph::compute(&vertices).unwrap();
        assert!(!graph.is_triangulated());
        assert_eq!(graph.edges().len(), 6);
    }

    #[test]
    fn test_compute_rejects_non_finite() {
        let mut vertices = triangle_abc();
        vertices[1].position = Position::new(f64::NAN, 0.0);

        let err = MeshGraph::compute(&vertices).unwrap_err();
        assert!(matches!(err, TopologyError::NonFinitePosition(p) if p.as_str() == "b"));
    }

    #[test]
    fn test_neighbors_and_contains_edge() {
        let mut vertices = triangle_abc();
        vertices.push(vertex("d", 5.0, -8.0));
        let graph = MeshGraph::compute(&vertices).unwrap();

        // d sits below the a-b edge, opposite c
        assert!(graph.contains_edge(&"a".into(), &"d".into()));
        assert!(graph.contains_edge(&"d".into(), &"b".into()));
        assert!(!graph.contains_edge(&"c".into(), &"d".into()));
        assert!(!graph.contains_edge(&"a".into(), &"a".into()));

        let neighbors: Vec<_> = graph.neighbors(&"a".into()).into_iter().collect();
        assert_eq!(neighbors, vec![PeerId::new("b"), PeerId::new("c"), PeerId::new("d")]);
    }

    #[test]
    fn test_same_vertices_same_graph() {
        let vertices = triangle_abc();
        assert_eq!(
            MeshGraph::compute(&vertices).unwrap(),
            MeshGraph::compute(&vertices).unwrap()
        );
    }
}
