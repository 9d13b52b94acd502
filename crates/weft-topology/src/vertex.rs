//! Mesh vertices

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use weft_core::{PeerId, Position};

/// Opaque token identifying one vertex for its whole lifetime
///
/// Returned by a successful join and used to address the vertex on
/// leave. Unlike a vertex's index, a handle stays valid across
/// recomputations of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexHandle(u64);

impl VertexHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for VertexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A peer's position in the mesh plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Where the locator placed the peer
    pub position: Position,
    /// The owning peer
    pub peer: PeerId,
    /// Stable handle for leave events
    pub handle: VertexHandle,
}

impl Vertex {
    pub fn new(position: Position, peer: PeerId, handle: VertexHandle) -> Self {
        Self {
            position,
            peer,
            handle,
        }
    }
}
