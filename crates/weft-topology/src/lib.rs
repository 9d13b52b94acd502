//! # Weft Topology
//!
//! Pure, synchronous graph computation for the Weft mesh coordinator.
//!
//! ## Core Components
//!
//! - [`triangulate`]: Delaunay triangulation of a point set (via `spade`)
//! - [`MeshGraph`]: A triangulation resolved to peer ids
//! - [`GraphDiff`]: Per-peer edge additions/removals between two graphs
//!
//! ## Pipeline
//!
//! Vertex indices only mean something for the triangulation call that
//! produced them, so they never leave this crate unresolved:
//!
//! ```rust,ignore
//! use weft_topology::{GraphDiff, MeshGraph};
//!
//! let next = MeshGraph::compute(&vertices)?;      // triangulate + resolve
//! let diff = GraphDiff::between(&current, &next); // compare by peer id
//! for (peer, entry) in diff.iter() {
//!     // entry.add / entry.remove name the larger peer of each edge
//! }
//! ```

pub mod diff;
pub mod graph;
pub mod triangulation;
pub mod vertex;

// Re-export main types
pub use diff::{EdgeState, GraphDiff, PeerDiff};
pub use graph::MeshGraph;
pub use triangulation::{Triangle, triangulate};
pub use vertex::{Vertex, VertexHandle};

// Re-export core types used in the public API
pub use weft_core::{EdgeKey, PeerId, Position, TopologyError};
