//! # Weft Coordinator
//!
//! Keeps a peer-to-peer overlay's live links in step with the Delaunay
//! neighbor graph over its members' positions.
//!
//! ## Core Components
//!
//! - [`MeshCoordinator`]: Entry point for connect/disconnect events
//! - [`Sequencer`]: Runs join/leave actions one at a time, in arrival order
//! - [`Regulator`]: Applies a graph diff to live channels, rolling back failed joins
//! - [`ConnectionHandshake`]: Offer/answer/finish signaling for a single edge
//! - [`PeerRegistry`]: Peer id to channel lookup
//!
//! ## Join and Leave
//!
//! A join commits the new graph only after every new edge has been
//! signaled successfully; otherwise the edges it did establish are torn
//! down and the mesh stays as it was. A leave commits the smaller graph
//! immediately and then tears down the departed peer's edges on a
//! best-effort basis. It never fails.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft_coordinator::{CoordinatorConfig, MeshCoordinator, PeerMetadata};
//!
//! let mesh = MeshCoordinator::new(CoordinatorConfig::default());
//!
//! // On a transport connect event
//! let handle = mesh.peer_connected(channel, PeerMetadata::default()).await?;
//!
//! // On the matching disconnect event
//! mesh.peer_disconnected(handle).await?;
//! ```

pub mod config;
pub mod coordinator;
pub mod handshake;
pub mod locator;
pub mod registry;
pub mod regulation;
pub mod sequencer;
pub mod state;

// Re-export main types
pub use config::CoordinatorConfig;
pub use coordinator::MeshCoordinator;
pub use handshake::{ConnectionHandshake, notify_disconnect};
pub use locator::{PeerMetadata, PositionLocator, RandomLocator};
pub use registry::PeerRegistry;
pub use regulation::{RegulationMode, RegulationReport, Regulator};
pub use sequencer::{Pending, Sequencer};
pub use state::MeshState;

// Re-export core and topology types for convenience
pub use weft_core::{
    HandshakeError, MeshError, MeshEvent, MeshResult, PeerChannel, PeerId, Position,
    RegulationError,
};
pub use weft_topology::{GraphDiff, MeshGraph, Vertex, VertexHandle};
