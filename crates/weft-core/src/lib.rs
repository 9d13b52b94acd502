//! # Weft Core
//!
//! Core traits, types, and errors shared by the Weft mesh coordinator.
//!
//! The coordinator never talks to a socket directly. Everything it needs
//! from the outside world goes through the abstractions defined here, so
//! the same topology logic runs against real transports and against the
//! in-memory [`MockChannel`] used by the test suites.
//!
//! ## Key Traits
//!
//! - [`PeerChannel`]: Request/reply signaling channel to a single peer
//!
//! ## Key Types
//!
//! - [`PeerId`]: Transport-assigned peer identifier (ordered, used for edge keys)
//! - [`HashedPeerId`]: BLAKE3 digest of a peer id, the only form shared with other peers
//! - [`Position`]: A peer's coordinate in the mesh plane
//! - [`SessionDescription`]: Opaque offer/answer payload relayed between peers
//! - [`MeshEvent`]: Topology events published by the coordinator

pub mod channel;
pub mod error;
pub mod event;
pub mod identity;
pub mod mock_channel;
pub mod position;

// Re-export main types
pub use channel::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use mock_channel::*;
pub use position::*;
