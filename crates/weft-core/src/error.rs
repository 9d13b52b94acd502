//! Error types for the Weft mesh coordinator

use thiserror::Error;

use crate::identity::PeerId;

/// Top-level error type for mesh operations
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("Regulation error: {0}")]
    Regulation(#[from] RegulationError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Locator error: {0}")]
    Locator(#[from] LocatorError),

    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),

    #[error("Peer already registered: {0}")]
    DuplicatePeer(PeerId),
}

/// Errors raised by a peer channel while carrying a single request
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed reply: {0}")]
    MalformedReply(String),
}

/// Errors from the three-step signaling handshake between two peers
#[derive(Debug, Clone, Error)]
pub enum HandshakeError {
    #[error("No offer from initiating peer")]
    NoOffer,

    #[error("No answer from responding peer")]
    NoAnswer,

    #[error("Unable to connect: initiating peer rejected the answer")]
    ConnectFailed,

    #[error("Handshake timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Peer unavailable: {0}")]
    PeerUnavailable(PeerId),
}

/// Errors from applying a graph diff to live channels
#[derive(Debug, Clone, Error)]
pub enum RegulationError {
    /// A join could not establish every new edge and was rolled back
    #[error("Regulation aborted: {failed} handshake(s) failed, {reverted} edge(s) reverted (first failure: {first})")]
    Aborted {
        failed: usize,
        reverted: usize,
        first: HandshakeError,
    },
}

/// Errors from building the geometric graph
#[derive(Debug, Clone, Error)]
pub enum TopologyError {
    #[error("Non-finite position for peer {0}")]
    NonFinitePosition(PeerId),
}

/// Errors raised by a position locator
#[derive(Debug, Clone, Error)]
pub enum LocatorError {
    #[error("No position available for peer {0}")]
    Unavailable(PeerId),

    #[error("Locator failed: {0}")]
    Failed(String),
}

/// Errors from the action sequencer
#[derive(Debug, Clone, Error)]
pub enum SequencerError {
    #[error("Sequencer worker has shut down")]
    Closed,

    #[error("Action panicked before settling")]
    ActionPanicked,
}

/// Result type alias for mesh operations
pub type MeshResult<T> = Result<T, MeshError>;
