//! Mesh topology events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{EdgeKey, PeerId};

/// Events published by a mesh coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MeshEvent {
    /// A join was regulated and committed
    PeerJoined {
        peer: PeerId,
        vertices: usize,
        timestamp: DateTime<Utc>,
    },

    /// A join failed and the mesh was left unchanged
    PeerRejected {
        peer: PeerId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A peer's vertex was removed from the mesh
    PeerLeft {
        peer: PeerId,
        vertices: usize,
        timestamp: DateTime<Utc>,
    },

    /// A signaling handshake completed
    EdgeEstablished {
        edge: EdgeKey,
        timestamp: DateTime<Utc>,
    },

    /// A signaling handshake failed or timed out
    EdgeFailed {
        edge: EdgeKey,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// An edge established during an aborted join was torn down again
    EdgeReverted {
        edge: EdgeKey,
        timestamp: DateTime<Utc>,
    },

    /// An edge no longer in the graph was torn down
    EdgeDropped {
        edge: EdgeKey,
        timestamp: DateTime<Utc>,
    },
}

impl MeshEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::PeerJoined { timestamp, .. } => *timestamp,
            Self::PeerRejected { timestamp, .. } => *timestamp,
            Self::PeerLeft { timestamp, .. } => *timestamp,
            Self::EdgeEstablished { timestamp, .. } => *timestamp,
            Self::EdgeFailed { timestamp, .. } => *timestamp,
            Self::EdgeReverted { timestamp, .. } => *timestamp,
            Self::EdgeDropped { timestamp, .. } => *timestamp,
        }
    }

    pub fn peer_joined(peer: PeerId, vertices: usize) -> Self {
        Self::PeerJoined {
            peer,
            vertices,
            timestamp: Utc::now(),
        }
    }

    pub fn peer_rejected(peer: PeerId, reason: impl Into<String>) -> Self {
        Self::PeerRejected {
            peer,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn peer_left(peer: PeerId, vertices: usize) -> Self {
        Self::PeerLeft {
            peer,
            vertices,
            timestamp: Utc::now(),
        }
    }

    pub fn edge_established(edge: EdgeKey) -> Self {
        Self::EdgeEstablished {
            edge,
            timestamp: Utc::now(),
        }
    }

    pub fn edge_failed(edge: EdgeKey, reason: impl Into<String>) -> Self {
        Self::EdgeFailed {
            edge,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn edge_reverted(edge: EdgeKey) -> Self {
        Self::EdgeReverted {
            edge,
            timestamp: Utc::now(),
        }
    }

    pub fn edge_dropped(edge: EdgeKey) -> Self {
        Self::EdgeDropped {
            edge,
            timestamp: Utc::now(),
        }
    }

    /// The edge this event concerns, if any
    pub fn edge(&self) -> Option<&EdgeKey> {
        match self {
            Self::EdgeEstablished { edge, .. }
            | Self::EdgeFailed { edge, .. }
            | Self::EdgeReverted { edge, .. }
            | Self::EdgeDropped { edge, .. } => Some(edge),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_edge_accessor() {
        let edge = EdgeKey::new("a".into(), "b".into()).unwrap();
        let event = MeshEvent::edge_established(edge.clone());
        assert_eq!(event.edge(), Some(&edge));

        let event = MeshEvent::peer_joined("a".into(), 1);
        assert!(event.edge().is_none());
    }

    #[test]
    fn test_event_serializes() {
        let event = MeshEvent::peer_rejected("c".into(), "No offer from initiating peer");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("PeerRejected"));
        assert!(json.contains("No offer"));
    }
}
