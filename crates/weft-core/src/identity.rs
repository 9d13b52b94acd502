//! Peer identity types
//!
//! - [`PeerId`]: the raw, transport-assigned identifier
//! - [`HashedPeerId`]: what other peers get to see
//! - [`EdgeKey`]: canonical key for an undirected edge between two peers

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Transport-assigned peer identifier
///
/// Ordering is lexicographic on the underlying string. That ordering
/// decides which end of an edge is the "smaller" peer everywhere in the
/// coordinator (edge keys, diff ownership, handshake initiator).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wrap a transport-assigned identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash the identifier for sharing with other peers
    pub fn hashed(&self) -> HashedPeerId {
        HashedPeerId::of(self)
    }

    /// Short display form (for logging)
    pub fn short_id(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Privacy-preserving peer identifier
///
/// Lowercase hex of the BLAKE3 digest of the raw [`PeerId`]. Signaling
/// requests address peers exclusively by this value so raw transport ids
/// never leak to other participants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashedPeerId(String);

impl HashedPeerId {
    /// Hash a raw peer id
    pub fn of(peer: &PeerId) -> Self {
        let digest = blake3::hash(peer.as_str().as_bytes());
        Self(hex::encode(digest.as_bytes()))
    }

    /// Borrow the hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for HashedPeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical key for an undirected edge
///
/// `low` is always strictly smaller than `high`, so `EdgeKey::new(a, b)`
/// and `EdgeKey::new(b, a)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    low: PeerId,
    high: PeerId,
}

impl EdgeKey {
    /// Build the key for the edge between `a` and `b`
    ///
    /// Returns `None` for a self-loop.
    pub fn new(a: PeerId, b: PeerId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The canonically smaller endpoint
    pub fn low(&self) -> &PeerId {
        &self.low
    }

    /// The canonically larger endpoint
    pub fn high(&self) -> &PeerId {
        &self.high
    }

    /// Whether `peer` is one of the endpoints
    pub fn touches(&self, peer: &PeerId) -> bool {
        &self.low == peer || &self.high == peer
    }

    /// Consume the key, returning `(low, high)`
    pub fn into_parts(self) -> (PeerId, PeerId) {
        (self.low, self.high)
    }
}

impl Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.low, self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key_is_order_independent() {
        let ab = EdgeKey::new("a".into(), "b".into()).unwrap();
        let ba = EdgeKey::new("b".into(), "a".into()).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab.low().as_str(), "a");
        assert_eq!(ab.high().as_str(), "b");
        assert_eq!(ab.to_string(), "a~b");
    }

    #[test]
    fn test_edge_key_rejects_self_loop() {
        assert!(EdgeKey::new("a".into(), "a".into()).is_none());
    }

    #[test]
    fn test_edge_key_touches() {
        let key = EdgeKey::new("x".into(), "y".into()).unwrap();
        assert!(key.touches(&"x".into()));
        assert!(key.touches(&"y".into()));
        assert!(!key.touches(&"z".into()));
    }

    #[test]
    fn test_hashed_peer_id_is_stable_hex() {
        let peer = PeerId::new("socket-42");
        let first = peer.hashed();
        let second = HashedPeerId::of(&peer);

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first.as_str(), peer.as_str());
    }

    #[test]
    fn test_hashed_peer_ids_differ() {
        assert_ne!(PeerId::new("a").hashed(), PeerId::new("b").hashed());
    }

    #[test]
    fn test_peer_id_serde_is_transparent() {
        let peer = PeerId::new("abc");
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
