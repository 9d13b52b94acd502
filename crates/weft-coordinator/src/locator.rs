//! Position assignment for joining peers
//!
//! A [`PositionLocator`] decides where in the plane a new peer sits. The
//! default [`RandomLocator`] scatters peers uniformly over a square;
//! deployments with real coordinates (latency probes, geolocation) plug
//! in their own implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use weft_core::{LocatorError, PeerId, Position};

/// Side length of the square the random locator samples from
pub const DEFAULT_EXTENT: f64 = 1000.0;

/// What the transport knows about a connecting peer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMetadata {
    /// Remote address as reported by the transport, if any
    pub address: Option<String>,
    /// Free-form labels attached at connect time
    pub labels: BTreeMap<String, String>,
}

impl PeerMetadata {
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Assigns a position to a joining peer
#[async_trait]
pub trait PositionLocator: Send + Sync {
    async fn locate(&self, peer: &PeerId, metadata: &PeerMetadata)
    -> Result<Position, LocatorError>;
}

#[async_trait]
impl<F> PositionLocator for F
where
    F: Fn(&PeerId, &PeerMetadata) -> Result<Position, LocatorError> + Send + Sync,
{
    async fn locate(
        &self,
        peer: &PeerId,
        metadata: &PeerMetadata,
    ) -> Result<Position, LocatorError> {
        self(peer, metadata)
    }
}

/// Uniform random positions over `[0, extent) x [0, extent)`
#[derive(Debug, Clone, Copy)]
pub struct RandomLocator {
    extent: f64,
}

impl RandomLocator {
    pub fn new(extent: f64) -> Self {
        Self { extent }
    }

    pub fn extent(&self) -> f64 {
        self.extent
    }
}

impl Default for RandomLocator {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENT)
    }
}

#[async_trait]
impl PositionLocator for RandomLocator {
    async fn locate(
        &self,
        _peer: &PeerId,
        _metadata: &PeerMetadata,
    ) -> Result<Position, LocatorError> {
        if !(self.extent.is_finite() && self.extent > 0.0) {
            return Err(LocatorError::Failed(format!(
                "invalid extent {}",
                self.extent
            )));
        }
        let mut rng = rand::rng();
        Ok(Position::new(
            rng.random_range(0.0..self.extent),
            rng.random_range(0.0..self.extent),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_random_locator_stays_in_bounds() {
        let locator = RandomLocator::default();
        let peer = PeerId::new("a");

        for _ in 0..200 {
            let p = locator.locate(&peer, &PeerMetadata::default()).await.unwrap();
            assert!((0.0..DEFAULT_EXTENT).contains(&p.x));
            assert!((0.0..DEFAULT_EXTENT).contains(&p.y));
        }
    }

    #[tokio::test]
    async fn test_random_locator_rejects_bad_extent() {
        let locator = RandomLocator::new(0.0);
        let result = locator.locate(&PeerId::new("a"), &PeerMetadata::default()).await;
        assert!(matches!(result, Err(LocatorError::Failed(_))));
    }

    #[tokio::test]
    async fn test_closure_locator() {
        let locator = |peer: &PeerId, meta: &PeerMetadata| {
            if meta.labels.contains_key("hidden") {
                Err(LocatorError::Unavailable(peer.clone()))
            } else {
                Ok(Position::new(1.0, 2.0))
            }
        };

        let p = locator.locate(&PeerId::new("a"), &PeerMetadata::default()).await.unwrap();
        assert_eq!(p, Position::new(1.0, 2.0));

        let hidden = PeerMetadata::default().with_label("hidden", "yes");
        assert!(locator.locate(&PeerId::new("a"), &hidden).await.is_err());
    }
}
