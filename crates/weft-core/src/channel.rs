//! Signaling channel abstraction
//!
//! The [`PeerChannel`] trait is the coordinator's only way to reach a
//! peer. Each method maps to one named request on the underlying
//! transport (a websocket, a QUIC stream, an in-memory mock) and resolves
//! with the peer's acknowledgment.
//!
//! ## Implementations
//!
//! - [`MockChannel`](crate::MockChannel): scripted in-memory channel for tests
//! - Real transports live outside this workspace

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::identity::{HashedPeerId, PeerId};

/// Opaque connection offer or answer relayed between two peers
///
/// The coordinator never inspects the contents; it only moves the
/// initiator's offer to the responder and the answer back.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(String);

impl SessionDescription {
    pub fn new(sdp: impl Into<String>) -> Self {
        Self(sdp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionDescription {
    // Descriptions carry candidate addresses; keep them out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionDescription({} bytes)", self.0.len())
    }
}

/// Request/reply channel to a single peer
///
/// Requests on one channel are delivered reliably and in order. The
/// coordinator may issue requests on many channels concurrently.
///
/// # Example
///
/// ```rust,ignore
/// use weft_core::{PeerChannel, HashedPeerId};
///
/// async fn ask_for_offer<C: PeerChannel + ?Sized>(channel: &C, target: &HashedPeerId) {
///     match channel.request_offer(target).await {
///         Ok(Some(offer)) => println!("got {} byte offer", offer.len()),
///         Ok(None) => println!("peer declined"),
///         Err(e) => println!("request failed: {e}"),
///     }
/// }
/// ```
#[async_trait]
pub trait PeerChannel: Send + Sync {
    /// Transport-assigned id of the peer behind this channel
    fn peer_id(&self) -> &PeerId;

    /// Ask the peer to create a connection offer addressed to `target`
    ///
    /// `Ok(None)` means the peer answered without an offer.
    async fn request_offer(
        &self,
        target: &HashedPeerId,
    ) -> Result<Option<SessionDescription>, ChannelError>;

    /// Hand the peer an offer from `source` and ask for an answer
    ///
    /// `Ok(None)` means the peer answered without an answer.
    async fn deliver_offer_for_answer(
        &self,
        source: &HashedPeerId,
        offer: SessionDescription,
    ) -> Result<Option<SessionDescription>, ChannelError>;

    /// Hand the peer the answer from `target` and ask it to finish the link
    ///
    /// Returns whether the peer reports the link as established.
    async fn deliver_answer_to_finish(
        &self,
        target: &HashedPeerId,
        answer: SessionDescription,
    ) -> Result<bool, ChannelError>;

    /// Tell the peer to drop its link to `peer`
    ///
    /// Fire-and-forget: the request is emitted without waiting for an
    /// acknowledgment. Dropping an absent link must be harmless.
    fn notify_disconnect(&self, peer: &HashedPeerId) -> Result<(), ChannelError>;

    /// Short display form (for logging)
    fn short_id(&self) -> String {
        self.peer_id().short_id()
    }
}
