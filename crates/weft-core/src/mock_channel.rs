//! Mock channel implementation for testing
//!
//! Provides a scripted in-memory [`PeerChannel`] for exercising the
//! handshake, regulation, and coordinator logic without a real transport.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use weft_core::{MockChannel, MockScript, StepReply, PeerChannel};
//!
//! let alice = MockChannel::new("alice");
//! let bob = MockChannel::new("bob");
//!
//! // Alice refuses to produce an offer for bob only
//! alice.script_for(bob.peer_id(), MockScript {
//!     offer: StepReply::Decline,
//!     ..MockScript::default()
//! });
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;

use crate::channel::{PeerChannel, SessionDescription};
use crate::error::ChannelError;
use crate::identity::{HashedPeerId, PeerId};

/// How a mock peer answers one signaling step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepReply {
    /// Reply with a payload (or `true` for the finish step)
    #[default]
    Respond,
    /// Reply without a payload (or `false` for the finish step)
    Decline,
    /// Fail the request at the transport level
    Error,
    /// Never reply
    Hang,
}

/// Scripted behavior for the three signaling steps
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    /// Reply to `request_offer`
    pub offer: StepReply,
    /// Reply to `deliver_offer_for_answer`
    pub answer: StepReply,
    /// Reply to `deliver_answer_to_finish`
    pub finish: StepReply,
    /// Delay applied before every reply
    pub latency: Option<Duration>,
}

impl MockScript {
    /// Every step succeeds
    pub fn cooperative() -> Self {
        Self::default()
    }

    /// The offer step is declined
    pub fn no_offer() -> Self {
        Self {
            offer: StepReply::Decline,
            ..Self::default()
        }
    }

    /// The answer step is declined
    pub fn no_answer() -> Self {
        Self {
            answer: StepReply::Decline,
            ..Self::default()
        }
    }

    /// The finish step reports failure
    pub fn refuse_finish() -> Self {
        Self {
            finish: StepReply::Decline,
            ..Self::default()
        }
    }

    /// Every step hangs forever
    pub fn unresponsive() -> Self {
        Self {
            offer: StepReply::Hang,
            answer: StepReply::Hang,
            finish: StepReply::Hang,
            latency: None,
        }
    }
}

/// A request observed by a mock channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    RequestOffer { target: HashedPeerId },
    DeliverOffer { source: HashedPeerId },
    DeliverAnswer { target: HashedPeerId },
    NotifyDisconnect { peer: HashedPeerId },
}

/// A scripted in-memory peer channel
///
/// Besides answering requests, the mock models the peer's own view of its
/// links: a link is recorded when the peer answers an offer (responder
/// side) or confirms a finish (initiator side), and forgotten on
/// `notify_disconnect`.
pub struct MockChannel {
    /// The peer behind this channel
    peer_id: PeerId,
    /// Script used when no per-counterpart override exists
    default_script: Mutex<MockScript>,
    /// Per-counterpart scripts, keyed by the counterpart's hashed id
    overrides: DashMap<HashedPeerId, MockScript>,
    /// Every request received, in arrival order
    calls: Mutex<Vec<ChannelCall>>,
    /// Counterparts this peer currently considers linked
    links: DashSet<HashedPeerId>,
    /// Closed channels fail every request
    closed: AtomicBool,
}

impl MockChannel {
    /// Create a cooperative mock channel for `peer_id`
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        Self::with_script(peer_id, MockScript::default())
    }

    /// Create a mock channel with a default script
    pub fn with_script(peer_id: impl Into<PeerId>, script: MockScript) -> Self {
        Self {
            peer_id: peer_id.into(),
            default_script: Mutex::new(script),
            overrides: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            links: DashSet::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the default script
    pub fn set_script(&self, script: MockScript) {
        *self.default_script.lock() = script;
    }

    /// Use `script` for requests concerning `counterpart` only
    pub fn script_for(&self, counterpart: &PeerId, script: MockScript) {
        self.overrides.insert(counterpart.hashed(), script);
    }

    /// Make every subsequent request fail with [`ChannelError::Closed`]
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// All requests received so far
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().clone()
    }

    /// Hashed ids this peer was told to disconnect from
    pub fn disconnects(&self) -> Vec<HashedPeerId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ChannelCall::NotifyDisconnect { peer } => Some(peer.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of offers this peer was asked to create
    pub fn offer_requests(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ChannelCall::RequestOffer { .. }))
            .count()
    }

    /// Whether this peer currently holds a link to `peer`
    pub fn is_linked_to(&self, peer: &PeerId) -> bool {
        self.links.contains(&peer.hashed())
    }

    /// Number of links this peer currently holds
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    fn script(&self, counterpart: &HashedPeerId) -> MockScript {
        self.overrides
            .get(counterpart)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| self.default_script.lock().clone())
    }

    fn record(&self, call: ChannelCall) {
        self.calls.lock().push(call);
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }

    /// Apply latency and hang/error replies shared by all request steps
    async fn settle(&self, script: &MockScript, reply: &StepReply) -> Result<bool, ChannelError> {
        if let Some(latency) = script.latency {
            tokio::time::sleep(latency).await;
        }
        match reply {
            StepReply::Respond => Ok(true),
            StepReply::Decline => Ok(false),
            StepReply::Error => Err(ChannelError::RequestFailed(format!(
                "{} dropped the request",
                self.peer_id
            ))),
            StepReply::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl PeerChannel for MockChannel {
    fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    async fn request_offer(
        &self,
        target: &HashedPeerId,
    ) -> Result<Option<SessionDescription>, ChannelError> {
        self.record(ChannelCall::RequestOffer {
            target: target.clone(),
        });
        self.ensure_open()?;

        let script = self.script(target);
        let respond = self.settle(&script, &script.offer).await?;
        Ok(respond.then(|| SessionDescription::new(format!("offer:{}", self.peer_id))))
    }

    async fn deliver_offer_for_answer(
        &self,
        source: &HashedPeerId,
        offer: SessionDescription,
    ) -> Result<Option<SessionDescription>, ChannelError> {
        self.record(ChannelCall::DeliverOffer {
            source: source.clone(),
        });
        self.ensure_open()?;

        let script = self.script(source);
        let respond = self.settle(&script, &script.answer).await?;
        if !respond || offer.is_empty() {
            return Ok(None);
        }
        self.links.insert(source.clone());
        Ok(Some(SessionDescription::new(format!(
            "answer:{}",
            self.peer_id
        ))))
    }

    async fn deliver_answer_to_finish(
        &self,
        target: &HashedPeerId,
        answer: SessionDescription,
    ) -> Result<bool, ChannelError> {
        self.record(ChannelCall::DeliverAnswer {
            target: target.clone(),
        });
        self.ensure_open()?;

        let script = self.script(target);
        let respond = self.settle(&script, &script.finish).await?;
        if respond && !answer.is_empty() {
            self.links.insert(target.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn notify_disconnect(&self, peer: &HashedPeerId) -> Result<(), ChannelError> {
        self.record(ChannelCall::NotifyDisconnect { peer: peer.clone() });
        self.ensure_open()?;
        self.links.remove(peer);
        Ok(())
    }
}
