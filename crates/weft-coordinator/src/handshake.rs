//! Per-edge signaling handshake
//!
//! Establishing an edge between an initiator and a responder takes three
//! request/reply steps relayed through the coordinator:
//!
//! ```text
//! coordinator                 initiator (low)          responder (high)
//!     │ request_offer(#high)       │                         │
//!     │───────────────────────────►│                         │
//!     │◄──────────── offer ────────│                         │
//!     │ deliver_offer_for_answer(#low, offer)                │
//!     │─────────────────────────────────────────────────────►│
//!     │◄──────────────────────────── answer ─────────────────│
//!     │ deliver_answer_to_finish(#high, answer)              │
//!     │───────────────────────────►│                         │
//!     │◄──────────── true ─────────│                         │
//! ```
//!
//! Peers are only ever addressed by their hashed ids. The whole exchange
//! races a single deadline; requests still in flight when it fires are
//! abandoned and their late replies discarded.

use std::time::Duration;

use tracing::{debug, instrument, warn};
use weft_core::{EdgeKey, HandshakeError, PeerChannel, SessionDescription};

use crate::registry::PeerRegistry;

/// Default deadline for one complete exchange
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Three-step offer/answer/finish exchange with a deadline
#[derive(Debug, Clone)]
pub struct ConnectionHandshake {
    timeout: Duration,
}

impl Default for ConnectionHandshake {
    fn default() -> Self {
        Self::new(DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

impl ConnectionHandshake {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Link `initiator` to `responder`
    ///
    /// Succeeds only if all three steps complete before the deadline.
    #[instrument(
        skip_all,
        fields(initiator = %initiator.short_id(), responder = %responder.short_id())
    )]
    pub async fn establish(
        &self,
        initiator: &dyn PeerChannel,
        responder: &dyn PeerChannel,
    ) -> Result<(), HandshakeError> {
        match tokio::time::timeout(self.timeout, exchange(initiator, responder)).await {
            Ok(Ok(())) => {
                debug!("Handshake complete");
                Ok(())
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Handshake failed");
                Err(e)
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                debug!(timeout_ms, "Handshake timed out");
                Err(HandshakeError::Timeout { timeout_ms })
            }
        }
    }
}

async fn exchange(
    initiator: &dyn PeerChannel,
    responder: &dyn PeerChannel,
) -> Result<(), HandshakeError> {
    let initiator_hash = initiator.peer_id().hashed();
    let responder_hash = responder.peer_id().hashed();

    let offer = initiator
        .request_offer(&responder_hash)
        .await
        .map_err(|e| {
            debug!(error = %e, "Offer request failed");
            HandshakeError::NoOffer
        })?
        .filter(|sdp| !sdp.is_empty())
        .ok_or(HandshakeError::NoOffer)?;

    let answer: SessionDescription = responder
        .deliver_offer_for_answer(&initiator_hash, offer)
        .await
        .map_err(|e| {
            debug!(error = %e, "Answer request failed");
            HandshakeError::NoAnswer
        })?
        .filter(|sdp| !sdp.is_empty())
        .ok_or(HandshakeError::NoAnswer)?;

    let finished = initiator
        .deliver_answer_to_finish(&responder_hash, answer)
        .await
        .map_err(|e| {
            debug!(error = %e, "Finish request failed");
            HandshakeError::ConnectFailed
        })?;

    if finished {
        Ok(())
    } else {
        Err(HandshakeError::ConnectFailed)
    }
}

/// Tell both endpoints of `edge` to drop their link to each other
///
/// Endpoints whose channel is no longer registered are skipped; delivery
/// errors are logged and otherwise ignored. Returns how many endpoints
/// were notified.
pub fn notify_disconnect(registry: &PeerRegistry, edge: &EdgeKey) -> usize {
    let mut notified = 0;
    for (side, other) in [(edge.low(), edge.high()), (edge.high(), edge.low())] {
        let Some(channel) = registry.get(side) else {
            debug!(peer = %side.short_id(), edge = %edge, "Skipping disconnect for departed peer");
            continue;
        };
        match channel.notify_disconnect(&other.hashed()) {
            Ok(()) => notified += 1,
            Err(e) => warn!(peer = %side.short_id(), edge = %edge, error = %e, "Disconnect notification failed"),
        }
    }
    notified
}
