//! Weft mesh simulation
//!
//! Drives a [`MeshCoordinator`] with in-process simulated peers. Each
//! peer answers signaling requests after a random delay and fails each
//! step with a fixed probability, so joins can be rejected and leaves can
//! leave gaps. After the run, every remaining peer's own link set is
//! compared with the committed graph.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use futures::future::join_all;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};
use weft_coordinator::{CoordinatorConfig, MeshCoordinator, MeshResult, MeshState, PeerMetadata};
use weft_core::{ChannelError, HashedPeerId, PeerChannel, PeerId, SessionDescription};

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Peers to connect
    pub peers: usize,
    /// Accepted peers to disconnect afterwards
    pub leave: usize,
    /// Probability that any single signaling step fails
    pub failure_rate: f64,
    /// Handshake deadline
    pub timeout_ms: u64,
    /// Upper bound of the per-step reply delay
    pub max_latency_ms: u64,
    /// Seed for peer behavior and leave selection
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            peers: 20,
            leave: 5,
            failure_rate: 0.0,
            timeout_ms: 5_000,
            max_latency_ms: 20,
            seed: 42,
        }
    }
}

/// A simulated peer behind a lossy signaling channel
pub struct SimChannel {
    peer_id: PeerId,
    failure_rate: f64,
    max_latency: Duration,
    rng: Mutex<StdRng>,
    links: DashSet<HashedPeerId>,
}

impl SimChannel {
    pub fn new(peer_id: impl Into<PeerId>, failure_rate: f64, max_latency: Duration, seed: u64) -> Self {
        Self {
            peer_id: peer_id.into(),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            max_latency,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            links: DashSet::new(),
        }
    }

    /// Hashed ids this peer considers itself linked to
    pub fn links(&self) -> BTreeSet<HashedPeerId> {
        self.links.iter().map(|h| h.key().clone()).collect()
    }

    /// Wait a random delay, then decide whether this step succeeds
    async fn step(&self) -> bool {
        let (delay, ok) = {
            let mut rng = self.rng.lock();
            let max = self.max_latency.as_millis() as u64;
            let delay = if max == 0 { 0 } else { rng.random_range(0..=max) };
            (delay, !rng.random_bool(self.failure_rate))
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        ok
    }
}

#[async_trait]
impl PeerChannel for SimChannel {
    fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    async fn request_offer(
        &self,
        _target: &HashedPeerId,
    ) -> Result<Option<SessionDescription>, ChannelError> {
        Ok(self
            .step()
            .await
            .then(|| SessionDescription::new(format!("offer:{}", self.peer_id))))
    }

    async fn deliver_offer_for_answer(
        &self,
        source: &HashedPeerId,
        _offer: SessionDescription,
    ) -> Result<Option<SessionDescription>, ChannelError> {
        if !self.step().await {
            return Ok(None);
        }
        self.links.insert(source.clone());
        Ok(Some(SessionDescription::new(format!("answer:{}", self.peer_id))))
    }

    async fn deliver_answer_to_finish(
        &self,
        target: &HashedPeerId,
        _answer: SessionDescription,
    ) -> Result<bool, ChannelError> {
        if !self.step().await {
            return Ok(false);
        }
        self.links.insert(target.clone());
        Ok(true)
    }

    fn notify_disconnect(&self, peer: &HashedPeerId) -> Result<(), ChannelError> {
        self.links.remove(peer);
        Ok(())
    }
}

/// Outcome of one simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub peers: usize,
    pub joins_accepted: usize,
    pub joins_rejected: usize,
    pub leaves: usize,
    pub vertices: usize,
    pub edges: usize,
    /// Committed edges at least one endpoint does not hold
    pub missing_links: usize,
    /// Links held by a peer that the committed graph does not contain
    pub stale_links: usize,
    pub consistent: bool,
}

/// Instance name of the coordinator a simulation drives
pub const MESH_NAME: &str = "sim";

/// Run one simulation
pub async fn run(config: &SimConfig) -> MeshResult<SimReport> {
    let mesh = MeshCoordinator::new(
        CoordinatorConfig::default()
            .with_name(MESH_NAME)
            .with_handshake_timeout(Duration::from_millis(config.timeout_ms)),
    );
    let mut rng = StdRng::seed_from_u64(config.seed);
    let max_latency = Duration::from_millis(config.max_latency_ms);

    let channels: Vec<Arc<SimChannel>> = (0..config.peers)
        .map(|i| {
            Arc::new(SimChannel::new(
                format!("peer-{i:04}"),
                config.failure_rate,
                max_latency,
                rng.random(),
            ))
        })
        .collect();

    // Queue every join up front; the coordinator serializes them
    let joins = join_all(
        channels
            .iter()
            .map(|c| mesh.peer_connected(c.clone(), PeerMetadata::default())),
    )
    .await;

    let mut accepted = Vec::new();
    let mut rejected = 0;
    for result in joins {
        match result {
            Ok(handle) => accepted.push(handle),
            Err(e) => {
                debug!(error = %e, "Join rejected");
                rejected += 1;
            }
        }
    }
    info!(accepted = accepted.len(), rejected, "Joins settled");

    accepted.shuffle(&mut rng);
    let leaving: Vec<_> = accepted.iter().take(config.leave).copied().collect();
    let leaves = join_all(leaving.iter().map(|h| mesh.peer_disconnected(*h))).await;
    for result in leaves {
        result?;
    }

    // Let detached handshakes from untriangulated rounds finish
    tokio::time::sleep(max_latency * 4 + Duration::from_millis(10)).await;

    let state = mesh.snapshot().await?;
    let (missing_links, stale_links) = audit(&state, &channels);
    let report = SimReport {
        peers: config.peers,
        joins_accepted: accepted.len(),
        joins_rejected: rejected,
        leaves: leaving.len(),
        vertices: state.len(),
        edges: state.edges().len(),
        missing_links,
        stale_links,
        consistent: missing_links == 0 && stale_links == 0,
    };
    info!(
        vertices = report.vertices,
        edges = report.edges,
        consistent = report.consistent,
        "Simulation complete"
    );
    Ok(report)
}

/// Compare every remaining peer's links with the committed graph
fn audit(state: &MeshState, channels: &[Arc<SimChannel>]) -> (usize, usize) {
    let mut missing = 0;
    let mut stale = 0;

    for vertex in &state.vertices {
        let Some(channel) = channels.iter().find(|c| c.peer_id() == &vertex.peer) else {
            continue;
        };
        let expected: BTreeSet<HashedPeerId> = state
            .graph
            .neighbors(&vertex.peer)
            .iter()
            .map(PeerId::hashed)
            .collect();
        let held = channel.links();

        missing += expected.difference(&held).count();
        stale += held.difference(&expected).count();
    }
    (missing, stale)
}
