//! Applying graph diffs to live channels
//!
//! The [`Regulator`] turns a [`GraphDiff`] into handshakes and disconnect
//! notifications. Every handshake of one run is issued concurrently and
//! awaited before any decision is made:
//!
//! - All succeeded: removed edges are torn down.
//! - Some failed during a join: the edges this run established are torn
//!   down again, removals are skipped, and the run fails.
//! - Some failed during a leave: removals are delivered anyway and the
//!   run succeeds.
//!
//! A graph that could not be triangulated (fewer than three usable
//! peers) is regulated differently: every pair gets a detached handshake
//! whose outcome is only logged and published, never awaited.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{Instrument, Span, debug, info, instrument, warn};
use weft_core::{EdgeKey, HandshakeError, MeshEvent, RegulationError};
use weft_topology::{GraphDiff, MeshGraph};

use crate::handshake::{ConnectionHandshake, notify_disconnect};
use crate::registry::PeerRegistry;

/// Why a diff is being regulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationMode {
    /// A peer is joining; any handshake failure rolls the run back
    Join,
    /// A peer has left; failures are tolerated
    Leave,
}

/// What a regulation run did
#[derive(Debug, Clone, Default)]
pub struct RegulationReport {
    /// Edges whose handshake completed
    pub established: Vec<EdgeKey>,
    /// Edges whose handshake failed, with the reason
    pub failed: Vec<(EdgeKey, HandshakeError)>,
    /// Edges torn down because they left the graph
    pub dropped: Vec<EdgeKey>,
    /// Handshakes spawned without being awaited
    pub detached: usize,
}

impl RegulationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives handshakes and disconnects for a graph diff
#[derive(Clone)]
pub struct Regulator {
    registry: Arc<PeerRegistry>,
    handshake: ConnectionHandshake,
    events: broadcast::Sender<MeshEvent>,
}

impl Regulator {
    pub fn new(
        registry: Arc<PeerRegistry>,
        handshake: ConnectionHandshake,
        events: broadcast::Sender<MeshEvent>,
    ) -> Self {
        Self {
            registry,
            handshake,
            events,
        }
    }

    /// Apply `diff`, whose target graph is `graph`
    #[instrument(skip_all, fields(mode = ?mode))]
    pub async fn regulate(
        &self,
        diff: &GraphDiff,
        graph: &MeshGraph,
        mode: RegulationMode,
    ) -> Result<RegulationReport, RegulationError> {
        if !graph.is_triangulated() {
            return Ok(self.regulate_untriangulated(diff, graph));
        }

        let added = diff.added();
        debug!(
            add = added.len(),
            remove = diff.removed().len(),
            "Regulating diff"
        );

        let outcomes = join_all(added.into_iter().map(|edge| async move {
            let result = self.connect(&edge).await;
            (edge, result)
        }))
        .await;

        let mut report = RegulationReport::default();
        for (edge, result) in outcomes {
            match result {
                Ok(()) => {
                    self.publish(MeshEvent::edge_established(edge.clone()));
                    report.established.push(edge);
                }
                Err(e) => {
                    warn!(edge = %edge, error = %e, "Edge handshake failed");
                    self.publish(MeshEvent::edge_failed(edge.clone(), e.to_string()));
                    report.failed.push((edge, e));
                }
            }
        }

        if report.is_clean() || mode == RegulationMode::Leave {
            report.dropped = self.drop_edges(diff.removed());
            info!(
                established = report.established.len(),
                failed = report.failed.len(),
                dropped = report.dropped.len(),
                "Regulation complete"
            );
            return Ok(report);
        }

        for edge in &report.established {
            notify_disconnect(&self.registry, edge);
            self.publish(MeshEvent::edge_reverted(edge.clone()));
        }

        let failed = report.failed.len();
        let reverted = report.established.len();
        warn!(failed, reverted, "Join regulation aborted");

        let first = report
            .failed
            .into_iter()
            .next()
            .map(|(_, e)| e)
            .unwrap_or(HandshakeError::ConnectFailed);
        Err(RegulationError::Aborted {
            failed,
            reverted,
            first,
        })
    }

    /// Complete-graph regulation with detached handshakes
    fn regulate_untriangulated(&self, diff: &GraphDiff, graph: &MeshGraph) -> RegulationReport {
        let mut report = RegulationReport::default();

        for edge in graph.edges() {
            let regulator = self.clone();
            tokio::spawn(
                async move {
                    match regulator.connect(&edge).await {
                        Ok(()) => regulator.publish(MeshEvent::edge_established(edge)),
                        Err(e) => {
                            warn!(edge = %edge, error = %e, "Detached handshake failed");
                            regulator.publish(MeshEvent::edge_failed(edge, e.to_string()));
                        }
                    }
                }
                .instrument(Span::current()),
            );
            report.detached += 1;
        }

        report.dropped = self.drop_edges(diff.removed());
        debug!(
            detached = report.detached,
            dropped = report.dropped.len(),
            "Regulated untriangulated graph"
        );
        report
    }

    /// Handshake from the edge's low peer toward its high peer
    async fn connect(&self, edge: &EdgeKey) -> Result<(), HandshakeError> {
        let initiator = self
            .registry
            .get(edge.low())
            .ok_or_else(|| HandshakeError::PeerUnavailable(edge.low().clone()))?;
        let responder = self
            .registry
            .get(edge.high())
            .ok_or_else(|| HandshakeError::PeerUnavailable(edge.high().clone()))?;

        self.handshake
            .establish(initiator.as_ref(), responder.as_ref())
            .await
    }

    fn drop_edges(&self, edges: Vec<EdgeKey>) -> Vec<EdgeKey> {
        for edge in &edges {
            notify_disconnect(&self.registry, edge);
            self.publish(MeshEvent::edge_dropped(edge.clone()));
        }
        edges
    }

    fn publish(&self, event: MeshEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use weft_core::{MockChannel, MockScript, PeerChannel, PeerId, Position};
    use weft_topology::{Vertex, VertexHandle};

    struct Fixture {
        registry: Arc<PeerRegistry>,
        regulator: Regulator,
        events: broadcast::Receiver<MeshEvent>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(PeerRegistry::new());
        let (tx, events) = broadcast::channel(64);
        let regulator = Regulator::new(
            Arc::clone(&registry),
            ConnectionHandshake::new(Duration::from_millis(200)),
            tx,
        );
        Fixture {
            registry,
            regulator,
            events,
        }
    }

    fn add_peer(registry: &PeerRegistry, id: &str) -> Arc<MockChannel> {
        let channel = Arc::new(MockChannel::new(id));
        registry.register(channel.clone());
        channel
    }

    fn graph(spec: &[(&str, f64, f64)]) -> MeshGraph {
        let vertices: Vec<Vertex> = spec
            .iter()
            .enumerate()
            .map(|(i, (id, x, y))| {
                Vertex::new(Position::new(*x, *y), PeerId::new(*id), VertexHandle::new(i as u64))
            })
            .collect();
        MeshGraph::compute(&vertices).unwrap()
    }

    fn triangle() -> MeshGraph {
        graph(&[("a", 0.0, 0.0), ("b", 10.0, 0.0), ("c", 5.0, 8.0)])
    }

    #[tokio::test]
    async fn test_join_establishes_every_added_edge() {
        let f = fixture();
        let a = add_peer(&f.registry, "a");
        let b = add_peer(&f.registry, "b");
        let c = add_peer(&f.registry, "c");

        let new = triangle();
        let diff = GraphDiff::between(&MeshGraph::empty(), &new);
        let report = f
            .regulator
            .regulate(&diff, &new, RegulationMode::Join)
            .await
            .unwrap();

        assert_eq!(report.established.len(), 3);
        assert!(report.is_clean());
        assert!(a.is_linked_to(b.peer_id()) && a.is_linked_to(c.peer_id()));
        assert!(b.is_linked_to(c.peer_id()));
        // Initiated from the smaller peer only
        assert_eq!(a.offer_requests(), 2);
        assert_eq!(b.offer_requests(), 1);
        assert_eq!(c.offer_requests(), 0);
    }

    #[tokio::test]
    async fn test_join_failure_reverts_established_edges() {
        let mut f = fixture();
        let a = add_peer(&f.registry, "a");
        let b = add_peer(&f.registry, "b");
        let c = add_peer(&f.registry, "c");
        // b cannot produce an offer for c; a's edges succeed
        b.script_for(c.peer_id(), MockScript::no_offer());

        let new = triangle();
        let diff = GraphDiff::between(&MeshGraph::empty(), &new);
        let err = f
            .regulator
            .regulate(&diff, &new, RegulationMode::Join)
            .await
            .unwrap_err();

        let RegulationError::Aborted {
            failed,
            reverted,
            first,
        } = err;
        assert_eq!(failed, 1);
        assert_eq!(reverted, 2);
        assert!(matches!(first, HandshakeError::NoOffer));

        assert_eq!(a.link_count(), 0);
        assert!(!b.is_linked_to(a.peer_id()));
        assert!(!c.is_linked_to(a.peer_id()));

        let mut reverted_events = 0;
        while let Ok(event) = f.events.try_recv() {
            if matches!(event, MeshEvent::EdgeReverted { .. }) {
                reverted_events += 1;
            }
        }
        assert_eq!(reverted_events, 2);
    }

    #[tokio::test]
    async fn test_join_failure_skips_removals() {
        let f = fixture();
        let spec = [
            ("a", 0.0, 0.0),
            ("b", 10.0, 0.0),
            ("c", 10.0, 10.0),
            ("d", 2.0, 4.0),
        ];
        let channels: Vec<_> = spec.iter().map(|(id, _, _)| add_peer(&f.registry, id)).collect();

        // Moving d away flips the b~d diagonal to a~c
        let old = graph(&spec);
        let new = graph(&[
            ("a", 0.0, 0.0),
            ("b", 10.0, 0.0),
            ("c", 10.0, 10.0),
            ("d", -20.0, 30.0),
        ]);
        let diff = GraphDiff::between(&old, &new);
        assert_eq!(diff.added().len(), 1);
        assert_eq!(diff.removed().len(), 1);

        for channel in &channels {
            channel.set_script(MockScript::no_offer());
        }

        let result = f.regulator.regulate(&diff, &new, RegulationMode::Join).await;
        assert!(result.is_err());
        assert!(channels.iter().all(|c| c.disconnects().is_empty()));
    }

    #[tokio::test]
    async fn test_leave_tolerates_failures_and_still_drops() {
        let f = fixture();
        let a = add_peer(&f.registry, "a");
        let c = add_peer(&f.registry, "c");
        let d = add_peer(&f.registry, "d");
        a.set_script(MockScript::no_offer());

        // b sat just below a~c and held the b~d diagonal; without it a~c is added
        let old = graph(&[
            ("a", 0.0, 0.0),
            ("b", 5.0, -1.0),
            ("c", 10.0, 0.0),
            ("d", 5.0, 10.0),
        ]);
        let new = graph(&[("a", 0.0, 0.0), ("c", 10.0, 0.0), ("d", 5.0, 10.0)]);
        let diff = GraphDiff::between(&old, &new);

        let report = f
            .regulator
            .regulate(&diff, &new, RegulationMode::Leave)
            .await
            .unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.dropped.len(), 3);
        let b_hash = PeerId::new("b").hashed();
        assert!(a.disconnects().contains(&b_hash));
        assert!(c.disconnects().contains(&b_hash));
        assert!(d.disconnects().contains(&b_hash));
    }

    #[tokio::test]
    async fn test_missing_channel_is_a_handshake_failure() {
        let f = fixture();
        add_peer(&f.registry, "a");
        add_peer(&f.registry, "b");

        let new = triangle();
        let diff = GraphDiff::between(&MeshGraph::empty(), &new);
        let err = f
            .regulator
            .regulate(&diff, &new, RegulationMode::Join)
            .await
            .unwrap_err();

        let RegulationError::Aborted { failed, first, .. } = err;
        assert_eq!(failed, 2);
        assert!(matches!(first, HandshakeError::PeerUnavailable(p) if p.as_str() == "c"));
    }

    #[tokio::test]
    async fn test_untriangulated_graph_spawns_pairwise_handshakes() {
        let mut f = fixture();
        let a = add_peer(&f.registry, "a");
        let b = add_peer(&f.registry, "b");

        let new = graph(&[("a", 0.0, 0.0), ("b", 10.0, 0.0)]);
        let diff = GraphDiff::between(&MeshGraph::empty(), &new);
        let report = f
            .regulator
            .regulate(&diff, &new, RegulationMode::Join)
            .await
            .unwrap();
        assert_eq!(report.detached, 1);

        let event = f.events.recv().await.unwrap();
        assert!(matches!(event, MeshEvent::EdgeEstablished { .. }));
        assert!(a.is_linked_to(b.peer_id()));
        assert_eq!(a.offer_requests(), 1);
    }

    #[tokio::test]
    async fn test_untriangulated_failures_are_not_reported() {
        let mut f = fixture();
        let a = add_peer(&f.registry, "a");
        add_peer(&f.registry, "b");
        a.set_script(MockScript::no_offer());

        let new = graph(&[("a", 0.0, 0.0), ("b", 10.0, 0.0)]);
        let diff = GraphDiff::between(&MeshGraph::empty(), &new);
        let report = f
            .regulator
            .regulate(&diff, &new, RegulationMode::Join)
            .await
            .unwrap();
        assert!(report.is_clean());

        let event = f.events.recv().await.unwrap();
        assert!(matches!(event, MeshEvent::EdgeFailed { .. }));
    }

    #[tokio::test]
    async fn test_untriangulated_graph_still_drops_removed_edges() {
        let mut f = fixture();
        let a = add_peer(&f.registry, "a");
        let c = add_peer(&f.registry, "c");

        // b leaves the triangle; its channel is already gone
        let old = triangle();
        let new = graph(&[("a", 0.0, 0.0), ("c", 5.0, 8.0)]);
        assert!(!new.is_triangulated());
        let diff = GraphDiff::between(&old, &new);

        let report = f
            .regulator
            .regulate(&diff, &new, RegulationMode::Leave)
            .await
            .unwrap();
        assert_eq!(report.detached, 1);
        let dropped: Vec<String> = report.dropped.iter().map(|e| e.to_string()).collect();
        assert_eq!(dropped, vec!["a~b", "b~c"]);

        let b_hash = PeerId::new("b").hashed();
        assert_eq!(a.disconnects(), vec![b_hash.clone()]);
        assert_eq!(c.disconnects(), vec![b_hash]);

        let mut dropped_events = 0;
        loop {
            match f.events.recv().await.unwrap() {
                MeshEvent::EdgeDropped { .. } => dropped_events += 1,
                MeshEvent::EdgeEstablished { .. } => break,
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(dropped_events, 2);
        // The surviving pair is handshaked again by a detached task
        assert!(a.is_linked_to(c.peer_id()));
        assert_eq!(a.offer_requests(), 1);
    }
}
