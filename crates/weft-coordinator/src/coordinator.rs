//! Mesh coordinator
//!
//! [`MeshCoordinator`] is the entry point a transport integration talks
//! to. It registers channels as peers connect, queues a join or leave
//! for each transport event, and publishes [`MeshEvent`]s as the mesh
//! changes.
//!
//! Each instance owns its own state, queue, and worker task; any number
//! of coordinators can run side by side in one process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, instrument, warn};
use weft_core::{MeshError, MeshEvent, MeshResult, PeerChannel, PeerId, SequencerError};
use weft_topology::{GraphDiff, MeshGraph, Vertex, VertexHandle};

use crate::config::CoordinatorConfig;
use crate::handshake::ConnectionHandshake;
use crate::locator::{PeerMetadata, PositionLocator, RandomLocator};
use crate::registry::PeerRegistry;
use crate::regulation::{RegulationMode, Regulator};
use crate::sequencer::Sequencer;
use crate::state::MeshState;

/// Collaborators shared with queued actions
struct Shared {
    registry: Arc<PeerRegistry>,
    locator: Arc<dyn PositionLocator>,
    regulator: Regulator,
    events: broadcast::Sender<MeshEvent>,
    /// Handles handed out and not yet disconnected
    handles: DashMap<VertexHandle, PeerId>,
}

/// Keeps live peer links in step with the Delaunay graph of peer positions
///
/// Must be created inside a tokio runtime: construction spawns the
/// worker that runs joins and leaves.
///
/// # Example
///
/// ```rust,ignore
/// let mesh = MeshCoordinator::new(CoordinatorConfig::default());
/// let mut events = mesh.subscribe();
///
/// let handle = mesh.peer_connected(channel, PeerMetadata::default()).await?;
/// while let Ok(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// ```
pub struct MeshCoordinator {
    config: CoordinatorConfig,
    shared: Arc<Shared>,
    sequencer: Sequencer<MeshState>,
    next_handle: AtomicU64,
}

impl MeshCoordinator {
    /// Create a coordinator that places peers at random
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_locator(config, Arc::new(RandomLocator::default()))
    }

    /// Create a coordinator with a custom position locator
    pub fn with_locator(config: CoordinatorConfig, locator: Arc<dyn PositionLocator>) -> Self {
        let registry = Arc::new(PeerRegistry::new());
        let (events, _) = broadcast::channel(config.event_buffer_size.max(1));
        let regulator = Regulator::new(
            Arc::clone(&registry),
            ConnectionHandshake::new(config.handshake_timeout()),
            events.clone(),
        );

        let span = info_span!("mesh", name = %config.name);
        let sequencer = Sequencer::spawn(MeshState::new(), span);

        info!(
            name = %config.name,
            timeout_ms = config.handshake_timeout_ms,
            "Mesh coordinator started"
        );

        Self {
            config,
            shared: Arc::new(Shared {
                registry,
                locator,
                regulator,
                events,
                handles: DashMap::new(),
            }),
            sequencer,
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Channels of every currently connected peer
    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.shared.registry
    }

    /// Subscribe to mesh events
    pub fn subscribe(&self) -> broadcast::Receiver<MeshEvent> {
        self.shared.events.subscribe()
    }

    /// Handle a transport connect event
    ///
    /// The channel is registered immediately and a join is queued behind
    /// every earlier event. The returned future resolves with the new
    /// vertex's handle once the join has been regulated and committed,
    /// or with the reason it was rejected. A rejected peer is
    /// deregistered again.
    pub fn peer_connected(
        &self,
        channel: Arc<dyn PeerChannel>,
        metadata: PeerMetadata,
    ) -> BoxFuture<'static, MeshResult<VertexHandle>> {
        let peer = channel.peer_id().clone();

        if !self.shared.registry.register(Arc::clone(&channel)) {
            warn!(peer = %peer.short_id(), "Connect for an already registered peer id");
            return async move { Err(MeshError::DuplicatePeer(peer)) }.boxed();
        }

        let handle = VertexHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.shared.handles.insert(handle, peer.clone());
        debug!(peer = %peer.short_id(), %handle, "Queued join");

        let shared = Arc::clone(&self.shared);
        let pending = self.sequencer.enqueue(move |state: &mut MeshState| {
            async move {
                let result = shared.join(state, peer.clone(), handle, metadata).await;
                if let Err(e) = &result {
                    shared.registry.remove_channel(&channel);
                    shared.handles.remove(&handle);
                    warn!(peer = %peer.short_id(), error = %e, "Join rejected");
                    shared.publish(MeshEvent::peer_rejected(peer, e.to_string()));
                }
                result
            }
            .boxed()
        });

        async move { settle(pending.await) }.boxed()
    }

    /// Handle a transport disconnect event
    ///
    /// The peer's channel is deregistered immediately and a leave is
    /// queued behind every earlier event. The leave always resolves `Ok`
    /// once the vertex is gone; an unknown handle is logged and ignored.
    pub fn peer_disconnected(&self, handle: VertexHandle) -> BoxFuture<'static, MeshResult<()>> {
        match self.shared.handles.remove(&handle) {
            Some((_, peer)) => {
                self.shared.registry.deregister(&peer);
                debug!(peer = %peer.short_id(), %handle, "Queued leave");
            }
            None => debug!(%handle, "Disconnect for an unknown handle"),
        }

        let shared = Arc::clone(&self.shared);
        let pending = self.sequencer.enqueue(move |state: &mut MeshState| {
            async move { shared.leave(state, handle).await }.boxed()
        });

        async move { settle(pending.await) }.boxed()
    }

    /// The mesh state as of every event queued so far
    pub fn snapshot(&self) -> BoxFuture<'static, MeshResult<MeshState>> {
        let pending = self.sequencer.enqueue(|state: &mut MeshState| {
            let snapshot = state.clone();
            async move { Ok::<_, MeshError>(snapshot) }.boxed()
        });

        async move { settle(pending.await) }.boxed()
    }
}

impl Shared {
    #[instrument(skip_all, fields(peer = %peer.short_id(), handle = %handle))]
    async fn join(
        &self,
        state: &mut MeshState,
        peer: PeerId,
        handle: VertexHandle,
        metadata: PeerMetadata,
    ) -> MeshResult<VertexHandle> {
        let position = self.locator.locate(&peer, &metadata).await?;
        let vertices = state.with_vertex(Vertex::new(position, peer.clone(), handle));
        let graph = MeshGraph::compute(&vertices)?;
        let diff = GraphDiff::between(&state.graph, &graph);

        self.regulator
            .regulate(&diff, &graph, RegulationMode::Join)
            .await?;

        state.replace(vertices, graph);
        info!(
            x = position.x,
            y = position.y,
            vertices = state.len(),
            edges = state.edges().len(),
            "Peer joined"
        );
        if state.is_isolated(&peer) {
            warn!(
                x = position.x,
                y = position.y,
                "Peer shares its position with another vertex and has no neighbors"
            );
        }
        self.publish(MeshEvent::peer_joined(peer, state.len()));
        Ok(handle)
    }

    #[instrument(skip_all, fields(handle = %handle))]
    async fn leave(&self, state: &mut MeshState, handle: VertexHandle) -> MeshResult<()> {
        let Some(index) = state.find(handle) else {
            warn!("Leave for a vertex that is not in the mesh");
            return Ok(());
        };

        let departed = state.vertices[index].peer.clone();
        let vertices = state.without_vertex(index);
        // Every committed position was finite, so this cannot fail
        let graph = MeshGraph::compute(&vertices)?;
        let diff = GraphDiff::between(&state.graph, &graph);

        state.replace(vertices, graph.clone());
        info!(
            peer = %departed.short_id(),
            vertices = state.len(),
            edges = state.edges().len(),
            "Peer left"
        );
        self.publish(MeshEvent::peer_left(departed, state.len()));

        match self
            .regulator
            .regulate(&diff, &graph, RegulationMode::Leave)
            .await
        {
            Ok(report) if !report.is_clean() => {
                warn!(failed = report.failed.len(), "Leave regulation left gaps")
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Leave regulation failed"),
        }
        Ok(())
    }

    fn publish(&self, event: MeshEvent) {
        let _ = self.events.send(event);
    }
}

/// Flatten a queued action's outcome
fn settle<T>(outcome: Result<MeshResult<T>, SequencerError>) -> MeshResult<T> {
    outcome.unwrap_or_else(|e| Err(e.into()))
}
