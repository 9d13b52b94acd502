//! Peer id to channel lookup

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use weft_core::{PeerChannel, PeerId};

/// Live channels of every connected peer
///
/// Shared between the coordinator's public surface (which registers and
/// deregisters on transport events) and the sequencer worker (which
/// resolves channels while regulating).
#[derive(Default)]
pub struct PeerRegistry {
    channels: DashMap<PeerId, Arc<dyn PeerChannel>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its peer id
    ///
    /// Returns `false` and leaves the registry untouched if the id is
    /// already taken.
    pub fn register(&self, channel: Arc<dyn PeerChannel>) -> bool {
        match self.channels.entry(channel.peer_id().clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(channel);
                true
            }
        }
    }

    /// Remove and return the channel for `peer`
    pub fn deregister(&self, peer: &PeerId) -> Option<Arc<dyn PeerChannel>> {
        self.channels.remove(peer).map(|(_, channel)| channel)
    }

    /// Remove `channel`, but only if it is still the one registered for
    /// its peer id
    pub fn remove_channel(&self, channel: &Arc<dyn PeerChannel>) -> bool {
        self.channels
            .remove_if(channel.peer_id(), |_, held| Arc::ptr_eq(held, channel))
            .is_some()
    }

    /// Look up the channel for `peer`
    pub fn get(&self, peer: &PeerId) -> Option<Arc<dyn PeerChannel>> {
        self.channels.get(peer).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.channels.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Registered peer ids in ascending order
    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.channels.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}
