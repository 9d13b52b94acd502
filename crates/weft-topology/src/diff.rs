//! Edge diff between two mesh graphs
//!
//! [`GraphDiff::between`] classifies every edge of the old and new graph
//! by peer id, never by vertex index, and files each added or removed
//! edge under its canonically smaller peer only:
//!
//! ```text
//! old: a~b            new: a~b, a~c, b~c
//! diff: a => add [c]
//!       b => add [c]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use weft_core::{EdgeKey, PeerId};

use crate::graph::MeshGraph;

/// Classification of an edge while diffing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeState {
    /// Seen in the old graph, not (yet) in the new one
    WasPresent,
    /// Present in both graphs
    Unchanged,
    /// Present in the new graph only
    New,
}

/// Edge instructions owned by one peer
///
/// Every id listed is larger than the owning peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDiff {
    /// Peers to establish a link with
    pub add: Vec<PeerId>,
    /// Peers to drop the link with
    pub remove: Vec<PeerId>,
}

impl PeerDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Per-peer edge additions and removals turning one graph into another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDiff {
    entries: BTreeMap<PeerId, PeerDiff>,
}

impl GraphDiff {
    /// Diff `old` against `new`
    pub fn between(old: &MeshGraph, new: &MeshGraph) -> Self {
        let mut table: BTreeMap<EdgeKey, EdgeState> = BTreeMap::new();

        for edge in old.sides() {
            table.insert(edge, EdgeState::WasPresent);
        }

        for edge in new.sides() {
            let state = table.entry(edge).or_insert(EdgeState::New);
            if *state == EdgeState::WasPresent {
                *state = EdgeState::Unchanged;
            }
        }

        let mut diff = Self::default();
        for (edge, state) in table {
            let (low, high) = edge.into_parts();
            match state {
                EdgeState::WasPresent => diff.entries.entry(low).or_default().remove.push(high),
                EdgeState::New => diff.entries.entry(low).or_default().add.push(high),
                EdgeState::Unchanged => {}
            }
        }
        diff
    }

    /// Whether the graphs had identical edge sets
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of peers carrying instructions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Instructions filed under `peer`
    pub fn get(&self, peer: &PeerId) -> Option<&PeerDiff> {
        self.entries.get(peer)
    }

    /// All entries in ascending peer order
    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerDiff)> {
        self.entries.iter()
    }

    /// Edges to establish
    pub fn added(&self) -> Vec<EdgeKey> {
        self.collect_edges(|entry| &entry.add)
    }

    /// Edges to tear down
    pub fn removed(&self) -> Vec<EdgeKey> {
        self.collect_edges(|entry| &entry.remove)
    }

    fn collect_edges(&self, pick: impl Fn(&PeerDiff) -> &Vec<PeerId>) -> Vec<EdgeKey> {
        self.entries
            .iter()
            .flat_map(|(low, entry)| {
                pick(entry)
                    .iter()
                    .filter_map(move |high| EdgeKey::new(low.clone(), high.clone()))
            })
            .collect()
    }
}
