//! Peer wire messages.
//!
//! Two kinds of traffic flow between peers: snapshots being replicated, and
//! round graphs announcing how far along a node is. Both go over the wire as
//! `bincode`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Snapshot, SyncPoint};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message encoding failed: {0}")]
    Encode(String),

    #[error("message decoding failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// One replicated snapshot.
    Snapshot(Snapshot),
    /// The sender's current round graph.
    Graph(Vec<SyncPoint>),
}

impl PeerMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        bincode::serialize(self).map_err(|e| MessageError::Encode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        bincode::deserialize(bytes).map_err(|e| MessageError::Decode(e.to_string()))
    }
}

/// The message the sync loop sends for each snapshot it streams.
pub fn build_snapshot_message(snapshot: &Snapshot) -> PeerMessage {
    PeerMessage::Snapshot(snapshot.clone())
}

pub fn build_graph_message(graph: Vec<SyncPoint>) -> PeerMessage {
    PeerMessage::Graph(graph)
}
