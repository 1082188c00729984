//! Snapshots and round-graph points.
//!
//! A snapshot is a transaction after consensus: the node that finalised
//! it, the round it landed in, and the position the local store assigned it
//! in its topological order. Topological order is local. Two stores may
//! number the same snapshot differently, which is why peers exchange round
//! graphs rather than raw offsets.

use serde::{Deserialize, Serialize};

use super::NodeId;
use crate::crypto::Hash;
use crate::transaction::SignedTransaction;

/// A finalised transaction with its ordering metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub node_id: NodeId,
    pub round_number: u64,
    /// Milliseconds since the Unix epoch at which the node finalised it.
    pub timestamp: u64,
    /// Position in the local store's history. Gap-free and assigned once.
    pub topological_order: u64,
    pub transaction: SignedTransaction,
}

impl Snapshot {
    /// Payload hash of the carried transaction. Two snapshots with the same
    /// payload hash are the same snapshot as far as replication cares.
    pub fn payload_hash(&self) -> Hash {
        self.transaction.payload_hash()
    }
}

/// A node's latest known round, as one entry of a round graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncPoint {
    pub node_id: NodeId,
    pub number: u64,
}

impl SyncPoint {
    pub fn new(node_id: NodeId, number: u64) -> Self {
        Self { node_id, number }
    }
}
