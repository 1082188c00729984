//! # Round-Graph Comparison
//!
//! A round graph is the list of `(node, latest round)` pairs a store has
//! seen. When a peer announces its graph we want to know where in *our*
//! history it stops being able to keep up, so we can start streaming from
//! there instead of from the beginning of time.
//!
//! For every node that appears in both graphs and where we are at least as
//! far along as the peer, we look up the first snapshot that node finalised
//! in the peer's latest round, resolve it to our copy through its payload
//! hash, and take its topological order. The smallest of those is the sync
//! offset. Nobody qualifying means 0, which callers read as "nothing to go
//! on yet".
//!
//! Topological order 0 is genesis, which every store seeds for itself, so it
//! is coerced to 1 here. That keeps 0 free to mean "no offset" and means
//! genesis never travels over the wire.

use std::collections::HashMap;

use super::sync::SyncError;
use crate::storage::{NodeId, SnapshotReader, StoreError, SyncPoint};

/// Compute the topological offset from which `remote` should be fed.
///
/// Pure with respect to the store: repeated calls against an unchanged
/// store and the same graphs return the same offset.
///
/// # Errors
///
/// [`SyncError::StoreReadFailed`] if a qualifying round's snapshot cannot be
/// read or cannot be resolved by its transaction hash.
pub fn compare_round_graph_and_get_topological_offset<S: SnapshotReader + ?Sized>(
    store: &S,
    local: &[SyncPoint],
    remote: &[SyncPoint],
) -> Result<u64, SyncError> {
    let local: HashMap<NodeId, u64> = local.iter().map(|p| (p.node_id, p.number)).collect();

    let mut offset = 0u64;
    for point in remote {
        let Some(&ours) = local.get(&point.node_id) else {
            continue;
        };
        if ours < point.number {
            continue;
        }

        let snapshots = store
            .read_snapshots_for_node_round(&point.node_id, point.number)
            .map_err(SyncError::StoreReadFailed)?;
        // A node can be in the graph with a round we hold nothing for, e.g.
        // after pruning. Nothing to anchor on.
        let Some(first) = snapshots.first() else {
            continue;
        };

        let hash = first.payload_hash();
        let canonical = store
            .read_snapshot_by_transaction_hash(&hash)
            .map_err(SyncError::StoreReadFailed)?
            .ok_or_else(|| {
                SyncError::StoreReadFailed(StoreError::NotFound(format!("snapshot for {}", hash)))
            })?;

        let topology = canonical.topological_order.max(1);
        if offset == 0 || topology < offset {
            offset = topology;
        }
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::native_asset_id;
    use crate::crypto::Hash;
    use crate::identity::Address;
    use crate::storage::{MemoryStore, Snapshot, StoreResult};
    use crate::transaction::{Integer, Script, SignedTransaction, Transaction};

    /// An input-less transaction with a fresh mask, so every call is unique.
    fn filler() -> SignedTransaction {
        let mut tx = Transaction::new(native_asset_id());
        tx.add_script_output(
            &[Address::generate().public()],
            Script::new_threshold(1),
            Integer::new(1),
        )
        .unwrap();
        SignedTransaction::new(tx)
    }

    fn node(tag: &[u8]) -> NodeId {
        Hash::new(tag)
    }

    /// Genesis at order 0, then `rounds` rounds for nodes a and b,
    /// interleaved: a1 b1 a2 b2 ...
    fn history(rounds: u64) -> MemoryStore {
        let store = MemoryStore::new();
        store.write_snapshot(NodeId::ZERO, 0, 0, filler()).unwrap();
        for round in 1..=rounds {
            store.write_snapshot(node(b"a"), round, 0, filler()).unwrap();
            store.write_snapshot(node(b"b"), round, 0, filler()).unwrap();
        }
        store
    }

    #[test]
    fn picks_minimum_across_nodes() {
        let store = history(3);
        let local = store.build_graph().unwrap();
        // a2 is order 3, b1 is order 2.
        let remote = vec![SyncPoint::new(node(b"a"), 2), SyncPoint::new(node(b"b"), 1)];
        let offset = compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap();
        assert_eq!(offset, 2);
    }

    #[test]
    fn skips_nodes_where_remote_is_ahead() {
        let store = history(2);
        let local = store.build_graph().unwrap();
        let remote = vec![SyncPoint::new(node(b"a"), 9), SyncPoint::new(node(b"b"), 2)];
        // b2 is order 4; a is ignored entirely.
        let offset = compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap();
        assert_eq!(offset, 4);
    }

    #[test]
    fn no_common_node_gives_zero() {
        let store = history(2);
        let local = store.build_graph().unwrap();
        let remote = vec![SyncPoint::new(node(b"stranger"), 1)];
        assert_eq!(
            compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap(),
            0
        );
        assert_eq!(
            compare_round_graph_and_get_topological_offset(&store, &local, &[]).unwrap(),
            0
        );
    }

    #[test]
    fn remote_ahead_everywhere_gives_zero() {
        let store = history(2);
        let local = store.build_graph().unwrap();
        let remote = vec![SyncPoint::new(node(b"a"), 5), SyncPoint::new(node(b"b"), 5)];
        assert_eq!(
            compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap(),
            0
        );
    }

    #[test]
    fn genesis_is_coerced_to_one() {
        let store = history(1);
        let local = store.build_graph().unwrap();
        let remote = vec![SyncPoint::new(NodeId::ZERO, 0)];
        assert_eq!(
            compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap(),
            1
        );
    }

    #[test]
    fn is_idempotent() {
        let store = history(3);
        let local = store.build_graph().unwrap();
        let remote = vec![SyncPoint::new(node(b"a"), 3), SyncPoint::new(node(b"b"), 2)];
        let first = compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap();
        let second = compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, 4);
    }

    #[test]
    fn empty_round_is_skipped() {
        let store = history(2);
        // Claim we know round 7 for a without holding any snapshot for it.
        let local = vec![SyncPoint::new(node(b"a"), 7), SyncPoint::new(node(b"b"), 2)];
        let remote = vec![SyncPoint::new(node(b"a"), 7), SyncPoint::new(node(b"b"), 2)];
        assert_eq!(
            compare_round_graph_and_get_topological_offset(&store, &local, &remote).unwrap(),
            4
        );
    }

    /// Round lookups succeed but the hash index has lost the snapshot.
    struct Unresolvable(MemoryStore);

    impl SnapshotReader for Unresolvable {
        fn build_graph(&self) -> StoreResult<Vec<SyncPoint>> {
            self.0.build_graph()
        }
        fn read_snapshots_for_node_round(&self, node: &NodeId, round: u64) -> StoreResult<Vec<Snapshot>> {
            self.0.read_snapshots_for_node_round(node, round)
        }
        fn read_snapshot_by_transaction_hash(&self, _hash: &Hash) -> StoreResult<Option<Snapshot>> {
            Ok(None)
        }
        fn read_snapshots_since_topology(&self, offset: u64, limit: usize) -> StoreResult<Vec<Snapshot>> {
            self.0.read_snapshots_since_topology(offset, limit)
        }
    }

    #[test]
    fn unresolvable_snapshot_is_a_read_failure() {
        let store = Unresolvable(history(1));
        let local = store.build_graph().unwrap();
        let remote = vec![SyncPoint::new(node(b"a"), 1)];
        match compare_round_graph_and_get_topological_offset(&store, &local, &remote) {
            Err(SyncError::StoreReadFailed(StoreError::NotFound(_))) => {}
            other => panic!("expected StoreReadFailed, got {:?}", other),
        }
    }
}
