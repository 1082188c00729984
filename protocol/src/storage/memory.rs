//! # MemoryStore
//!
//! A complete in-process store: UTXO set, ghost-key index, deposit claims,
//! registries and the snapshot history, all behind one `parking_lot`
//! `RwLock`. Good enough for tests, simulations and light nodes that
//! rebuild from peers on start; not good enough for anything you would
//! like to survive a reboot.
//!
//! ## Layout
//!
//! | Map              | Key                 | Value                        |
//! |------------------|---------------------|------------------------------|
//! | `utxos`          | `(tx hash, index)`  | `Utxo` (with its lock)       |
//! | `ghosts`         | ghost public key    | consuming tx hash            |
//! | `deposits`       | deposit unique key  | claiming tx hash             |
//! | `snapshots`      | topological order   | `Snapshot` (a `Vec`, dense)  |
//! | `by_transaction` | tx hash             | topological order            |
//! | `rounds`         | `(node, round)`     | topological orders           |
//! | `graph`          | node                | latest round                 |
//!
//! Topological order is the snapshot's index in `snapshots`, so it starts
//! at 0 with genesis and never has gaps.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::{
    ConsensusNode, DepositStore, Domain, DomainReader, GhostChecker, NodeId, NodeReader, Snapshot,
    SnapshotReader, StoreError, StoreResult, SyncPoint, TransactionReader, UtxoLocker, UtxoReader,
};
use crate::crypto::{Hash, PublicKey};
use crate::transaction::{DepositData, Input, SignedTransaction, Utxo, ValidationError};

#[derive(Default)]
struct Inner {
    utxos: HashMap<(Hash, u32), Utxo>,
    ghosts: HashMap<PublicKey, Hash>,
    deposits: HashMap<Hash, Hash>,
    domains: Vec<Domain>,
    nodes: Vec<ConsensusNode>,
    transactions: HashMap<Hash, SignedTransaction>,
    snapshots: Vec<Snapshot>,
    by_transaction: HashMap<Hash, u64>,
    rounds: BTreeMap<(NodeId, u64), Vec<u64>>,
    graph: BTreeMap<NodeId, u64>,
}

impl Inner {
    fn lock_utxo(&mut self, hash: &Hash, index: u32, tx: &Hash, fork: bool) -> StoreResult<Utxo> {
        let utxo = self
            .utxos
            .get_mut(&(*hash, index))
            .ok_or_else(|| StoreError::NotFound(format!("utxo {}:{}", hash, index)))?;
        if let Some(locked_by) = utxo.lock {
            if locked_by != *tx && !fork {
                return Err(StoreError::UtxoLocked {
                    hash: *hash,
                    index,
                    locked_by,
                });
            }
        }
        utxo.lock = Some(*tx);
        for key in &utxo.output.keys {
            self.ghosts.insert(*key, *tx);
        }
        Ok(utxo.clone())
    }

    fn check_deposit(&self, deposit: &DepositData, tx: &Hash) -> StoreResult<()> {
        let key = deposit.unique_key();
        match self.deposits.get(&key) {
            Some(locked_by) if locked_by != tx => Err(StoreError::DepositLocked {
                deposit: key,
                locked_by: *locked_by,
            }),
            _ => Ok(()),
        }
    }

    fn lock_deposit(&mut self, deposit: &DepositData, tx: &Hash, fork: bool) -> StoreResult<()> {
        if !fork {
            self.check_deposit(deposit, tx)?;
        }
        self.deposits.insert(deposit.unique_key(), *tx);
        Ok(())
    }
}

/// In-memory implementation of every storage trait.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_domain(&self, domain: Domain) {
        self.inner.write().domains.push(domain);
    }

    pub fn add_consensus_node(&self, node: ConsensusNode) {
        self.inner.write().nodes.push(node);
    }

    /// Put an output straight into the UTXO set, bypassing history.
    pub fn insert_utxo(&self, utxo: Utxo) {
        self.inner
            .write()
            .utxos
            .insert((utxo.hash, utxo.index), utxo);
    }

    /// Record `transaction` as finalised by `node_id` in `round`.
    ///
    /// Consumes its inputs, creates its outputs and appends a snapshot at
    /// the next topological order. Writing a transaction that is already in
    /// history returns the existing snapshot unchanged, so order is assigned
    /// exactly once. Inputs are checked before anything is written: if one
    /// is missing or held by another transaction, the store is untouched.
    ///
    /// No signature or script checks happen here; that is
    /// [`accept_transaction`](Self::accept_transaction)'s job. A transaction
    /// without inputs, such as genesis, only creates outputs.
    pub fn write_snapshot(
        &self,
        node_id: NodeId,
        round_number: u64,
        timestamp: u64,
        transaction: SignedTransaction,
    ) -> StoreResult<Snapshot> {
        let hash = transaction.payload_hash();
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(&order) = inner.by_transaction.get(&hash) {
            return inner
                .snapshots
                .get(order as usize)
                .cloned()
                .ok_or_else(|| StoreError::Backend(format!("snapshot index {} missing", order)));
        }

        for input in &transaction.transaction.inputs {
            match input {
                Input::Utxo { hash: source, index } => {
                    let utxo = inner
                        .utxos
                        .get(&(*source, *index))
                        .ok_or_else(|| StoreError::NotFound(format!("utxo {}:{}", source, index)))?;
                    if let Some(locked_by) = utxo.lock {
                        if locked_by != hash {
                            return Err(StoreError::UtxoLocked {
                                hash: *source,
                                index: *index,
                                locked_by,
                            });
                        }
                    }
                }
                Input::Deposit(deposit) => inner.check_deposit(deposit, &hash)?,
            }
        }

        for input in &transaction.transaction.inputs {
            match input {
                Input::Utxo { hash: source, index } => {
                    inner.lock_utxo(source, *index, &hash, false)?;
                }
                Input::Deposit(deposit) => inner.lock_deposit(deposit, &hash, false)?,
            }
        }

        for (index, output) in transaction.transaction.outputs.iter().enumerate() {
            let index = index as u32;
            inner.utxos.insert(
                (hash, index),
                Utxo {
                    hash,
                    index,
                    asset: transaction.transaction.asset,
                    output: output.clone(),
                    lock: None,
                },
            );
        }

        let topological_order = inner.snapshots.len() as u64;
        let snapshot = Snapshot {
            node_id,
            round_number,
            timestamp,
            topological_order,
            transaction: transaction.clone(),
        };
        inner.snapshots.push(snapshot.clone());
        inner.by_transaction.insert(hash, topological_order);
        inner
            .rounds
            .entry((node_id, round_number))
            .or_default()
            .push(topological_order);
        let latest = inner.graph.entry(node_id).or_insert(round_number);
        if *latest < round_number {
            *latest = round_number;
        }
        inner.transactions.insert(hash, transaction);

        debug!(
            tx = %hash,
            node = %node_id,
            round = round_number,
            topology = topological_order,
            "snapshot written"
        );
        Ok(snapshot)
    }

    /// Validate `transaction`, then write it as a snapshot.
    ///
    /// An already-known transaction short-circuits to its existing snapshot
    /// without validation, which would otherwise fail on inputs it has
    /// consumed itself.
    pub fn accept_transaction(
        &self,
        node_id: NodeId,
        round_number: u64,
        timestamp: u64,
        transaction: SignedTransaction,
    ) -> Result<Snapshot, ValidationError> {
        let hash = transaction.payload_hash();
        if let Some(existing) = self.read_snapshot_by_transaction_hash(&hash)? {
            return Ok(existing);
        }
        transaction.validate(self)?;
        Ok(self.write_snapshot(node_id, round_number, timestamp, transaction)?)
    }

    /// Number of snapshots in history, which is also the next topological
    /// order to be assigned.
    pub fn snapshot_count(&self) -> u64 {
        self.inner.read().snapshots.len() as u64
    }

    /// Number of outputs (spent or not) the store knows.
    pub fn utxo_count(&self) -> usize {
        self.inner.read().utxos.len()
    }
}

impl UtxoReader for MemoryStore {
    fn read_utxo(&self, hash: &Hash, index: u32) -> StoreResult<Option<Utxo>> {
        Ok(self.inner.read().utxos.get(&(*hash, index)).cloned())
    }
}

impl UtxoLocker for MemoryStore {
    fn lock_utxo(&self, hash: &Hash, index: u32, tx: &Hash, fork: bool) -> StoreResult<Utxo> {
        self.inner.write().lock_utxo(hash, index, tx, fork)
    }
}

impl GhostChecker for MemoryStore {
    fn check_ghost(&self, key: &PublicKey) -> StoreResult<Option<Hash>> {
        Ok(self.inner.read().ghosts.get(key).copied())
    }
}

impl DomainReader for MemoryStore {
    fn read_domains(&self) -> Vec<Domain> {
        self.inner.read().domains.clone()
    }
}

impl NodeReader for MemoryStore {
    fn read_consensus_nodes(&self) -> Vec<ConsensusNode> {
        self.inner.read().nodes.clone()
    }
}

impl TransactionReader for MemoryStore {
    fn read_transaction(&self, hash: &Hash) -> StoreResult<Option<SignedTransaction>> {
        Ok(self.inner.read().transactions.get(hash).cloned())
    }
}

impl DepositStore for MemoryStore {
    fn check_deposit_input(&self, deposit: &DepositData, tx: &Hash) -> StoreResult<()> {
        self.inner.read().check_deposit(deposit, tx)
    }

    fn lock_deposit_input(&self, deposit: &DepositData, tx: &Hash, fork: bool) -> StoreResult<()> {
        self.inner.write().lock_deposit(deposit, tx, fork)
    }
}

impl SnapshotReader for MemoryStore {
    fn build_graph(&self) -> StoreResult<Vec<SyncPoint>> {
        Ok(self
            .inner
            .read()
            .graph
            .iter()
            .map(|(node, round)| SyncPoint::new(*node, *round))
            .collect())
    }

    fn read_snapshots_for_node_round(&self, node: &NodeId, round: u64) -> StoreResult<Vec<Snapshot>> {
        let inner = self.inner.read();
        Ok(inner
            .rounds
            .get(&(*node, round))
            .map(|orders| {
                orders
                    .iter()
                    .filter_map(|order| inner.snapshots.get(*order as usize).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn read_snapshot_by_transaction_hash(&self, hash: &Hash) -> StoreResult<Option<Snapshot>> {
        let inner = self.inner.read();
        Ok(inner
            .by_transaction
            .get(hash)
            .and_then(|order| inner.snapshots.get(*order as usize).cloned()))
    }

    fn read_snapshots_since_topology(&self, offset: u64, limit: usize) -> StoreResult<Vec<Snapshot>> {
        let inner = self.inner.read();
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(inner
            .snapshots
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::native_asset_id;
    use crate::identity::Address;
    use crate::transaction::{Integer, Script, Transaction};

    fn genesis_tx(owner: &Address, amount: u64) -> SignedTransaction {
        let mut tx = Transaction::new(native_asset_id());
        tx.add_script_output(&[owner.public()], Script::new_threshold(1), Integer::new(amount))
            .unwrap();
        SignedTransaction::new(tx)
    }

    fn transfer(store: &MemoryStore, from: &Address, source: Hash, amount: u64) -> SignedTransaction {
        let mut tx = Transaction::new(native_asset_id());
        tx.add_input(source, 0).unwrap();
        tx.add_script_output(&[from.public()], Script::new_threshold(1), Integer::new(amount))
            .unwrap();
        let mut signed = SignedTransaction::new(tx);
        signed.sign_input(store, 0, &[from.clone()]).unwrap();
        signed
    }

    #[test]
    fn genesis_gets_order_zero_and_creates_outputs() {
        let store = MemoryStore::new();
        let owner = Address::generate();
        let genesis = genesis_tx(&owner, 10);
        let hash = genesis.payload_hash();
        let snapshot = store.write_snapshot(NodeId::ZERO, 0, 0, genesis).unwrap();
        assert_eq!(snapshot.topological_order, 0);
        assert_eq!(store.snapshot_count(), 1);
        let utxo = store.read_utxo(&hash, 0).unwrap().unwrap();
        assert_eq!(utxo.amount(), Integer::new(10));
        assert_eq!(utxo.lock, None);
    }

    #[test]
    fn orders_are_dense_and_assigned_once() {
        let store = MemoryStore::new();
        let owner = Address::generate();
        let genesis = genesis_tx(&owner, 10);
        let g = genesis.payload_hash();
        store.write_snapshot(NodeId::ZERO, 0, 0, genesis).unwrap();

        let tx = transfer(&store, &owner, g, 10);
        let first = store.write_snapshot(NodeId::ZERO, 1, 1, tx.clone()).unwrap();
        let again = store.write_snapshot(NodeId::ZERO, 1, 1, tx).unwrap();
        assert_eq!(first.topological_order, 1);
        assert_eq!(again, first);
        assert_eq!(store.snapshot_count(), 2);
    }

    #[test]
    fn conflicting_write_leaves_store_untouched() {
        let store = MemoryStore::new();
        let owner = Address::generate();
        let genesis = genesis_tx(&owner, 10);
        let g = genesis.payload_hash();
        store.write_snapshot(NodeId::ZERO, 0, 0, genesis).unwrap();

        let a = transfer(&store, &owner, g, 10);
        let b = transfer(&store, &owner, g, 10);
        store.write_snapshot(NodeId::ZERO, 1, 1, a.clone()).unwrap();
        let utxos_before = store.utxo_count();
        match store.write_snapshot(NodeId::ZERO, 1, 2, b.clone()) {
            Err(StoreError::UtxoLocked { locked_by, .. }) => assert_eq!(locked_by, a.payload_hash()),
            other => panic!("expected UtxoLocked, got {:?}", other),
        }
        assert_eq!(store.utxo_count(), utxos_before);
        assert_eq!(store.snapshot_count(), 2);
        assert!(store
            .read_snapshot_by_transaction_hash(&b.payload_hash())
            .unwrap()
            .is_none());
    }

    #[test]
    fn lock_records_ghost_keys() {
        let store = MemoryStore::new();
        let owner = Address::generate();
        let genesis = genesis_tx(&owner, 10);
        let g = genesis.payload_hash();
        let key = genesis.transaction.outputs[0].keys[0];
        store.write_snapshot(NodeId::ZERO, 0, 0, genesis).unwrap();

        assert_eq!(store.check_ghost(&key).unwrap(), None);
        let spender = Hash::new(b"spender");
        store.lock_utxo(&g, 0, &spender, false).unwrap();
        assert_eq!(store.check_ghost(&key).unwrap(), Some(spender));
    }

    #[test]
    fn lock_missing_utxo_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.lock_utxo(&Hash::new(b"nope"), 0, &Hash::new(b"tx"), false),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn accept_transaction_validates_first() {
        let store = MemoryStore::new();
        let owner = Address::generate();
        let genesis = genesis_tx(&owner, 10);
        let g = genesis.payload_hash();
        store.write_snapshot(NodeId::ZERO, 0, 0, genesis).unwrap();

        let mut unsigned = transfer(&store, &owner, g, 10);
        unsigned.signatures[0].clear();
        assert!(matches!(
            store.accept_transaction(NodeId::ZERO, 1, 1, unsigned),
            Err(ValidationError::ScriptUnsatisfied { .. })
        ));
        assert_eq!(store.snapshot_count(), 1);

        let good = transfer(&store, &owner, g, 10);
        let snapshot = store.accept_transaction(NodeId::ZERO, 1, 1, good.clone()).unwrap();
        assert_eq!(snapshot.topological_order, 1);
        // Replaying is harmless.
        assert_eq!(store.accept_transaction(NodeId::ZERO, 1, 1, good).unwrap(), snapshot);
    }

    #[test]
    fn graph_tracks_latest_round_per_node() {
        let store = MemoryStore::new();
        let owner = Address::generate();
        let node_a = Hash::new(b"a");
        let node_b = Hash::new(b"b");
        store.write_snapshot(node_a, 3, 0, genesis_tx(&owner, 1)).unwrap();
        store.write_snapshot(node_a, 1, 0, genesis_tx(&owner, 2)).unwrap();
        store.write_snapshot(node_b, 7, 0, genesis_tx(&owner, 3)).unwrap();

        let mut graph = store.build_graph().unwrap();
        graph.sort_by_key(|p| p.node_id);
        let mut expected = vec![SyncPoint::new(node_a, 3), SyncPoint::new(node_b, 7)];
        expected.sort_by_key(|p| p.node_id);
        assert_eq!(graph, expected);
    }

    #[test]
    fn round_and_range_reads() {
        let store = MemoryStore::new();
        let owner = Address::generate();
        let node = Hash::new(b"n");
        for (round, amount) in [(0u64, 1u64), (1, 2), (1, 3), (2, 4)] {
            store
                .write_snapshot(node, round, 0, genesis_tx(&owner, amount))
                .unwrap();
        }

        let round_one = store.read_snapshots_for_node_round(&node, 1).unwrap();
        assert_eq!(
            round_one.iter().map(|s| s.topological_order).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(store.read_snapshots_for_node_round(&node, 9).unwrap().is_empty());

        let since = store.read_snapshots_since_topology(2, 10).unwrap();
        assert_eq!(
            since.iter().map(|s| s.topological_order).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(store.read_snapshots_since_topology(0, 2).unwrap().len(), 2);
        assert!(store.read_snapshots_since_topology(99, 10).unwrap().is_empty());
    }

    #[test]
    fn deposit_claims() {
        let store = MemoryStore::new();
        let deposit = DepositData {
            chain: Hash::new(b"chain"),
            asset_key: "key".into(),
            transaction_hash: "0x1".into(),
            output_index: 0,
            amount: Integer::new(1),
        };
        let a = Hash::new(b"a");
        let b = Hash::new(b"b");
        store.check_deposit_input(&deposit, &a).unwrap();
        store.lock_deposit_input(&deposit, &a, false).unwrap();
        store.check_deposit_input(&deposit, &a).unwrap();
        assert!(matches!(
            store.check_deposit_input(&deposit, &b),
            Err(StoreError::DepositLocked { .. })
        ));
        assert!(store.lock_deposit_input(&deposit, &b, false).is_err());
        store.lock_deposit_input(&deposit, &b, true).unwrap();
        store.check_deposit_input(&deposit, &b).unwrap();
    }
}
