//! # Storage Module
//!
//! The ledger core never touches a disk. Everything it needs from
//! persistent state is expressed as a handful of narrow capability traits,
//! and the node plugs in whatever backs them.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs      - capability traits, StoreError, Domain, ConsensusNode
//! snapshot.rs - Snapshot and SyncPoint, the units of replication
//! memory.rs   - MemoryStore, a complete in-process implementation
//! ```
//!
//! ## Who needs what
//!
//! ```text
//! Signer     -> UtxoReader
//! Validator  -> UtxoReader + GhostChecker + DomainReader + DepositStore
//! lock_inputs-> UtxoLocker + DepositStore
//! Comparator -> SnapshotReader
//! Sync loop  -> SnapshotReader
//! ```
//!
//! [`LedgerStore`] bundles the transaction-side traits and is blanket
//! implemented, so a backend only ever implements the pieces.
//!
//! ## Contract
//!
//! Implementations must be safe to call from many threads at once. A
//! failed call leaves the store unchanged. Locking an output is the only
//! write the ledger core performs, and it must be atomic per output: two
//! racing transactions cannot both win the same UTXO without `fork`.

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::{Snapshot, SyncPoint};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Hash, PublicKey};
use crate::identity::PublicAddress;
use crate::transaction::{DepositData, SignedTransaction, Utxo};

/// Node identifiers are the hash of the node's signer address.
pub type NodeId = Hash;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors a store may report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("utxo {hash}:{index} already locked by {locked_by}")]
    UtxoLocked {
        hash: Hash,
        index: u32,
        locked_by: Hash,
    },

    #[error("deposit {deposit} already claimed by {locked_by}")]
    DepositLocked { deposit: Hash, locked_by: Hash },

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Registry records
// ---------------------------------------------------------------------------

/// A registered deposit domain: the authority allowed to sign deposit
/// inputs into the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub account: PublicAddress,
}

/// A consensus participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusNode {
    pub id: NodeId,
    pub signer: PublicAddress,
}

impl ConsensusNode {
    pub fn new(signer: PublicAddress) -> Self {
        Self {
            id: signer.hash(),
            signer,
        }
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

pub trait UtxoReader {
    /// The output at `hash:index`, or `None` if it never existed.
    fn read_utxo(&self, hash: &Hash, index: u32) -> StoreResult<Option<Utxo>>;
}

pub trait UtxoLocker {
    /// Reserve `hash:index` for transaction `tx`.
    ///
    /// Idempotent for the same `tx`. Fails with [`StoreError::UtxoLocked`]
    /// if another transaction holds the lock, unless `fork` is set, in which
    /// case the lock is transferred.
    fn lock_utxo(&self, hash: &Hash, index: u32, tx: &Hash, fork: bool) -> StoreResult<Utxo>;
}

pub trait GhostChecker {
    /// The transaction that consumed `key`, if any.
    fn check_ghost(&self, key: &PublicKey) -> StoreResult<Option<Hash>>;
}

pub trait DomainReader {
    fn read_domains(&self) -> Vec<Domain>;
}

pub trait NodeReader {
    fn read_consensus_nodes(&self) -> Vec<ConsensusNode>;
}

pub trait TransactionReader {
    fn read_transaction(&self, hash: &Hash) -> StoreResult<Option<SignedTransaction>>;
}

pub trait DepositStore {
    /// Succeeds if `deposit` is unclaimed or already claimed by `tx`.
    fn check_deposit_input(&self, deposit: &DepositData, tx: &Hash) -> StoreResult<()>;

    /// Claim `deposit` for `tx`, with the same `fork` semantics as
    /// [`UtxoLocker::lock_utxo`].
    fn lock_deposit_input(&self, deposit: &DepositData, tx: &Hash, fork: bool) -> StoreResult<()>;
}

/// Everything the transaction pipeline needs, in one bound.
pub trait LedgerStore:
    UtxoReader + UtxoLocker + GhostChecker + DomainReader + NodeReader + TransactionReader + DepositStore + Send + Sync
{
}

impl<T> LedgerStore for T where
    T: UtxoReader
        + UtxoLocker
        + GhostChecker
        + DomainReader
        + NodeReader
        + TransactionReader
        + DepositStore
        + Send
        + Sync
{
}

/// Read access to the replicated snapshot history.
pub trait SnapshotReader: Send + Sync {
    /// The latest round this store knows for every node it has seen.
    fn build_graph(&self) -> StoreResult<Vec<SyncPoint>>;

    /// Snapshots a node finalised in `round`, ascending by topological order.
    fn read_snapshots_for_node_round(&self, node: &NodeId, round: u64) -> StoreResult<Vec<Snapshot>>;

    /// The snapshot that finalised transaction `hash`.
    fn read_snapshot_by_transaction_hash(&self, hash: &Hash) -> StoreResult<Option<Snapshot>>;

    /// Up to `limit` snapshots with topological order `>= offset`, ascending.
    fn read_snapshots_since_topology(&self, offset: u64, limit: usize) -> StoreResult<Vec<Snapshot>>;
}
