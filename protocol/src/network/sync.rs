//! # Peer Sync
//!
//! Every connected peer gets one [`PeerSync`] worker whose job is to feed
//! that peer the snapshots it is missing. The worker owns all of its state
//! (where it is in our history and what it has already sent) and talks to
//! the outside world through exactly two pipes: an inbound channel of round
//! graphs the peer announces, and an outbound [`PeerTransport`].
//!
//! ## The loop
//!
//! ```text
//! loop {
//!     wait for: graph announcement | announce timeout | shutdown
//!     on graph:   offset = compare(local graph, remote graph) if > 0
//!     if offset == 0: nothing to go on, wait again
//!     stream up to batch_limit snapshots from offset, skipping sent ones
//!     offset = one past the topological order of the last snapshot looked at
//! }
//! ```
//!
//! Errors (a store that hiccups, a send that fails) are logged and the loop
//! carries on from the offset it had before the failed step. Nothing here
//! is fatal except the connection going away.
//!
//! ## Guarantees
//!
//! - A payload hash is sent at most once per worker, however many times the
//!   offset is rewound.
//! - Snapshots go out in ascending topological order for the life of the
//!   worker. A graph that points below what was already streamed cannot
//!   rewind the worker past its high-water mark; anything unsent down there
//!   is left for the next connection.
//! - Offset 0 is never streamed from, so genesis stays local.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::graph::compare_round_graph_and_get_topological_offset;
use super::message::build_snapshot_message;
use super::transport::{PeerTransport, TransportError};
use crate::crypto::Hash;
use crate::storage::{NodeId, SnapshotReader, StoreError, SyncPoint};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for a peer sync worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum number of snapshots read from the store per step.
    pub batch_limit: usize,

    /// How long to wait for a graph announcement before streaming anyway.
    pub announce_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_limit: crate::config::SYNC_BATCH_LIMIT,
            announce_timeout: crate::config::SYNC_ANNOUNCE_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// SyncError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("store read failed: {0}")]
    StoreReadFailed(#[source] StoreError),

    #[error("send to peer failed: {0}")]
    SendFailed(#[source] TransportError),
}

// ---------------------------------------------------------------------------
// SyncStats
// ---------------------------------------------------------------------------

/// Running counters for one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Snapshots handed to the transport.
    pub sent: u64,
    /// Snapshots read but not sent because the peer already had them.
    pub skipped: u64,
    /// Graph announcements processed.
    pub graphs: u64,
    /// Steps that failed and were absorbed.
    pub failures: u64,
}

// ---------------------------------------------------------------------------
// PeerSync
// ---------------------------------------------------------------------------

/// Sync worker for a single peer.
pub struct PeerSync<S: ?Sized, T> {
    peer: NodeId,
    store: Arc<S>,
    transport: T,
    config: SyncConfig,
    offset: u64,
    /// One past the highest topological order sent so far.
    streamed: u64,
    sent: HashSet<Hash>,
    stats: SyncStats,
}

impl<S, T> PeerSync<S, T>
where
    S: SnapshotReader + ?Sized,
    T: PeerTransport,
{
    pub fn new(peer: NodeId, store: Arc<S>, transport: T, config: SyncConfig) -> Self {
        Self {
            peer,
            store,
            transport,
            config,
            offset: 0,
            streamed: 0,
            sent: HashSet::new(),
            stats: SyncStats::default(),
        }
    }

    pub fn peer(&self) -> NodeId {
        self.peer
    }

    /// Topological order the next step reads from. 0 until a graph
    /// comparison produces one.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// One past the highest topological order sent to this peer.
    pub fn streamed(&self) -> u64 {
        self.streamed
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Whether the snapshot for transaction `hash` was sent to this peer.
    pub fn has_sent(&self, hash: &Hash) -> bool {
        self.sent.contains(hash)
    }

    /// Compare the peer's announced graph with ours and adopt the result if
    /// it is positive. The adopted offset never drops below what was already
    /// streamed. Returns the comparator's answer either way.
    pub fn handle_remote_graph(&mut self, remote: &[SyncPoint]) -> Result<u64, SyncError> {
        self.stats.graphs += 1;
        let local = self.store.build_graph().map_err(SyncError::StoreReadFailed)?;
        let offset = compare_round_graph_and_get_topological_offset(&*self.store, &local, remote)?;
        if offset > 0 {
            self.offset = offset.max(self.streamed);
            debug!(
                peer = %self.peer,
                offset,
                adopted = self.offset,
                "adopted offset from remote graph"
            );
        }
        Ok(offset)
    }

    /// Stream one batch starting at `offset` (inclusive).
    ///
    /// Returns the offset to resume from: one past the topological order of
    /// the last snapshot read, or `offset` if there was nothing. Snapshots
    /// already sent, or ordered below the high-water mark, are skipped.
    /// Snapshots sent before a failure stay recorded as sent; the worker's
    /// own offset is not touched here.
    pub async fn sync_since(&mut self, offset: u64) -> Result<u64, SyncError> {
        let snapshots = self
            .store
            .read_snapshots_since_topology(offset, self.config.batch_limit)
            .map_err(SyncError::StoreReadFailed)?;

        let mut next = offset;
        for snapshot in &snapshots {
            let order = snapshot.topological_order;
            let hash = snapshot.payload_hash();
            if order < self.streamed || self.sent.contains(&hash) {
                self.stats.skipped += 1;
            } else {
                self.transport
                    .send_data(build_snapshot_message(snapshot))
                    .await
                    .map_err(SyncError::SendFailed)?;
                self.sent.insert(hash);
                self.streamed = order + 1;
                self.stats.sent += 1;
            }
            next = order + 1;
        }

        if !snapshots.is_empty() {
            debug!(
                peer = %self.peer,
                from = offset,
                to = next - 1,
                count = snapshots.len(),
                "sync batch streamed"
            );
        }
        Ok(next)
    }

    /// One streaming step from the current offset. The offset only moves if
    /// the whole batch went through.
    pub async fn sync_step(&mut self) -> Result<(), SyncError> {
        if self.offset == 0 {
            return Ok(());
        }
        self.offset = self.sync_since(self.offset).await?;
        Ok(())
    }

    /// Drive the worker until the connection is torn down.
    ///
    /// Teardown is any of: `shutdown` flipping to `true` or its sender being
    /// dropped, the graph channel closing, or the transport reporting
    /// [`TransportError::Closed`]. Returns the final counters.
    pub async fn run(
        mut self,
        mut graphs: mpsc::Receiver<Vec<SyncPoint>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SyncStats {
        info!(peer = %self.peer, "peer sync loop starting");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                graph = graphs.recv() => match graph {
                    Some(remote) => {
                        if let Err(e) = self.handle_remote_graph(&remote) {
                            self.stats.failures += 1;
                            warn!(peer = %self.peer, offset = self.offset, error = %e, "graph compare failed");
                        }
                    }
                    None => {
                        debug!(peer = %self.peer, "graph channel closed");
                        break;
                    }
                },
                _ = tokio::time::sleep(self.config.announce_timeout) => {}
            }

            match self.sync_step().await {
                Ok(()) => {}
                Err(SyncError::SendFailed(TransportError::Closed)) => {
                    debug!(peer = %self.peer, "transport closed");
                    break;
                }
                Err(e) => {
                    self.stats.failures += 1;
                    warn!(peer = %self.peer, offset = self.offset, error = %e, "sync to peer failed");
                }
            }
        }

        info!(
            peer = %self.peer,
            offset = self.offset,
            sent = self.stats.sent,
            "peer sync loop stopped"
        );
        self.stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
