//! # Replication Simulation
//!
//! One producer, N followers, all in one process. The producer builds a
//! chain of transfers on its store; every follower starts with nothing but
//! the shared genesis and a [`PeerSync`] worker on the producer's side
//! feeding it over a [`ChannelTransport`]. Followers decode what arrives,
//! run it through full validation, and announce their round graph back
//! after every snapshot, exactly like a real peer would (minus the sockets).
//!
//! The run is over when every follower holds the producer's history in the
//! producer's order, or when the deadline hits, whichever comes first.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use tessera_protocol::config::{native_asset_id, GRAPH_CHANNEL_CAPACITY};
use tessera_protocol::crypto::Hash;
use tessera_protocol::identity::Address;
use tessera_protocol::network::{ChannelTransport, PeerMessage, PeerSync, SyncConfig, SyncStats};
use tessera_protocol::storage::{MemoryStore, NodeId, SnapshotReader, SyncPoint};
use tessera_protocol::transaction::{Integer, Script, SignedTransaction, Transaction};

use crate::cli::SimulateArgs;
use crate::transfer::now_millis;

/// Encoded messages buffered per follower connection.
const WIRE_CAPACITY: usize = 256;

#[derive(Debug, Serialize)]
pub struct PeerReport {
    pub peer: NodeId,
    pub replicated: u64,
    pub in_order: bool,
    pub sent: u64,
    pub skipped: u64,
    pub graphs: u64,
    pub failures: u64,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub producer: NodeId,
    pub history: u64,
    pub elapsed_ms: u64,
    pub peers: Vec<PeerReport>,
}

/// Build the producer's store: genesis as its round 0, then a chain of
/// `length` transfers, one per round, each spending the previous output.
fn produce_history(producer: &Address, genesis: &SignedTransaction, length: u64) -> Result<MemoryStore> {
    let node = producer.hash();
    let store = MemoryStore::new();
    store
        .write_snapshot(node, 0, now_millis(), genesis.clone())
        .context("failed to seed producer genesis")?;

    let mut source = genesis.payload_hash();
    for round in 1..=length {
        let mut tx = Transaction::new(native_asset_id());
        tx.add_input(source, 0)?;
        tx.add_script_output(&[producer.public()], Script::new_threshold(1), Integer::new(1))?;
        let mut tx = SignedTransaction::new(tx);
        tx.sign_input(&store, 0, std::slice::from_ref(producer))?;
        let snapshot = store
            .accept_transaction(node, round, now_millis(), tx)
            .with_context(|| format!("producer rejected its own round {}", round))?;
        source = snapshot.payload_hash();
    }
    Ok(store)
}

/// A follower: apply snapshots as they arrive and announce progress until
/// the history is complete.
async fn follow(
    store: MemoryStore,
    target: u64,
    mut wire: mpsc::Receiver<Vec<u8>>,
    graphs: mpsc::Sender<Vec<SyncPoint>>,
) -> Result<MemoryStore> {
    announce(&store, &graphs)?;
    while store.snapshot_count() < target {
        let Some(bytes) = wire.recv().await else {
            bail!(
                "connection closed after {} of {} snapshots",
                store.snapshot_count(),
                target
            );
        };
        match PeerMessage::from_bytes(&bytes).context("undecodable message")? {
            PeerMessage::Snapshot(snapshot) => {
                let order = snapshot.topological_order;
                store
                    .accept_transaction(
                        snapshot.node_id,
                        snapshot.round_number,
                        snapshot.timestamp,
                        snapshot.transaction,
                    )
                    .with_context(|| format!("snapshot {} rejected", order))?;
                debug!(remote = order, local = store.snapshot_count() - 1, "snapshot applied");
            }
            PeerMessage::Graph(_) => {}
        }
        announce(&store, &graphs)?;
    }
    Ok(store)
}

/// Announce our graph. A full channel means the worker already has a recent
/// one queued, so dropping this one is fine.
fn announce(store: &MemoryStore, graphs: &mpsc::Sender<Vec<SyncPoint>>) -> Result<()> {
    let graph = store.build_graph().context("failed to build graph")?;
    match graphs.try_send(graph) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
        Err(mpsc::error::TrySendError::Closed(_)) => bail!("sync worker is gone"),
    }
}

fn history_hashes<S: SnapshotReader + ?Sized>(store: &S, count: u64) -> Result<Vec<Hash>> {
    let limit = usize::try_from(count).context("history too long")?;
    Ok(store
        .read_snapshots_since_topology(0, limit)
        .context("failed to read history")?
        .iter()
        .map(|s| s.payload_hash())
        .collect())
}

pub async fn run_simulation(args: &SimulateArgs) -> Result<SimulationReport> {
    ensure!(args.peers > 0, "need at least one follower");
    ensure!(args.batch_limit > 0, "batch limit must be positive");

    let started = std::time::Instant::now();
    let producer = Address::generate();
    let producer_id = producer.hash();

    let mut genesis = Transaction::new(native_asset_id());
    genesis.add_script_output(&[producer.public()], Script::new_threshold(1), Integer::new(1))?;
    let genesis = SignedTransaction::new(genesis);

    let source = Arc::new(produce_history(&producer, &genesis, args.snapshots)?);
    let target = source.snapshot_count();
    let expected = history_hashes(&*source, target)?;
    info!(producer = %producer_id, history = target, peers = args.peers, "producer history built");

    let config = SyncConfig {
        batch_limit: args.batch_limit,
        announce_timeout: Duration::from_millis(args.announce_timeout_ms),
    };
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut workers = Vec::with_capacity(args.peers);
    let mut followers = Vec::with_capacity(args.peers);
    let mut peer_ids = Vec::with_capacity(args.peers);
    for _ in 0..args.peers {
        let peer_id = Address::generate().hash();
        let store = MemoryStore::new();
        store
            .write_snapshot(producer_id, 0, now_millis(), genesis.clone())
            .context("failed to seed follower genesis")?;

        let (transport, wire) = ChannelTransport::pair(WIRE_CAPACITY);
        let (graph_tx, graph_rx) = mpsc::channel(GRAPH_CHANNEL_CAPACITY);
        let sync = PeerSync::new(peer_id, source.clone(), transport, config.clone());
        workers.push(tokio::spawn(sync.run(graph_rx, stop_rx.clone())));
        followers.push(tokio::spawn(follow(store, target, wire, graph_tx)));
        peer_ids.push(peer_id);
    }

    let deadline = Duration::from_secs(args.deadline_secs);
    let finished = tokio::time::timeout(deadline, join_all(followers))
        .await
        .with_context(|| format!("replication did not finish within {:?}", deadline))?;

    stop_tx.send_replace(true);
    let stats: Vec<SyncStats> = join_all(workers)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .context("sync worker panicked")?;

    let mut peers = Vec::with_capacity(args.peers);
    for ((peer, outcome), stats) in peer_ids.into_iter().zip(finished).zip(stats) {
        let store = outcome
            .context("follower task panicked")?
            .with_context(|| format!("follower {} failed", peer))?;
        let replicated = store.snapshot_count();
        let in_order = history_hashes(&store, replicated)? == expected;
        info!(peer = %peer, replicated, in_order, sent = stats.sent, "follower caught up");
        peers.push(PeerReport {
            peer,
            replicated,
            in_order,
            sent: stats.sent,
            skipped: stats.skipped,
            graphs: stats.graphs,
            failures: stats.failures,
        });
    }

    Ok(SimulationReport {
        producer: producer_id,
        history: target,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        peers,
    })
}
