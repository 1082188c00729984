//! # Network Module
//!
//! Replication between peers: working out how far behind a peer is from the
//! round graph it announces, then streaming it the snapshots it is missing.
//!
//! ## Architecture
//!
//! ```text
//! graph.rs     - Round-graph comparison, producing a topological offset
//! message.rs   - PeerMessage and its bincode wire encoding
//! transport.rs - The PeerTransport seam and a channel-backed transport
//! sync.rs      - The per-peer sync worker and its loop
//! ```
//!
//! ## Design Decisions
//!
//! - One worker per peer that owns its offset and its already-sent filter.
//!   No state is shared between peers, so there is nothing to lock.
//! - The store is read through [`SnapshotReader`](crate::storage::SnapshotReader)
//!   only. Replication never writes on the sending side.
//! - The transport is a trait. The crate stays agnostic about sockets; the
//!   node binary and the tests plug in [`ChannelTransport`].

pub mod graph;
pub mod message;
pub mod sync;
pub mod transport;

pub use graph::compare_round_graph_and_get_topological_offset;
pub use message::{build_graph_message, build_snapshot_message, MessageError, PeerMessage};
pub use sync::{PeerSync, SyncConfig, SyncError, SyncStats};
pub use transport::{ChannelTransport, PeerTransport, TransportError};
