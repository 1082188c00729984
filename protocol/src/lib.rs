// Copyright (c) 2026 Tessera Contributors. MIT License.
// See LICENSE for details.

//! # Tessera Protocol Ledger Core
//!
//! The part of a UTXO ledger that has to be right: who may spend what, and
//! how nodes agree on what has already been spent. Everything in here is
//! pure logic over a store trait. No sockets, no disks, no opinions about
//! your deployment.
//!
//! Outputs are paid to one-time ghost keys, so an observer sees a fresh key
//! per output per recipient and cannot link payments to an address. Spending
//! is gated by a tiny threshold script. Confirmed transactions become
//! snapshots with a local topological order, and peers replicate them by
//! comparing round graphs.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys, BLAKE3 hashing, Schnorr signatures, ghost keys.
//! - **identity**: Addresses: a view key pair, a spend key pair, a string form.
//! - **transaction**: Building, signing, validating and consuming transactions.
//! - **storage**: The store capability traits and an in-memory store.
//! - **network**: Round-graph comparison and the per-peer sync loop.
//! - **config**: Protocol constants.
//!
//! ## Design Philosophy
//!
//! 1. Validation is read-only. Consumption is a separate, explicit step.
//! 2. The store is a set of narrow traits, so every piece asks for only
//!    what it uses.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod network;
pub mod storage;
pub mod transaction;
