//! # Ledger Constants
//!
//! Every magic number in Tessera lives here, so that when someone asks
//! "why 256?" there is exactly one place to look (and exactly one place to
//! get yelled at). Changing anything in this file after launch is a hard
//! fork. Choose wisely, or at least choose consistently.

use std::time::Duration;

use crate::crypto::Hash;

// ---------------------------------------------------------------------------
// Transaction format
// ---------------------------------------------------------------------------

/// The only transaction version this library builds and accepts.
///
/// Bump this when the canonical payload encoding changes. Old versions are
/// rejected outright rather than interpreted optimistically.
pub const TX_VERSION: u8 = 1;

/// Maximum number of inputs a single transaction may consume.
///
/// 256 is plenty for consolidation sweeps and still keeps the validator's
/// worst case (one store read plus one script evaluation per input) bounded.
pub const MAX_TX_INPUTS: usize = 256;

/// Maximum number of outputs a single transaction may create.
pub const MAX_TX_OUTPUTS: usize = 256;

/// Maximum number of ghost keys (recipients) behind one output.
///
/// Key positions are encoded as `u16` in signature maps; this bound keeps us
/// far away from that ceiling and keeps script evaluation cheap.
pub const MAX_OUTPUT_KEYS: usize = 64;

/// Maximum length of the free-form `extra` payload, in bytes.
pub const MAX_EXTRA_LENGTH: usize = 256;

/// Number of decimal places carried by [`crate::transaction::Integer`].
///
/// Eight, like every ledger that grew up next to Bitcoin. One whole unit is
/// `10^8` base units.
pub const AMOUNT_PRECISION: u32 = 8;

/// `10^AMOUNT_PRECISION`, spelled out so nobody has to compute it at runtime.
pub const AMOUNT_SCALE: u128 = 100_000_000;

/// Seed string hashed into the native asset identifier.
pub const NATIVE_ASSET_SEED: &str = "tessera-native-asset-v1";

/// Returns the identifier of the ledger's native asset.
pub fn native_asset_id() -> Hash {
    Hash::new(NATIVE_ASSET_SEED.as_bytes())
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Human-readable prefix of an encoded public address.
pub const ADDRESS_PREFIX: &str = "TSR";

/// Number of checksum bytes appended to an encoded address.
pub const ADDRESS_CHECKSUM_LENGTH: usize = 4;

// ---------------------------------------------------------------------------
// Peer synchronisation
// ---------------------------------------------------------------------------

/// Upper bound on snapshots read (and streamed) per sync pass.
pub const SYNC_BATCH_LIMIT: usize = 1000;

/// How long the sync loop waits for a round graph before it re-streams from
/// the last known offset anyway.
pub const SYNC_ANNOUNCE_TIMEOUT: Duration = Duration::from_millis(100);

/// Capacity of the channel that delivers remote round graphs to a sync loop.
///
/// Graphs are idempotent snapshots of a peer's progress, so a small buffer
/// is enough; a slow loop only ever needs the latest few.
pub const GRAPH_CHANNEL_CAPACITY: usize = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_scale_matches_precision() {
        assert_eq!(AMOUNT_SCALE, 10u128.pow(AMOUNT_PRECISION));
    }

    #[test]
    fn native_asset_id_is_stable() {
        assert_eq!(native_asset_id(), native_asset_id());
        assert!(!native_asset_id().is_zero());
    }

    #[test]
    fn key_positions_fit_in_u16() {
        assert!(MAX_OUTPUT_KEYS <= u16::MAX as usize);
    }

    #[test]
    fn sync_defaults_are_sane() {
        assert_eq!(SYNC_BATCH_LIMIT, 1000);
        assert_eq!(SYNC_ANNOUNCE_TIMEOUT, Duration::from_millis(100));
        assert!(GRAPH_CHANNEL_CAPACITY > 0);
    }
}
