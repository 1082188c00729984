//! # Hashing Utilities
//!
//! Two hash functions, two jobs, no overlap:
//!
//! - **BLAKE3** names things. Transaction payload hashes, asset identifiers,
//!   node identifiers and address checksums are all BLAKE3 digests wrapped in
//!   the [`Hash`] newtype.
//!
//! - **SHA-512** feeds the curve. Anything that must land in the ed25519
//!   scalar field (ghost-key shared secrets, signature nonces and challenges)
//!   is hashed with SHA-512 and reduced modulo the group order, which is what
//!   every ed25519 implementation on the planet expects.
//!
//! Mixing them up would not be insecure, merely incompatible. Signatures in
//! particular must use SHA-512 or standard verifiers will reject them.

use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a [`Hash`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 32-byte BLAKE3 digest.
///
/// Used as the identity of transactions (their payload hash), assets, nodes
/// and anything else that needs a collision-resistant name. Orders
/// lexicographically by bytes so it can key a `BTreeMap`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// The all-zero hash. Never the digest of anything in practice, so it
    /// doubles as a sentinel.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Hash `data` with BLAKE3.
    pub fn new(data: &[u8]) -> Self {
        Self(blake3_hash(data))
    }

    /// Wrap raw digest bytes without hashing them again.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let bytes = hex::decode(s).map_err(|e| HashError::InvalidHex(e.to_string()))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty to tell two hashes apart in a log line.
        write!(f, "Hash({}..)", &self.to_hex()[..16])
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash several byte slices as if they were concatenated, without actually
/// allocating the concatenation.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// BLAKE3 in key-derivation mode with a context string.
///
/// Two different contexts never produce related outputs, even for identical
/// data. Context strings should be hardcoded and globally unique, e.g.
/// `"tessera 2026 address checksum"`.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Hash the concatenation of `parts` with SHA-512 and reduce the 64-byte
/// digest into an ed25519 scalar.
///
/// No prefix or domain tag is added here: the ed25519 challenge is exactly
/// `SHA512(R || A || M) mod l`, so callers that want separation pass their
/// own tag as the first part.
pub fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&digest);
    Scalar::from_bytes_mod_order_wide(&wide)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(Hash::new(b"tessera"), Hash::new(b"tessera"));
        assert_ne!(Hash::new(b"tessera"), Hash::new(b"Tessera"));
    }

    #[test]
    fn hash_hex_roundtrip() {
        let h = Hash::new(b"round and round");
        let parsed: Hash = h.to_string().parse().unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn hash_from_hex_rejects_bad_input() {
        assert!(matches!(Hash::from_hex("zz"), Err(HashError::InvalidHex(_))));
        assert_eq!(Hash::from_hex("abcd"), Err(HashError::InvalidLength(2)));
    }

    #[test]
    fn zero_hash_is_zero() {
        assert!(Hash::ZERO.is_zero());
        assert!(!Hash::new(b"").is_zero());
    }

    #[test]
    fn debug_is_abbreviated() {
        let dbg = format!("{:?}", Hash::new(b"x"));
        assert!(dbg.starts_with("Hash("));
        assert!(dbg.len() < 30);
    }

    #[test]
    fn hash_serializes_as_hex_string() {
        let h = Hash::new(b"json");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn multi_hash_matches_concatenation() {
        assert_eq!(
            blake3_hash_multi(&[b"hello ", b"world"]),
            blake3_hash(b"hello world")
        );
    }

    #[test]
    fn domain_separation_changes_output() {
        let a = domain_separated_hash("tessera test a", b"data");
        let b = domain_separated_hash("tessera test b", b"data");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_to_scalar_splits_like_concatenation() {
        let joined = hash_to_scalar(&[b"abcdef"]);
        let split = hash_to_scalar(&[b"abc", b"def"]);
        assert_eq!(joined, split);
        assert_ne!(joined, hash_to_scalar(&[b"abcdeg"]));
    }
}
