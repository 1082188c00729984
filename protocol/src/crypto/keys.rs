//! # Key Management
//!
//! Raw ed25519 scalars and points for Tessera accounts and ghost keys.
//!
//! Unlike a plain signing wallet, Tessera does arithmetic on keys: a ghost
//! private key is `Hs(a*R) + b`, a ghost public key is `Hs(r*A)*G + B`. An
//! ed25519 `SigningKey` hides its scalar behind a seed hash, which makes that
//! arithmetic impossible, so this module works one level lower:
//!
//! - [`PrivateKey`] wraps a [`Scalar`] directly.
//! - [`PublicKey`] wraps an [`EdwardsPoint`], always on the curve, always
//!   compressed canonically on the wire.
//!
//! Signatures produced from these keys are still bit-for-bit ed25519 and
//! verify with stock `ed25519-dalek` (see [`super::signatures`]).
//!
//! ## Security considerations
//!
//! - Fresh keys come from 64 bytes of `OsRng` output reduced modulo the group
//!   order, so the bias is negligible.
//! - `PrivateKey` does not implement `Serialize`. Exporting a secret should
//!   be a deliberate call to [`PrivateKey::to_hex`], not a side effect of
//!   shoving a struct into JSON.
//! - Key bytes are never logged. `Debug` on a private key prints only its
//!   public half.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use rand_core::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash as StdHash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while decoding key material.
///
/// Deliberately terse about *why* a secret failed to parse.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid private key: not a canonical scalar")]
    InvalidPrivateKey,

    #[error("invalid public key: not a valid ed25519 point")]
    InvalidPublicKey,

    #[error("invalid key encoding: {0}")]
    InvalidEncoding(String),
}

/// An ed25519 private scalar.
#[derive(Clone)]
pub struct PrivateKey(Scalar);

/// An ed25519 public point. Safe to share, log and tattoo.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(EdwardsPoint);

impl PrivateKey {
    /// Generate a fresh private key from the OS RNG.
    pub fn generate() -> Self {
        let mut seed = [0u8; 64];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Derive a private key deterministically from 64 bytes of seed material.
    ///
    /// The seed is reduced modulo the group order, so any 64 bytes are a
    /// valid input. Weak seeds still make weak keys.
    pub fn from_seed(seed: &[u8; 64]) -> Self {
        Self(Scalar::from_bytes_mod_order_wide(seed))
    }

    /// Wrap an already-reduced scalar.
    pub fn from_scalar(scalar: Scalar) -> Self {
        Self(scalar)
    }

    /// Decode a canonical 32-byte little-endian scalar.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, KeyError> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
            .map(Self)
            .ok_or(KeyError::InvalidPrivateKey)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = decode_32(s)?;
        Self::from_bytes(bytes)
    }

    /// Export the raw scalar bytes. Handle with the usual paranoia.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// `x * G`.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(EdwardsPoint::mul_base(&self.0))
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Decode a compressed point, rejecting anything off the curve or not
    /// in canonical form.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, KeyError> {
        let point = CompressedEdwardsY(bytes)
            .decompress()
            .ok_or(KeyError::InvalidPublicKey)?;
        // Non-canonical y encodings decompress fine but recompress to
        // different bytes, which would give one key two identities.
        if point.compress().to_bytes() != bytes {
            return Err(KeyError::InvalidPublicKey);
        }
        Ok(Self(point))
    }

    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = slice
            .try_into()
            .map_err(|_| KeyError::InvalidEncoding(format!("expected 32 bytes, got {}", slice.len())))?;
        Self::from_bytes(bytes)
    }

    pub fn from_point(point: EdwardsPoint) -> Self {
        Self(point)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        Self::from_bytes(decode_32(s)?)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn point(&self) -> &EdwardsPoint {
        &self.0
    }
}

impl StdHash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}..)", &self.to_hex()[..16])
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

fn decode_32(s: &str) -> Result<[u8; 32], KeyError> {
    let bytes = hex::decode(s).map_err(|e| KeyError::InvalidEncoding(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::InvalidEncoding(format!("expected 32 bytes, got {}", bytes.len())))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_distinct() {
        let a = PrivateKey::generate();
        let b = PrivateKey::generate();
        assert_ne!(a, b);
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn from_seed_is_deterministic() {
        let seed = [7u8; 64];
        assert_eq!(PrivateKey::from_seed(&seed), PrivateKey::from_seed(&seed));
    }

    #[test]
    fn private_key_hex_roundtrip() {
        let key = PrivateKey::generate();
        let back = PrivateKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, back);
        assert_eq!(key.public_key(), back.public_key());
    }

    #[test]
    fn non_canonical_scalar_rejected() {
        // 2^256 - 1 is way above the group order.
        assert_eq!(
            PrivateKey::from_bytes([0xff; 32]),
            Err(KeyError::InvalidPrivateKey)
        );
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let public = PrivateKey::generate().public_key();
        let parsed: PublicKey = public.to_string().parse().unwrap();
        assert_eq!(public, parsed);
    }

    #[test]
    fn public_key_rejects_wrong_length() {
        assert!(matches!(
            PublicKey::try_from_slice(&[1u8; 31]),
            Err(KeyError::InvalidEncoding(_))
        ));
        assert!(matches!(
            PublicKey::from_hex("00"),
            Err(KeyError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn public_key_rejects_off_curve_bytes() {
        // Find a y-coordinate with no matching x. Roughly half of all
        // encodings qualify, so this loop terminates immediately.
        let bad = (0u8..=255)
            .map(|b| {
                let mut bytes = [b; 32];
                bytes[31] &= 0x7f;
                bytes
            })
            .find(|bytes| CompressedEdwardsY(*bytes).decompress().is_none())
            .expect("some byte pattern is off the curve");
        assert_eq!(PublicKey::from_bytes(bad), Err(KeyError::InvalidPublicKey));
    }

    #[test]
    fn public_key_serde_is_hex_string() {
        let public = PrivateKey::generate().public_key();
        let json = serde_json::to_string(&public).unwrap();
        assert_eq!(json, format!("\"{}\"", public.to_hex()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, public);
    }

    #[test]
    fn equal_keys_hash_equally() {
        use std::collections::HashSet;
        let public = PrivateKey::generate().public_key();
        let mut set = HashSet::new();
        set.insert(public);
        set.insert(PublicKey::from_bytes(public.to_bytes()).unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let key = PrivateKey::generate();
        let dbg = format!("{:?}", key);
        assert!(!dbg.contains(&key.to_hex()));
    }
}
