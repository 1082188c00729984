//! # Digital Signatures
//!
//! Ed25519 signatures over raw scalars.
//!
//! [`super::keys::PrivateKey`] holds a bare scalar rather than a seed, so we
//! cannot hand it to `ed25519_dalek::SigningKey`. Signing is therefore done
//! here with the textbook equations:
//!
//! ```text
//! r = H(tag || x || M)        deterministic nonce
//! R = r*G
//! k = H(R || A || M)          the standard ed25519 challenge
//! s = r + k*x
//! sig = R || s
//! ```
//!
//! The output is an ordinary ed25519 signature, and verification goes
//! straight through `ed25519-dalek`. We only roll the half that dalek does
//! not expose for scalar keys.
//!
//! Like RFC 8032, nonces are derived from the key and the message, so the
//! same (key, message) pair always produces the same signature and a broken
//! RNG at signing time cannot leak the key.

use curve25519_dalek::edwards::EdwardsPoint;
use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::hash::hash_to_scalar;
use super::keys::{PrivateKey, PublicKey};

/// Domain tag mixed into nonce derivation. Never part of the challenge.
const NONCE_TAG: &[u8] = b"tessera-ed25519-nonce-v1";

/// Errors during signature decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid signature bytes: expected 64 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 64-byte ed25519 signature, `R || s`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s).map_err(|e| SignatureError::InvalidEncoding(e.to_string()))?;
        let array: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", &self.to_hex()[..16])
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Sign `message` with a raw scalar key.
pub fn sign(key: &PrivateKey, message: &[u8]) -> Signature {
    let x = key.scalar();
    let public = key.public_key().to_bytes();

    let nonce = hash_to_scalar(&[NONCE_TAG, &x.as_bytes()[..], message]);
    let big_r = EdwardsPoint::mul_base(&nonce).compress();
    let challenge = hash_to_scalar(&[&big_r.as_bytes()[..], &public[..], message]);
    let s = nonce + challenge * x;

    let mut out = [0u8; 64];
    out[..32].copy_from_slice(big_r.as_bytes());
    out[32..].copy_from_slice(s.as_bytes());
    Signature(out)
}

/// Verify an ed25519 signature. Never panics; garbage in, `false` out.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.to_bytes()) else {
        return false;
    };
    let sig = DalekSignature::from_bytes(signature.as_bytes());
    verifying_key.verify(message, &sig).is_ok()
}

impl PrivateKey {
    /// Convenience wrapper around [`sign`].
    pub fn sign(&self, message: &[u8]) -> Signature {
        sign(self, message)
    }
}

impl PublicKey {
    /// Convenience wrapper around [`verify`].
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        verify(self, message, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"pay alice 10");
        assert!(key.public_key().verify(b"pay alice 10", &sig));
    }

    #[test]
    fn test_wrong_message_fails() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"pay alice 10");
        assert!(!key.public_key().verify(b"pay alice 1000", &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = PrivateKey::generate();
        let other = PrivateKey::generate();
        let sig = key.sign(b"message");
        assert!(!other.public_key().verify(b"message", &sig));
    }

    #[test]
    fn test_deterministic_signatures() {
        let key = PrivateKey::from_seed(&[42u8; 64]);
        assert_eq!(key.sign(b"same"), key.sign(b"same"));
        assert_ne!(key.sign(b"same"), key.sign(b"different"));
    }

    #[test]
    fn test_strict_dalek_verification_accepts() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"strict");
        let vk = VerifyingKey::from_bytes(&key.public_key().to_bytes()).unwrap();
        assert!(vk
            .verify_strict(b"strict", &DalekSignature::from_bytes(sig.as_bytes()))
            .is_ok());
    }

    #[test]
    fn test_tampered_signature_fails() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"message");
        let mut bytes = *sig.as_bytes();
        bytes[40] ^= 0x01;
        assert!(!key
            .public_key()
            .verify(b"message", &Signature::from_bytes(bytes)));
    }

    #[test]
    fn test_garbage_signature_fails() {
        let key = PrivateKey::generate();
        assert!(!key
            .public_key()
            .verify(b"message", &Signature::from_bytes([0xff; 64])));
    }

    #[test]
    fn test_empty_message() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"");
        assert!(key.public_key().verify(b"", &sig));
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let sig = PrivateKey::generate().sign(b"hex");
        let parsed: Signature = sig.to_string().parse().unwrap();
        assert_eq!(parsed, sig);
        assert_eq!(Signature::from_hex("abcd"), Err(SignatureError::InvalidLength(2)));
    }
}
