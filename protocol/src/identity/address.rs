//! # Addresses
//!
//! An [`Address`] is the four-key bundle an account owns: a view pair and a
//! spend pair. Only the public half, a [`PublicAddress`], is ever handed to
//! a sender. It renders as
//!
//! ```text
//! "TSR" + base58(spend_pub || view_pub || checksum[..4])
//! ```
//!
//! where the checksum is a domain-separated BLAKE3 hash of the prefix and
//! both keys. A single mistyped character fails the checksum long before it
//! can send money into the void.
//!
//! The view key is derived from the spend key by default, so an account is
//! fully recoverable from its 64-byte seed.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{ADDRESS_CHECKSUM_LENGTH, ADDRESS_PREFIX};
use crate::crypto::hash::{blake3_hash_multi, domain_separated_hash, hash_to_scalar};
use crate::crypto::{Hash, KeyError, PrivateKey, PublicKey};

const CHECKSUM_CONTEXT: &str = "tessera 2026-01 address checksum";
const VIEW_KEY_TAG: &[u8] = b"tessera-view-key-v1";

/// Errors produced when parsing an encoded address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with '{}'", ADDRESS_PREFIX)]
    InvalidPrefix,

    #[error("base58 decode error: {0}")]
    Base58(String),

    #[error("invalid address payload length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("address checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid key in address: {0}")]
    InvalidKey(#[from] KeyError),
}

/// The public half of an account: what senders address outputs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicAddress {
    pub public_view_key: PublicKey,
    pub public_spend_key: PublicKey,
}

/// A full account: both key pairs.
#[derive(Clone, PartialEq, Eq)]
pub struct Address {
    pub private_view_key: PrivateKey,
    pub public_view_key: PublicKey,
    pub private_spend_key: PrivateKey,
    pub public_spend_key: PublicKey,
}

impl Address {
    /// A fresh random account.
    pub fn generate() -> Self {
        Self::from_spend_key(PrivateKey::generate())
    }

    /// Deterministically derive an account from 64 bytes of seed material.
    pub fn from_seed(seed: &[u8; 64]) -> Self {
        Self::from_spend_key(PrivateKey::from_seed(seed))
    }

    /// Build an account around an existing spend key. The view key is
    /// `Hs(tag || B)`.
    pub fn from_spend_key(private_spend_key: PrivateKey) -> Self {
        let public_spend_key = private_spend_key.public_key();
        let view_scalar = hash_to_scalar(&[VIEW_KEY_TAG, &public_spend_key.to_bytes()[..]]);
        let private_view_key = PrivateKey::from_scalar(view_scalar);
        Self {
            public_view_key: private_view_key.public_key(),
            private_view_key,
            public_spend_key,
            private_spend_key,
        }
    }

    /// Build an account from independently chosen view and spend keys.
    pub fn from_keys(private_view_key: PrivateKey, private_spend_key: PrivateKey) -> Self {
        Self {
            public_view_key: private_view_key.public_key(),
            private_view_key,
            public_spend_key: private_spend_key.public_key(),
            private_spend_key,
        }
    }

    pub fn public(&self) -> PublicAddress {
        PublicAddress {
            public_view_key: self.public_view_key,
            public_spend_key: self.public_spend_key,
        }
    }

    /// Stable identifier of the account. See [`PublicAddress::hash`].
    pub fn hash(&self) -> Hash {
        self.public().hash()
    }
}

impl From<&Address> for PublicAddress {
    fn from(address: &Address) -> Self {
        address.public()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("public", &self.public().to_string())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.public())
    }
}

impl PublicAddress {
    /// `BLAKE3(spend || view)`. Used as a consensus node identifier.
    pub fn hash(&self) -> Hash {
        Hash::from_bytes(blake3_hash_multi(&[
            &self.public_spend_key.to_bytes()[..],
            &self.public_view_key.to_bytes()[..],
        ]))
    }

    fn checksum(&self) -> [u8; 32] {
        let mut data = Vec::with_capacity(ADDRESS_PREFIX.len() + 64);
        data.extend_from_slice(ADDRESS_PREFIX.as_bytes());
        data.extend_from_slice(&self.public_spend_key.to_bytes());
        data.extend_from_slice(&self.public_view_key.to_bytes());
        domain_separated_hash(CHECKSUM_CONTEXT, &data)
    }
}

impl fmt::Display for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(64 + ADDRESS_CHECKSUM_LENGTH);
        payload.extend_from_slice(&self.public_spend_key.to_bytes());
        payload.extend_from_slice(&self.public_view_key.to_bytes());
        payload.extend_from_slice(&self.checksum()[..ADDRESS_CHECKSUM_LENGTH]);
        write!(f, "{}{}", ADDRESS_PREFIX, bs58::encode(payload).into_string())
    }
}

impl fmt::Debug for PublicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicAddress({})", self)
    }
}

impl FromStr for PublicAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or(AddressError::InvalidPrefix)?;
        let payload = bs58::decode(body)
            .into_vec()
            .map_err(|e| AddressError::Base58(e.to_string()))?;

        let expected = 64 + ADDRESS_CHECKSUM_LENGTH;
        if payload.len() != expected {
            return Err(AddressError::InvalidLength {
                expected,
                got: payload.len(),
            });
        }

        let address = PublicAddress {
            public_spend_key: PublicKey::try_from_slice(&payload[..32])?,
            public_view_key: PublicKey::try_from_slice(&payload[32..64])?,
        };
        if address.checksum()[..ADDRESS_CHECKSUM_LENGTH] != payload[64..] {
            return Err(AddressError::ChecksumMismatch);
        }
        Ok(address)
    }
}

impl Serialize for PublicAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
