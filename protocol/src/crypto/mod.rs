//! # Cryptographic Primitives for Tessera
//!
//! Everything that touches a curve point or a digest goes through here.
//!
//! - **ed25519** scalars and points via `curve25519-dalek`, so keys can be
//!   added and multiplied (ghost keys need that).
//! - **ed25519 signatures** produced from those scalars and verified by
//!   `ed25519-dalek`.
//! - **BLAKE3** for naming things, **SHA-512** for hashing into the scalar
//!   field.
//!
//! ## A note on "rolling your own crypto"
//!
//! The only hand-written equations in this module are the ed25519 signing
//! equation and the ghost-key derivation, both a handful of lines over
//! audited group arithmetic. If you are tempted to add a third, go read
//! about timing attacks first and come back when you have lost the urge.

pub mod ghost;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use ghost::{derive_ghost_private_key, derive_ghost_public_key, view_ghost_output_key};
pub use hash::{blake3_hash, blake3_hash_multi, domain_separated_hash, hash_to_scalar, Hash};
pub use keys::{KeyError, PrivateKey, PublicKey};
pub use signatures::{sign, verify, Signature, SignatureError};
