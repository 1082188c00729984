//! # Identity Module
//!
//! Accounts on Tessera are pairs of ed25519 key pairs:
//!
//! 1. **View key** `(a, A)`: lets a wallet recognise outputs paid to it.
//!    Watch-only services may hold `a` without being able to spend anything.
//! 2. **Spend key** `(b, B)`: combined with the view secret, yields the
//!    one-time key that actually signs for an output.
//!
//! The public pair `(A, B)` is the [`PublicAddress`], rendered as a
//! checksummed base58 string with a `TSR` prefix. Nothing else about an
//! account ever appears on the ledger; outputs carry ghost keys instead
//! (see [`crate::crypto::ghost`]).

pub mod address;

pub use address::{Address, AddressError, PublicAddress};
