//! # Ghost Keys
//!
//! One-time output keys, so that two payments to the same address never
//! share a public key on the ledger.
//!
//! Every recipient publishes a view key `A = a*G` and a spend key `B = b*G`.
//! The sender picks a fresh mask scalar `r`, publishes `R = r*G` alongside
//! the output, and for the recipient sitting at position `n` computes
//!
//! ```text
//! P = Hs(8*r*A, n)*G + B
//! ```
//!
//! Because `r*A = a*R`, the recipient can recompute the shared secret from
//! the published mask and either
//!
//! - recover the one-time private key `x = Hs(8*a*R, n) + b`, which satisfies
//!   `x*G = P` and can sign for the output, or
//! - with the view key alone, strip the shared secret off and get `B` back:
//!   `P - Hs(8*a*R, n)*G = B`. That is how a watch-only wallet recognises its
//!   outputs without being able to spend them.
//!
//! The factor of 8 clears the curve's cofactor so a malicious mask on a small
//! subgroup cannot bias the shared secret. Including `n` means two
//! recipients of the same output derive unrelated keys even if they are the
//! same address.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use super::hash::hash_to_scalar;
use super::keys::{PrivateKey, PublicKey};

/// Domain tag for the shared-secret hash `Hs`.
const GHOST_TAG: &[u8] = b"tessera-ghost-key-v1";

/// `Hs(8 * shared, index)`.
fn shared_scalar(shared: &EdwardsPoint, index: u64) -> Scalar {
    let point = shared.mul_by_cofactor().compress();
    hash_to_scalar(&[GHOST_TAG, &point.as_bytes()[..], &index.to_le_bytes()[..]])
}

/// Sender side: the one-time key for the recipient at `index`.
///
/// `mask` is the sender's fresh scalar `r`; `view` and `spend` are the
/// recipient's public keys `A` and `B`.
pub fn derive_ghost_public_key(
    mask: &PrivateKey,
    view: &PublicKey,
    spend: &PublicKey,
    index: u64,
) -> PublicKey {
    let shared = mask.scalar() * view.point();
    let offset = EdwardsPoint::mul_base(&shared_scalar(&shared, index));
    PublicKey::from_point(offset + spend.point())
}

/// Recipient side: the one-time private key for the output key at `index`.
///
/// `mask` is the published `R`; `view` and `spend` are the recipient's
/// private scalars `a` and `b`.
pub fn derive_ghost_private_key(
    mask: &PublicKey,
    view: &PrivateKey,
    spend: &PrivateKey,
    index: u64,
) -> PrivateKey {
    let shared = view.scalar() * mask.point();
    PrivateKey::from_scalar(shared_scalar(&shared, index) + spend.scalar())
}

/// Watch-only side: recover the recipient's public spend key from a ghost
/// key using only the private view key.
///
/// The result equals the recipient's `B` if and only if the output is
/// theirs, so comparing it against a known spend key is an ownership test.
pub fn view_ghost_output_key(
    ghost: &PublicKey,
    view: &PrivateKey,
    mask: &PublicKey,
    index: u64,
) -> PublicKey {
    let shared = view.scalar() * mask.point();
    let offset = EdwardsPoint::mul_base(&shared_scalar(&shared, index));
    PublicKey::from_point(ghost.point() - offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Wallet {
        view: PrivateKey,
        spend: PrivateKey,
    }

    impl Wallet {
        fn new() -> Self {
            Self {
                view: PrivateKey::generate(),
                spend: PrivateKey::generate(),
            }
        }
    }

    #[test]
    fn ghost_private_key_matches_public() {
        let wallet = Wallet::new();
        let r = PrivateKey::generate();
        let ghost = derive_ghost_public_key(
            &r,
            &wallet.view.public_key(),
            &wallet.spend.public_key(),
            0,
        );
        let secret = derive_ghost_private_key(&r.public_key(), &wallet.view, &wallet.spend, 0);
        assert_eq!(secret.public_key(), ghost);
    }

    #[test]
    fn view_key_recovers_spend_key() {
        let wallet = Wallet::new();
        let r = PrivateKey::generate();
        let ghost = derive_ghost_public_key(
            &r,
            &wallet.view.public_key(),
            &wallet.spend.public_key(),
            3,
        );
        let recovered = view_ghost_output_key(&ghost, &wallet.view, &r.public_key(), 3);
        assert_eq!(recovered, wallet.spend.public_key());
    }

    #[test]
    fn ghost_key_differs_from_spend_key() {
        let wallet = Wallet::new();
        let r = PrivateKey::generate();
        let ghost = derive_ghost_public_key(
            &r,
            &wallet.view.public_key(),
            &wallet.spend.public_key(),
            0,
        );
        assert_ne!(ghost, wallet.spend.public_key());
    }

    #[test]
    fn index_separates_keys() {
        let wallet = Wallet::new();
        let r = PrivateKey::generate();
        let a = wallet.view.public_key();
        let b = wallet.spend.public_key();
        assert_ne!(
            derive_ghost_public_key(&r, &a, &b, 0),
            derive_ghost_public_key(&r, &a, &b, 1)
        );
    }

    #[test]
    fn fresh_mask_gives_fresh_key() {
        let wallet = Wallet::new();
        let a = wallet.view.public_key();
        let b = wallet.spend.public_key();
        let first = derive_ghost_public_key(&PrivateKey::generate(), &a, &b, 0);
        let second = derive_ghost_public_key(&PrivateKey::generate(), &a, &b, 0);
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_index_or_wallet_does_not_recover() {
        let wallet = Wallet::new();
        let stranger = Wallet::new();
        let r = PrivateKey::generate();
        let ghost = derive_ghost_public_key(
            &r,
            &wallet.view.public_key(),
            &wallet.spend.public_key(),
            0,
        );
        let mask = r.public_key();
        assert_ne!(
            view_ghost_output_key(&ghost, &wallet.view, &mask, 1),
            wallet.spend.public_key()
        );
        assert_ne!(
            view_ghost_output_key(&ghost, &stranger.view, &mask, 0),
            stranger.spend.public_key()
        );
        assert_ne!(
            derive_ghost_private_key(&mask, &stranger.view, &stranger.spend, 0).public_key(),
            ghost
        );
    }

    #[test]
    fn ghost_secret_can_sign() {
        let wallet = Wallet::new();
        let r = PrivateKey::generate();
        let ghost = derive_ghost_public_key(
            &r,
            &wallet.view.public_key(),
            &wallet.spend.public_key(),
            2,
        );
        let secret = derive_ghost_private_key(&r.public_key(), &wallet.view, &wallet.spend, 2);
        let sig = secret.sign(b"spend me");
        assert!(ghost.verify(b"spend me", &sig));
    }
}
