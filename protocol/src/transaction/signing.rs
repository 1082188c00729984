//! Input signing.
//!
//! Each input is signed independently. For a UTXO input the signer walks
//! the output's ghost keys, recomputes the one-time private key each
//! candidate account would hold at that position, and signs with every one
//! that matches. The result is a map from key position to signature, one
//! map per input.
//!
//! Nothing is written unless the collected signatures already satisfy the
//! output's threshold, so a failed call leaves the transaction exactly as it
//! was.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::builder::Transaction;
use super::types::{Input, Output, OutputType};
use super::verification::ValidationError;
use crate::crypto::{derive_ghost_private_key, view_ghost_output_key, Hash, PrivateKey, Signature};
use crate::identity::Address;
use crate::storage::UtxoReader;

/// A transaction plus one signature map per input.
///
/// `signatures[i]` maps a key position in the output spent by input `i` to
/// a signature over the payload hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signatures: Vec<BTreeMap<u16, Signature>>,
}

impl SignedTransaction {
    /// Wrap `transaction` with an empty signature map per input.
    pub fn new(transaction: Transaction) -> Self {
        let signatures = vec![BTreeMap::new(); transaction.inputs.len()];
        Self {
            transaction,
            signatures,
        }
    }

    pub fn payload_hash(&self) -> Hash {
        self.transaction.payload_hash()
    }

    /// Sign input `input_index` with whichever of `accounts` own keys on the
    /// output it spends.
    ///
    /// Deposit inputs are signed by `accounts[0]`'s spend key, which must be
    /// the registered domain for the transaction to validate.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InputIndexOutOfRange`] for a bad index.
    /// - [`ValidationError::MissingUtxo`] if the store has no such output.
    /// - [`ValidationError::UnspendableOutput`] for plain outputs.
    /// - [`ValidationError::MalformedScript`] if the output's script is bad.
    /// - [`ValidationError::ScriptUnsatisfied`] if the matching accounts do
    ///   not reach the threshold.
    pub fn sign_input<S: UtxoReader + ?Sized>(
        &mut self,
        store: &S,
        input_index: usize,
        accounts: &[Address],
    ) -> Result<(), ValidationError> {
        let input = self
            .transaction
            .inputs
            .get(input_index)
            .ok_or(ValidationError::InputIndexOutOfRange {
                index: input_index,
                len: self.transaction.inputs.len(),
            })?;
        let message = self.payload_hash();

        let signatures = match input {
            Input::Deposit(_) => {
                let domain = accounts.first().ok_or_else(|| {
                    ValidationError::DepositShape("deposit input needs a domain signer".into())
                })?;
                BTreeMap::from([(0u16, domain.private_spend_key.sign(message.as_bytes()))])
            }
            Input::Utxo { hash, index } => {
                let utxo = store
                    .read_utxo(hash, *index)?
                    .ok_or(ValidationError::MissingUtxo {
                        hash: *hash,
                        index: *index,
                    })?;
                if utxo.output.output_type == OutputType::Plain {
                    return Err(ValidationError::UnspendableOutput {
                        hash: *hash,
                        index: *index,
                    });
                }

                let mut signatures = BTreeMap::new();
                for (position, key) in utxo.keys().iter().enumerate() {
                    let owner = accounts.iter().find_map(|account| {
                        let secret = derive_ghost_private_key(
                            &utxo.output.mask,
                            &account.private_view_key,
                            &account.private_spend_key,
                            position as u64,
                        );
                        (secret.public_key() == *key).then_some(secret)
                    });
                    if let Some(secret) = owner {
                        signatures.insert(position as u16, secret.sign(message.as_bytes()));
                    }
                }

                utxo.output
                    .script
                    .validate(signatures.len())
                    .map_err(|e| ValidationError::from_script(input_index, e))?;
                signatures
            }
        };

        if self.signatures.len() < self.transaction.inputs.len() {
            self.signatures
                .resize(self.transaction.inputs.len(), BTreeMap::new());
        }
        self.signatures[input_index] = signatures;
        Ok(())
    }

    /// See [`Transaction::view_ghost_key`].
    pub fn view_ghost_key(&self, view: &PrivateKey) -> Vec<Output> {
        self.transaction.view_ghost_key(view)
    }
}

impl From<Transaction> for SignedTransaction {
    fn from(transaction: Transaction) -> Self {
        Self::new(transaction)
    }
}

impl Transaction {
    /// Copies of every output with each ghost key `P_n` replaced by
    /// `P_n - Hs(a*R, n)*G`.
    ///
    /// For outputs paid to the holder of `view`, keys at that holder's
    /// positions come back as their public spend key; every other key turns
    /// into noise. Nothing is mutated.
    pub fn view_ghost_key(&self, view: &PrivateKey) -> Vec<Output> {
        self.outputs
            .iter()
            .map(|output| {
                let mut viewed = output.clone();
                viewed.keys = output
                    .keys
                    .iter()
                    .enumerate()
                    .map(|(n, key)| view_ghost_output_key(key, view, &output.mask, n as u64))
                    .collect();
                viewed
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::native_asset_id;
    use crate::identity::PublicAddress;
    use crate::storage::{MemoryStore, NodeId};
    use crate::transaction::{Integer, Script};

    /// A store holding one genesis output of 100 paid to `owners` under a
    /// `threshold`-of-n script. Returns the output's (hash, index).
    fn funded_store(owners: &[Address], threshold: u8) -> (MemoryStore, Hash) {
        let store = MemoryStore::new();
        let public: Vec<PublicAddress> = owners.iter().map(Address::public).collect();
        let mut genesis = Transaction::new(native_asset_id());
        genesis
            .add_script_output(&public, Script::new_threshold(threshold), Integer::new(100))
            .unwrap();
        let genesis = SignedTransaction::new(genesis);
        let hash = genesis.payload_hash();
        store
            .write_snapshot(NodeId::ZERO, 0, 0, genesis)
            .unwrap();
        (store, hash)
    }

    fn spend(hash: Hash, to: &Address) -> SignedTransaction {
        let mut tx = Transaction::new(native_asset_id());
        tx.add_input(hash, 0).unwrap();
        tx.add_script_output(&[to.public()], Script::new_threshold(1), Integer::new(100))
            .unwrap();
        SignedTransaction::new(tx)
    }

    #[test]
    fn signs_with_matching_account() {
        let alice = Address::generate();
        let (store, hash) = funded_store(&[alice.clone()], 1);
        let mut tx = spend(hash, &Address::generate());
        tx.sign_input(&store, 0, &[alice]).unwrap();
        assert_eq!(tx.signatures[0].len(), 1);
        assert!(tx.signatures[0].contains_key(&0));
    }

    #[test]
    fn ignores_non_owners() {
        let alice = Address::generate();
        let bob = Address::generate();
        let mallory = Address::generate();
        let (store, hash) = funded_store(&[alice.clone(), bob.clone()], 1);
        let mut tx = spend(hash, &mallory);
        tx.sign_input(&store, 0, &[mallory.clone(), bob]).unwrap();
        // Only bob's position (1) is signed.
        assert_eq!(tx.signatures[0].keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn below_threshold_leaves_transaction_untouched() {
        let alice = Address::generate();
        let bob = Address::generate();
        let (store, hash) = funded_store(&[alice.clone(), bob], 2);
        let mut tx = spend(hash, &alice);
        let before = tx.clone();
        match tx.sign_input(&store, 0, &[alice]) {
            Err(ValidationError::ScriptUnsatisfied {
                weight: 1,
                threshold: 2,
                ..
            }) => {}
            other => panic!("expected ScriptUnsatisfied, got {:?}", other),
        }
        assert_eq!(tx, before);
    }

    #[test]
    fn missing_utxo_reported() {
        let store = MemoryStore::new();
        let alice = Address::generate();
        let mut tx = spend(Hash::new(b"nowhere"), &alice);
        match tx.sign_input(&store, 0, &[alice]) {
            Err(ValidationError::MissingUtxo { index: 0, .. }) => {}
            other => panic!("expected MissingUtxo, got {:?}", other),
        }
    }

    #[test]
    fn bad_input_index_reported() {
        let store = MemoryStore::new();
        let alice = Address::generate();
        let mut tx = spend(Hash::new(b"x"), &alice);
        assert!(matches!(
            tx.sign_input(&store, 3, &[alice]),
            Err(ValidationError::InputIndexOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn view_ghost_key_recovers_spend_keys() {
        let accounts: Vec<Address> = (0..3).map(|_| Address::generate()).collect();
        let public: Vec<PublicAddress> = accounts.iter().map(Address::public).collect();
        let mut tx = Transaction::new(native_asset_id());
        tx.add_script_output(&public, Script::new_threshold(2), Integer::new(1))
            .unwrap();
        let original = tx.clone();

        let viewed = tx.view_ghost_key(&accounts[1].private_view_key);
        assert_eq!(viewed[0].keys[1], accounts[1].public_spend_key);
        assert_ne!(viewed[0].keys[0], accounts[0].public_spend_key);
        assert_ne!(viewed[0].keys[2], accounts[2].public_spend_key);
        assert_eq!(tx, original);
    }
}
