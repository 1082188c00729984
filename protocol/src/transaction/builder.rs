//! Unsigned transaction construction.
//!
//! A [`Transaction`] is assembled incrementally: pick an asset, add inputs,
//! add outputs. Adding a script output is where the privacy happens: the
//! builder draws a fresh mask and derives one ghost key per recipient, so
//! the recipients' addresses never touch the ledger.
//!
//! The identity of a transaction is its payload hash,
//! `BLAKE3(canonical_bytes)`, which is also the exact message every input
//! signature commits to.

use serde::{Deserialize, Serialize};

use super::script::Script;
use super::types::{AssetId, DepositData, Input, Integer, Output, OutputType};
use super::verification::ValidationError;
use crate::config::{MAX_EXTRA_LENGTH, MAX_OUTPUT_KEYS, MAX_TX_INPUTS, MAX_TX_OUTPUTS, TX_VERSION};
use crate::crypto::{derive_ghost_public_key, Hash, PrivateKey};
use crate::identity::PublicAddress;

/// An unsigned transaction.
///
/// The payload hash covers every field here. Signatures live next to it in
/// [`super::signing::SignedTransaction`] and are not part of the payload,
/// which is what makes signing order-independent across inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u8,
    pub asset: AssetId,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    /// Free-form payload, at most [`MAX_EXTRA_LENGTH`] bytes.
    pub extra: Vec<u8>,
}

impl Transaction {
    /// An empty transaction moving `asset`.
    pub fn new(asset: AssetId) -> Self {
        Self {
            version: TX_VERSION,
            asset,
            inputs: Vec::new(),
            outputs: Vec::new(),
            extra: Vec::new(),
        }
    }

    /// Reference output `index` of transaction `hash`.
    ///
    /// Referencing the same output twice is rejected here rather than left
    /// for the validator to find.
    pub fn add_input(&mut self, hash: Hash, index: u32) -> Result<&mut Self, ValidationError> {
        let input = Input::utxo(hash, index);
        if self.inputs.contains(&input) {
            return Err(ValidationError::DuplicateInput { hash, index });
        }
        self.push_input(input)
    }

    /// Claim an external deposit. A deposit transaction has exactly this one
    /// input, which the validator enforces.
    pub fn add_deposit_input(&mut self, deposit: DepositData) -> Result<&mut Self, ValidationError> {
        self.push_input(Input::Deposit(deposit))
    }

    fn push_input(&mut self, input: Input) -> Result<&mut Self, ValidationError> {
        if self.inputs.len() >= MAX_TX_INPUTS {
            return Err(ValidationError::TooManyInputs(self.inputs.len() + 1));
        }
        self.inputs.push(input);
        Ok(self)
    }

    /// Pay `amount` to `recipients`, spendable under `script`.
    ///
    /// Draws a fresh mask `r`, publishes `R = r*G`, and derives the ghost key
    /// for the recipient at position `n` as `Hs(r*A_n, n)*G + B_n`.
    pub fn add_script_output(
        &mut self,
        recipients: &[PublicAddress],
        script: Script,
        amount: Integer,
    ) -> Result<&mut Self, ValidationError> {
        self.add_script_output_with_mask(recipients, script, amount, &PrivateKey::generate())
    }

    /// [`add_script_output`](Self::add_script_output) with a caller-chosen
    /// mask. Reusing a mask across outputs links them; only do this for
    /// reproducible fixtures.
    pub fn add_script_output_with_mask(
        &mut self,
        recipients: &[PublicAddress],
        script: Script,
        amount: Integer,
        mask: &PrivateKey,
    ) -> Result<&mut Self, ValidationError> {
        if recipients.is_empty() || recipients.len() > MAX_OUTPUT_KEYS {
            return Err(ValidationError::MalformedScript {
                reason: format!("output needs 1..={} recipients, got {}", MAX_OUTPUT_KEYS, recipients.len()),
            });
        }
        check_script_against_keys(&script, recipients.len())?;
        if amount.is_zero() {
            return Err(ValidationError::InvalidOutputAmount {
                index: self.outputs.len(),
            });
        }
        if self.outputs.len() >= MAX_TX_OUTPUTS {
            return Err(ValidationError::TooManyOutputs(self.outputs.len() + 1));
        }

        let keys = recipients
            .iter()
            .enumerate()
            .map(|(n, recipient)| {
                derive_ghost_public_key(
                    mask,
                    &recipient.public_view_key,
                    &recipient.public_spend_key,
                    n as u64,
                )
            })
            .collect();

        self.outputs.push(Output {
            output_type: OutputType::Script,
            amount,
            script,
            mask: mask.public_key(),
            keys,
        });
        Ok(self)
    }

    /// Burn `amount` into an unspendable plain output.
    pub fn add_plain_output(&mut self, amount: Integer) -> Result<&mut Self, ValidationError> {
        if amount.is_zero() {
            return Err(ValidationError::InvalidOutputAmount {
                index: self.outputs.len(),
            });
        }
        if self.outputs.len() >= MAX_TX_OUTPUTS {
            return Err(ValidationError::TooManyOutputs(self.outputs.len() + 1));
        }
        self.outputs.push(Output {
            output_type: OutputType::Plain,
            amount,
            script: Script::empty(),
            mask: PrivateKey::generate().public_key(),
            keys: Vec::new(),
        });
        Ok(self)
    }

    pub fn set_extra(&mut self, extra: Vec<u8>) -> Result<&mut Self, ValidationError> {
        if extra.len() > MAX_EXTRA_LENGTH {
            return Err(ValidationError::ExtraTooLarge(extra.len()));
        }
        self.extra = extra;
        Ok(self)
    }

    /// The canonical byte encoding hashed into the payload hash.
    ///
    /// Fixed-width little-endian integers, explicit tags and length
    /// prefixes. Serde is not involved so that the encoding cannot drift
    /// with a serializer upgrade.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.outputs.len() * 96);

        buf.push(self.version);
        buf.extend_from_slice(self.asset.as_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            match input {
                Input::Utxo { hash, index } => {
                    buf.push(0x00);
                    buf.extend_from_slice(hash.as_bytes());
                    buf.extend_from_slice(&index.to_le_bytes());
                }
                Input::Deposit(deposit) => {
                    buf.push(0x01);
                    buf.extend_from_slice(deposit.chain.as_bytes());
                    put_bytes(&mut buf, deposit.asset_key.as_bytes());
                    put_bytes(&mut buf, deposit.transaction_hash.as_bytes());
                    buf.extend_from_slice(&deposit.output_index.to_le_bytes());
                    buf.extend_from_slice(&deposit.amount.units().to_le_bytes());
                }
            }
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.push(output.output_type.tag());
            buf.extend_from_slice(&output.amount.units().to_le_bytes());
            put_bytes(&mut buf, output.script.as_bytes());
            buf.extend_from_slice(&output.mask.to_bytes());
            buf.extend_from_slice(&(output.keys.len() as u32).to_le_bytes());
            for key in &output.keys {
                buf.extend_from_slice(&key.to_bytes());
            }
        }

        put_bytes(&mut buf, &self.extra);
        buf
    }

    /// `BLAKE3(canonical_bytes)`: the transaction's identity and the message
    /// its signatures commit to.
    pub fn payload_hash(&self) -> Hash {
        Hash::new(&self.canonical_bytes())
    }
}

/// Length-prefixed (u32 LE) byte string.
fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// A script output is well-formed when its script is and its threshold is
/// reachable with the keys it has.
pub(crate) fn check_script_against_keys(script: &Script, keys: usize) -> Result<(), ValidationError> {
    script
        .verify_format()
        .map_err(|e| ValidationError::MalformedScript {
            reason: e.to_string(),
        })?;
    let threshold = script.threshold().unwrap_or(0) as usize;
    if threshold > keys {
        return Err(ValidationError::MalformedScript {
            reason: format!("threshold {} exceeds {} keys", threshold, keys),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::native_asset_id;
    use crate::crypto::view_ghost_output_key;
    use crate::identity::Address;

    fn recipients(n: usize) -> (Vec<Address>, Vec<PublicAddress>) {
        let accounts: Vec<Address> = (0..n).map(|_| Address::generate()).collect();
        let public = accounts.iter().map(Address::public).collect();
        (accounts, public)
    }

    #[test]
    fn new_transaction_is_empty() {
        let tx = Transaction::new(native_asset_id());
        assert_eq!(tx.version, TX_VERSION);
        assert!(tx.inputs.is_empty());
        assert!(tx.outputs.is_empty());
    }

    #[test]
    fn duplicate_input_rejected() {
        let mut tx = Transaction::new(native_asset_id());
        let h = Hash::new(b"genesis");
        tx.add_input(h, 0).unwrap();
        tx.add_input(h, 1).unwrap();
        match tx.add_input(h, 0) {
            Err(ValidationError::DuplicateInput { index: 0, .. }) => {}
            other => panic!("expected DuplicateInput, got {:?}", other),
        }
        assert_eq!(tx.inputs.len(), 2);
    }

    #[test]
    fn script_output_derives_one_key_per_recipient() {
        let (accounts, public) = recipients(3);
        let mut tx = Transaction::new(native_asset_id());
        tx.add_script_output(&public, Script::new_threshold(2), Integer::new(5))
            .unwrap();

        let output = &tx.outputs[0];
        assert_eq!(output.keys.len(), 3);
        for (n, account) in accounts.iter().enumerate() {
            assert_ne!(output.keys[n], account.public_spend_key);
            let recovered =
                view_ghost_output_key(&output.keys[n], &account.private_view_key, &output.mask, n as u64);
            assert_eq!(recovered, account.public_spend_key);
        }
    }

    #[test]
    fn same_recipient_twice_gets_distinct_keys() {
        let (_, public) = recipients(1);
        let doubled = vec![public[0], public[0]];
        let mut tx = Transaction::new(native_asset_id());
        tx.add_script_output(&doubled, Script::new_threshold(1), Integer::new(1))
            .unwrap();
        assert_ne!(tx.outputs[0].keys[0], tx.outputs[0].keys[1]);
    }

    #[test]
    fn unreachable_threshold_rejected() {
        let (_, public) = recipients(2);
        let mut tx = Transaction::new(native_asset_id());
        match tx.add_script_output(&public, Script::new_threshold(3), Integer::new(1)) {
            Err(ValidationError::MalformedScript { .. }) => {}
            other => panic!("expected MalformedScript, got {:?}", other),
        }
        assert!(tx.outputs.is_empty());
    }

    #[test]
    fn no_recipients_rejected() {
        let mut tx = Transaction::new(native_asset_id());
        assert!(matches!(
            tx.add_script_output(&[], Script::new_threshold(1), Integer::new(1)),
            Err(ValidationError::MalformedScript { .. })
        ));
    }

    #[test]
    fn zero_amount_rejected() {
        let (_, public) = recipients(1);
        let mut tx = Transaction::new(native_asset_id());
        assert!(matches!(
            tx.add_script_output(&public, Script::new_threshold(1), Integer::ZERO),
            Err(ValidationError::InvalidOutputAmount { index: 0 })
        ));
        assert!(matches!(
            tx.add_plain_output(Integer::ZERO),
            Err(ValidationError::InvalidOutputAmount { index: 0 })
        ));
    }

    #[test]
    fn oversized_extra_rejected() {
        let mut tx = Transaction::new(native_asset_id());
        assert!(tx.set_extra(vec![0; MAX_EXTRA_LENGTH]).is_ok());
        assert!(matches!(
            tx.set_extra(vec![0; MAX_EXTRA_LENGTH + 1]),
            Err(ValidationError::ExtraTooLarge(_))
        ));
    }

    #[test]
    fn payload_hash_is_deterministic_and_sensitive() {
        let (_, public) = recipients(1);
        let mask = PrivateKey::generate();
        let mut tx = Transaction::new(native_asset_id());
        tx.add_input(Hash::new(b"a"), 0).unwrap();
        tx.add_script_output_with_mask(&public, Script::new_threshold(1), Integer::new(7), &mask)
            .unwrap();

        let copy = tx.clone();
        assert_eq!(tx.payload_hash(), copy.payload_hash());

        let mut altered = tx.clone();
        altered.outputs[0].amount = Integer::new(8);
        assert_ne!(tx.payload_hash(), altered.payload_hash());

        let mut reordered = tx.clone();
        reordered.inputs[0] = Input::utxo(Hash::new(b"a"), 1);
        assert_ne!(tx.payload_hash(), reordered.payload_hash());
    }
}
