//! Transaction validation against a store.
//!
//! [`SignedTransaction::validate`] decides whether a signed transaction may
//! be accepted. It reads from the store and never writes to it; consuming
//! the inputs is a separate, explicit step ([`SignedTransaction::lock_inputs`])
//! taken by whoever accepts the transaction.
//!
//! The checks are ordered from cheapest to most expensive, so a transaction
//! with the wrong version never costs a store read and one with a bad
//! output never costs a signature verification.

use std::collections::HashSet;
use thiserror::Error;

use super::builder::check_script_against_keys;
use super::script::ScriptError;
use super::signing::SignedTransaction;
use super::types::{DepositData, Input, Integer, OutputType};
use crate::config::{MAX_EXTRA_LENGTH, MAX_OUTPUT_KEYS, MAX_TX_INPUTS, MAX_TX_OUTPUTS, TX_VERSION};
use crate::crypto::{Hash, PublicKey};
use crate::storage::{DepositStore, DomainReader, GhostChecker, StoreError, UtxoLocker, UtxoReader};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a transaction was rejected (or could not be built or signed).
///
/// Every variant is a terminal verdict for the transaction as submitted;
/// none of them leave partial state behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An input references an output the store has never seen.
    #[error("utxo {hash}:{index} not found")]
    MissingUtxo { hash: Hash, index: u32 },

    /// An input's output is reserved by a different transaction.
    #[error("utxo {hash}:{index} already spent by {locked_by}")]
    AlreadySpent {
        hash: Hash,
        index: u32,
        locked_by: Hash,
    },

    /// A ghost key was consumed by another transaction, or appears twice.
    #[error("ghost key {key} already used")]
    GhostKeyReused {
        key: PublicKey,
        spent_by: Option<Hash>,
    },

    /// The signatures on an input do not reach its script's threshold.
    #[error("input {input}: script unsatisfied, weight {weight} below threshold {threshold}")]
    ScriptUnsatisfied {
        input: usize,
        weight: usize,
        threshold: u8,
    },

    /// A supplied signature does not verify against its key.
    #[error("input {input}: invalid signature for key {key_index}")]
    SignatureInvalid { input: usize, key_index: u16 },

    /// Input and output totals differ.
    #[error("amount mismatch: inputs {inputs}, outputs {outputs}")]
    AmountMismatch { inputs: Integer, outputs: Integer },

    #[error("malformed script: {reason}")]
    MalformedScript { reason: String },

    #[error("unsupported transaction version {0}")]
    UnsupportedVersion(u8),

    #[error("transaction has no inputs")]
    EmptyInputs,

    #[error("transaction has no outputs")]
    EmptyOutputs,

    #[error("too many inputs: {0} (max {max})", max = MAX_TX_INPUTS)]
    TooManyInputs(usize),

    #[error("too many outputs: {0} (max {max})", max = MAX_TX_OUTPUTS)]
    TooManyOutputs(usize),

    #[error("extra too large: {0} bytes (max {max})", max = MAX_EXTRA_LENGTH)]
    ExtraTooLarge(usize),

    #[error("duplicate input {hash}:{index}")]
    DuplicateInput { hash: Hash, index: u32 },

    #[error("expected {expected} signature maps, got {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    #[error("asset mismatch: transaction moves {expected}, input holds {actual}")]
    AssetMismatch { expected: Hash, actual: Hash },

    #[error("output {index} has a zero amount")]
    InvalidOutputAmount { index: usize },

    #[error("utxo {hash}:{index} is a plain output and cannot be spent")]
    UnspendableOutput { hash: Hash, index: u32 },

    #[error("input index {index} out of range ({len} inputs)")]
    InputIndexOutOfRange { index: usize, len: usize },

    /// Deposit transactions have exactly one input and one output.
    #[error("invalid deposit transaction: {0}")]
    DepositShape(String),

    #[error("deposit rejected: {0}")]
    DepositRejected(String),

    #[error("amount overflow")]
    AmountOverflow,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ValidationError {
    pub(crate) fn from_script(input: usize, err: ScriptError) -> Self {
        match err {
            ScriptError::Malformed(reason) => Self::MalformedScript { reason },
            ScriptError::UnknownOperator(op) => Self::MalformedScript {
                reason: format!("unknown operator 0x{:02x}", op),
            },
            ScriptError::SignatureMismatch { index } => Self::SignatureInvalid {
                input,
                key_index: index,
            },
            ScriptError::Unsatisfied { weight, threshold } => Self::ScriptUnsatisfied {
                input,
                weight,
                threshold,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl SignedTransaction {
    /// Decide whether this transaction may be accepted by `store`.
    ///
    /// The checks, in order:
    ///
    /// 1. **Structure**: version, input/output counts, extra size, one
    ///    signature map per input, no input listed twice.
    /// 2. **Deposit shape**: a deposit input must be the only input, with a
    ///    single output.
    /// 3. **Outputs**: non-zero amounts, well-formed scripts with reachable
    ///    thresholds, no ghost key repeated or already consumed.
    /// 4. **Inputs**: each referenced output exists, holds
    ///    this asset, is not locked by another transaction, has no consumed
    ///    ghost key, and its script accepts the supplied signatures.
    ///    Deposit inputs instead need the domain's signature and an
    ///    unclaimed deposit.
    /// 5. **Conservation**: inputs sum exactly to outputs.
    ///
    /// # Errors
    ///
    /// The first failing check, as a [`ValidationError`]. Store failures
    /// surface as [`ValidationError::Store`].
    pub fn validate<S>(&self, store: &S) -> Result<(), ValidationError>
    where
        S: UtxoReader + GhostChecker + DomainReader + DepositStore + ?Sized,
    {
        let tx = &self.transaction;

        // 1. Structure.
        if tx.version != TX_VERSION {
            return Err(ValidationError::UnsupportedVersion(tx.version));
        }
        if tx.inputs.is_empty() {
            return Err(ValidationError::EmptyInputs);
        }
        if tx.outputs.is_empty() {
            return Err(ValidationError::EmptyOutputs);
        }
        if tx.inputs.len() > MAX_TX_INPUTS {
            return Err(ValidationError::TooManyInputs(tx.inputs.len()));
        }
        if tx.outputs.len() > MAX_TX_OUTPUTS {
            return Err(ValidationError::TooManyOutputs(tx.outputs.len()));
        }
        if tx.extra.len() > MAX_EXTRA_LENGTH {
            return Err(ValidationError::ExtraTooLarge(tx.extra.len()));
        }
        if self.signatures.len() != tx.inputs.len() {
            return Err(ValidationError::SignatureCountMismatch {
                expected: tx.inputs.len(),
                actual: self.signatures.len(),
            });
        }
        let mut seen: HashSet<(Hash, u32)> = HashSet::new();
        for input in &tx.inputs {
            if let Input::Utxo { hash, index } = input {
                if !seen.insert((*hash, *index)) {
                    return Err(ValidationError::DuplicateInput {
                        hash: *hash,
                        index: *index,
                    });
                }
            }
        }

        // 2. Deposit shape.
        if tx.inputs.iter().any(Input::is_deposit) && (tx.inputs.len() != 1 || tx.outputs.len() != 1) {
            return Err(ValidationError::DepositShape(format!(
                "expected 1 input and 1 output, got {} and {}",
                tx.inputs.len(),
                tx.outputs.len()
            )));
        }

        let message = self.payload_hash();

        // 3. Outputs.
        let mut output_total = Integer::ZERO;
        let mut fresh_keys: HashSet<PublicKey> = HashSet::new();
        for (index, output) in tx.outputs.iter().enumerate() {
            if output.amount.is_zero() {
                return Err(ValidationError::InvalidOutputAmount { index });
            }
            match output.output_type {
                OutputType::Script => {
                    if output.keys.is_empty() || output.keys.len() > MAX_OUTPUT_KEYS {
                        return Err(ValidationError::MalformedScript {
                            reason: format!("output {} has {} keys", index, output.keys.len()),
                        });
                    }
                    check_script_against_keys(&output.script, output.keys.len())?;
                }
                OutputType::Plain => {
                    if !output.keys.is_empty() || !output.script.is_empty() {
                        return Err(ValidationError::MalformedScript {
                            reason: format!("plain output {} carries keys or a script", index),
                        });
                    }
                }
            }
            for key in &output.keys {
                if !fresh_keys.insert(*key) {
                    return Err(ValidationError::GhostKeyReused {
                        key: *key,
                        spent_by: None,
                    });
                }
                if let Some(spent_by) = store.check_ghost(key)? {
                    if spent_by != message {
                        return Err(ValidationError::GhostKeyReused {
                            key: *key,
                            spent_by: Some(spent_by),
                        });
                    }
                }
            }
            output_total = output_total
                .checked_add(output.amount)
                .ok_or(ValidationError::AmountOverflow)?;
        }

        // 4. Inputs.
        let mut input_total = Integer::ZERO;
        for (i, input) in tx.inputs.iter().enumerate() {
            let amount = match input {
                Input::Deposit(deposit) => self.validate_deposit(store, i, deposit, &message)?,
                Input::Utxo { hash, index } => {
                    let utxo = store
                        .read_utxo(hash, *index)?
                        .ok_or(ValidationError::MissingUtxo {
                            hash: *hash,
                            index: *index,
                        })?;
                    if utxo.asset != tx.asset {
                        return Err(ValidationError::AssetMismatch {
                            expected: tx.asset,
                            actual: utxo.asset,
                        });
                    }
                    if let Some(locked_by) = utxo.lock {
                        if locked_by != message {
                            return Err(ValidationError::AlreadySpent {
                                hash: *hash,
                                index: *index,
                                locked_by,
                            });
                        }
                    }
                    if utxo.output.output_type == OutputType::Plain {
                        return Err(ValidationError::UnspendableOutput {
                            hash: *hash,
                            index: *index,
                        });
                    }
                    for key in utxo.keys() {
                        if let Some(spent_by) = store.check_ghost(key)? {
                            if spent_by != message {
                                return Err(ValidationError::GhostKeyReused {
                                    key: *key,
                                    spent_by: Some(spent_by),
                                });
                            }
                        }
                    }

                    utxo.output
                        .script
                        .evaluate(message.as_bytes(), utxo.keys(), &self.signatures[i])
                        .map_err(|e| ValidationError::from_script(i, e))?;
                    utxo.amount()
                }
            };
            input_total = input_total
                .checked_add(amount)
                .ok_or(ValidationError::AmountOverflow)?;
        }

        // 5. Conservation.
        if input_total != output_total {
            return Err(ValidationError::AmountMismatch {
                inputs: input_total,
                outputs: output_total,
            });
        }

        Ok(())
    }

    fn validate_deposit<S>(
        &self,
        store: &S,
        input: usize,
        deposit: &DepositData,
        message: &Hash,
    ) -> Result<Integer, ValidationError>
    where
        S: DomainReader + DepositStore + ?Sized,
    {
        if deposit.asset() != self.transaction.asset {
            return Err(ValidationError::AssetMismatch {
                expected: self.transaction.asset,
                actual: deposit.asset(),
            });
        }
        if deposit.amount.is_zero() {
            return Err(ValidationError::DepositRejected("zero deposit amount".into()));
        }

        let domain = store
            .read_domains()
            .into_iter()
            .next()
            .ok_or_else(|| ValidationError::DepositRejected("no registered domain".into()))?;

        let signatures = &self.signatures[input];
        let verified = signatures.len() == 1
            && signatures.get(&0).is_some_and(|sig| {
                domain
                    .account
                    .public_spend_key
                    .verify(message.as_bytes(), sig)
            });
        if !verified {
            return Err(ValidationError::SignatureInvalid {
                input,
                key_index: 0,
            });
        }

        store
            .check_deposit_input(deposit, message)
            .map_err(|e| match e {
                e @ StoreError::DepositLocked { .. } => ValidationError::DepositRejected(e.to_string()),
                other => ValidationError::Store(other),
            })?;
        Ok(deposit.amount)
    }

    /// Reserve every input for this transaction.
    ///
    /// Locks are taken one input at a time. If a later input fails, earlier
    /// ones stay locked to this transaction; since locking is idempotent for
    /// the same transaction, retrying is safe. With `fork` set, locks held by
    /// other transactions are taken over.
    pub fn lock_inputs<S>(&self, store: &S, fork: bool) -> Result<(), ValidationError>
    where
        S: UtxoLocker + DepositStore + ?Sized,
    {
        let message = self.payload_hash();
        for input in &self.transaction.inputs {
            match input {
                Input::Utxo { hash, index } => {
                    store
                        .lock_utxo(hash, *index, &message, fork)
                        .map_err(|e| match e {
                            StoreError::UtxoLocked {
                                hash,
                                index,
                                locked_by,
                            } => ValidationError::AlreadySpent {
                                hash,
                                index,
                                locked_by,
                            },
                            StoreError::NotFound(_) => ValidationError::MissingUtxo {
                                hash: *hash,
                                index: *index,
                            },
                            other => ValidationError::Store(other),
                        })?;
                }
                Input::Deposit(deposit) => {
                    store
                        .lock_deposit_input(deposit, &message, fork)
                        .map_err(|e| match e {
                            e @ StoreError::DepositLocked { .. } => {
                                ValidationError::DepositRejected(e.to_string())
                            }
                            other => ValidationError::Store(other),
                        })?;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
