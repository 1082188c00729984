//! # Transaction Module
//!
//! Construction, signing and validation of Tessera UTXO transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        - Integer amounts, inputs, outputs, UTXOs
//! script.rs       - The threshold script interpreter (Cmp, Sum)
//! builder.rs      - Unsigned Transaction assembly and the payload hash
//! signing.rs      - SignedTransaction, per-input signing, view-key scanning
//! verification.rs - Validation against a store, input locking, ValidationError
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`Transaction::new`], then `add_input` and
//!    `add_script_output`. Each script output gets a fresh mask and one
//!    ghost key per recipient.
//! 2. **Sign**: wrap in a [`SignedTransaction`] and call `sign_input` for
//!    every input with the accounts that own it.
//! 3. **Validate**: [`SignedTransaction::validate`] against the store.
//!    Read-only.
//! 4. **Consume**: [`SignedTransaction::lock_inputs`] reserves the inputs for
//!    this transaction. Only one transaction can hold an output.
//!
//! ## Design Decisions
//!
//! - The payload hash is BLAKE3 over a hand-rolled canonical encoding, and
//!   is both the transaction identifier and the signed message.
//! - Signatures are kept beside the payload, keyed by input then by key
//!   position, so inputs can be signed in any order by different parties.
//! - Amounts are exact fixed-point [`Integer`]s. Conservation is checked
//!   with overflow-checked addition.

pub mod builder;
pub mod script;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::Transaction;
pub use script::{Script, ScriptError, OPERATOR_CMP, OPERATOR_SUM};
pub use signing::SignedTransaction;
pub use types::{AmountError, AssetId, DepositData, Input, Integer, Output, OutputType, Utxo};
pub use verification::ValidationError;
