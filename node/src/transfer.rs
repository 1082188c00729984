//! # Local Transfer
//!
//! The whole transaction pipeline in one process: a genesis paying each
//! account's output to a growing set of owners, a transfer sweeping all of
//! it into one output behind a `[Cmp, Sum, threshold]` script, then sign,
//! validate, lock and record. Handy for poking at the ledger from a shell.

use anyhow::{ensure, Context, Result};
use serde::Serialize;
use tracing::info;

use tessera_protocol::config::native_asset_id;
use tessera_protocol::crypto::Hash;
use tessera_protocol::identity::{Address, PublicAddress};
use tessera_protocol::storage::{MemoryStore, NodeId};
use tessera_protocol::transaction::{
    Integer, Script, SignedTransaction, Transaction, OPERATOR_CMP, OPERATOR_SUM,
};

use crate::cli::TransferArgs;

/// Amount paid by each genesis output, in whole units.
const GENESIS_OUTPUT_AMOUNT: u64 = 10_000;

#[derive(Debug, Serialize)]
pub struct TransferReport {
    pub genesis: Hash,
    pub payload_hash: Hash,
    pub topological_order: u64,
    pub amount: Integer,
    pub threshold: u8,
    pub recipients: Vec<PublicAddress>,
    /// Signatures collected per input.
    pub signatures: Vec<usize>,
    /// Whether each recipient recovered its own spend key with its view key.
    pub recovered: Vec<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<SignedTransaction>,
}

pub fn run_transfer(args: &TransferArgs) -> Result<TransferReport> {
    ensure!(args.accounts > 0, "need at least one account");
    ensure!(
        args.accounts <= tessera_protocol::config::MAX_OUTPUT_KEYS,
        "at most {} accounts fit behind one output",
        tessera_protocol::config::MAX_OUTPUT_KEYS
    );
    ensure!(
        args.threshold >= 1 && usize::from(args.threshold) <= args.accounts,
        "threshold must be between 1 and {}",
        args.accounts
    );

    let accounts: Vec<Address> = (0..args.accounts).map(|_| Address::generate()).collect();
    let public: Vec<PublicAddress> = accounts.iter().map(Address::public).collect();
    let store = MemoryStore::new();

    let mut genesis = Transaction::new(native_asset_id());
    for i in 0..accounts.len() {
        genesis
            .add_script_output(
                &public[..=i],
                Script::new_threshold((i + 1) as u8),
                Integer::new(GENESIS_OUTPUT_AMOUNT),
            )
            .context("failed to build genesis")?;
    }
    let genesis = SignedTransaction::new(genesis);
    let genesis_hash = genesis.payload_hash();
    store
        .write_snapshot(NodeId::ZERO, 0, now_millis(), genesis)
        .context("failed to seed genesis")?;

    let total = (0..accounts.len()).try_fold(Integer::ZERO, |sum, _| {
        sum.checked_add(Integer::new(GENESIS_OUTPUT_AMOUNT))
    });
    let total = total.context("genesis total overflows")?;

    let mut tx = Transaction::new(native_asset_id());
    for i in 0..accounts.len() {
        tx.add_input(genesis_hash, i as u32)
            .context("failed to add input")?;
    }
    tx.add_script_output(
        &public,
        Script::from_bytes(vec![OPERATOR_CMP, OPERATOR_SUM, args.threshold]),
        total,
    )
    .context("failed to build transfer output")?;

    let mut tx = SignedTransaction::new(tx);
    for i in 0..accounts.len() {
        tx.sign_input(&store, i, &accounts)
            .with_context(|| format!("failed to sign input {}", i))?;
    }
    tx.validate(&store).context("transfer rejected")?;
    tx.lock_inputs(&store, false)
        .context("failed to lock transfer inputs")?;

    let signer = accounts
        .first()
        .map(Address::hash)
        .unwrap_or(NodeId::ZERO);
    let snapshot = store
        .write_snapshot(signer, 1, now_millis(), tx.clone())
        .context("failed to record transfer")?;

    let recovered = accounts
        .iter()
        .enumerate()
        .map(|(i, account)| {
            tx.view_ghost_key(&account.private_view_key)
                .first()
                .and_then(|output| output.keys.get(i))
                .is_some_and(|key| *key == account.public_spend_key)
        })
        .collect();

    info!(
        tx = %snapshot.payload_hash(),
        inputs = accounts.len(),
        amount = %total,
        threshold = args.threshold,
        "transfer accepted"
    );

    Ok(TransferReport {
        genesis: genesis_hash,
        payload_hash: snapshot.payload_hash(),
        topological_order: snapshot.topological_order,
        amount: total,
        threshold: args.threshold,
        recipients: public,
        signatures: tx.signatures.iter().map(|s| s.len()).collect(),
        recovered,
        transaction: args.show_transaction.then(|| tx.clone()),
    })
}

pub(crate) fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_of_three_transfer() {
        let report = run_transfer(&TransferArgs {
            accounts: 3,
            threshold: 2,
            show_transaction: false,
        })
        .unwrap();
        assert_eq!(report.topological_order, 1);
        assert_eq!(report.amount, Integer::new(30_000));
        assert_eq!(report.signatures, vec![1, 2, 3]);
        assert_eq!(report.recovered, vec![true, true, true]);
        assert!(report.transaction.is_none());
    }

    #[test]
    fn report_serializes() {
        let report = run_transfer(&TransferArgs {
            accounts: 1,
            threshold: 1,
            show_transaction: true,
        })
        .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["amount"], "10000.00000000");
        assert!(json["transaction"].is_object());
    }

    #[test]
    fn unreachable_threshold_rejected() {
        let err = run_transfer(&TransferArgs {
            accounts: 2,
            threshold: 3,
            show_transaction: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }
}
