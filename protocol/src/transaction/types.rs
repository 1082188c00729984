//! Core type definitions for Tessera transactions.
//!
//! The vocabulary of the UTXO model: amounts, inputs that point at earlier
//! outputs (or at an external deposit), and outputs locked behind a set of
//! ghost keys and a [`Script`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::script::Script;
use crate::config::{AMOUNT_PRECISION, AMOUNT_SCALE};
use crate::crypto::hash::blake3_hash_multi;
use crate::crypto::{Hash, PublicKey};

/// Assets are identified by a hash. The native asset is
/// [`crate::config::native_asset_id`].
pub type AssetId = Hash;

// ---------------------------------------------------------------------------
// Integer
// ---------------------------------------------------------------------------

/// Errors from parsing a decimal amount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("amount has more than {} decimal places", AMOUNT_PRECISION)]
    TooPrecise,

    #[error("amount overflows")]
    Overflow,
}

/// An exact, non-negative fixed-point amount with eight decimal places.
///
/// Stored as a count of base units (`10^-8`) in a `u128`, so any `u64`
/// number of whole units fits and sums of many outputs have headroom. No
/// floating point within a mile of this type.
///
/// # Examples
///
/// ```
/// use tessera_protocol::transaction::Integer;
///
/// let a = Integer::new(20_000);
/// assert_eq!(a.to_string(), "20000.00000000");
/// assert_eq!("0.5".parse::<Integer>().unwrap().units(), 50_000_000);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Integer(u128);

impl Integer {
    pub const ZERO: Self = Self(0);

    /// `whole` units of the asset.
    pub fn new(whole: u64) -> Self {
        Self(whole as u128 * AMOUNT_SCALE)
    }

    /// An amount expressed directly in base units.
    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    pub fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0>width$}",
            self.0 / AMOUNT_SCALE,
            self.0 % AMOUNT_SCALE,
            width = AMOUNT_PRECISION as usize
        )
    }
}

impl fmt::Debug for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Integer({})", self)
    }
}

impl FromStr for Integer {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if frac.len() > AMOUNT_PRECISION as usize {
            return Err(AmountError::TooPrecise);
        }

        let whole: u128 = whole.parse().map_err(|_| AmountError::Overflow)?;
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = AMOUNT_PRECISION as usize);
            padded
                .parse()
                .map_err(|_| AmountError::Invalid(s.to_string()))?
        };

        whole
            .checked_mul(AMOUNT_SCALE)
            .and_then(|units| units.checked_add(frac_units))
            .map(Self)
            .ok_or(AmountError::Overflow)
    }
}

impl Serialize for Integer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Integer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A deposit arriving from an external chain.
///
/// Verifying that the external transfer really happened is the bridge's
/// job; the ledger only checks the domain's signature and asks the store
/// whether this deposit has already been claimed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositData {
    /// Identifier of the external chain.
    pub chain: Hash,
    /// The asset's key on that chain (contract address, ticker, ...).
    pub asset_key: String,
    /// Transaction hash on the external chain, in its native notation.
    pub transaction_hash: String,
    pub output_index: u64,
    pub amount: Integer,
}

impl DepositData {
    /// The ledger asset this deposit mints: `BLAKE3(chain || asset_key)`.
    pub fn asset(&self) -> AssetId {
        Hash::from_bytes(blake3_hash_multi(&[
            &self.chain.as_bytes()[..],
            self.asset_key.as_bytes(),
        ]))
    }

    /// Identity of the external transfer, used to lock it against double
    /// claims.
    pub fn unique_key(&self) -> Hash {
        Hash::from_bytes(blake3_hash_multi(&[
            &self.chain.as_bytes()[..],
            self.transaction_hash.as_bytes(),
            &self.output_index.to_le_bytes()[..],
        ]))
    }
}

/// What a transaction consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    /// Output `index` of the transaction whose payload hash is `hash`.
    Utxo { hash: Hash, index: u32 },
    /// Value entering the ledger from outside.
    Deposit(DepositData),
}

impl Input {
    pub fn utxo(hash: Hash, index: u32) -> Self {
        Self::Utxo { hash, index }
    }

    pub fn is_deposit(&self) -> bool {
        matches!(self, Self::Deposit(_))
    }
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Output kind. The tag is part of the signed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputType {
    /// Spendable by whoever satisfies the script over the ghost keys.
    Script,
    /// A value sink with no keys. Counts toward amount conservation but can
    /// never be spent (fees, burns, withdrawals).
    Plain,
}

impl OutputType {
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::Script => 0x00,
            Self::Plain => 0x01,
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script => write!(f, "Script"),
            Self::Plain => write!(f, "Plain"),
        }
    }
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub output_type: OutputType,
    pub amount: Integer,
    /// Spending condition. Empty for plain outputs.
    pub script: Script,
    /// The sender's published `R = r*G`.
    pub mask: PublicKey,
    /// One ghost key per recipient, in recipient order.
    pub keys: Vec<PublicKey>,
}

/// An unspent output as the store sees it: where it came from, what it
/// holds, and which transaction (if any) has reserved it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Payload hash of the transaction that created this output.
    pub hash: Hash,
    pub index: u32,
    pub asset: AssetId,
    pub output: Output,
    /// Payload hash of the transaction currently holding the lock.
    pub lock: Option<Hash>,
}

impl Utxo {
    pub fn amount(&self) -> Integer {
        self.output.amount
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.output.keys
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
