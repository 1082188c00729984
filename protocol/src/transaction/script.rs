//! # Output Scripts
//!
//! A script is a tiny byte program: a run of operator bytes followed by a
//! single threshold byte.
//!
//! ```text
//! [ 0xff (Cmp) | 0xfe (Sum) | threshold ]
//! ```
//!
//! - **Cmp** requires every supplied signature to verify against the ghost
//!   key at its declared position. One bad signature and the whole input is
//!   rejected; there is no "best effort" here.
//! - **Sum** weighs the supplied signatures, one unit per distinct key.
//!
//! The input is spendable when the weight reaches the threshold. So
//! `[Cmp, Sum, 2]` over three keys is a plain 2-of-3 multisig.
//!
//! The interpreter fails closed: an unknown operator, a repeated operator,
//! a missing operator or a zero threshold is [`ScriptError::Malformed`] or
//! [`ScriptError::UnknownOperator`], never "anyone can spend".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::crypto::{PublicKey, Signature};

/// Every supplied signature must verify against its indexed key.
pub const OPERATOR_CMP: u8 = 0xff;
/// Weight is the number of supplied signatures.
pub const OPERATOR_SUM: u8 = 0xfe;

/// Errors from script validation or evaluation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("malformed script: {0}")]
    Malformed(String),

    #[error("unknown script operator 0x{0:02x}")]
    UnknownOperator(u8),

    #[error("signature for key {index} does not verify")]
    SignatureMismatch { index: u16 },

    #[error("script unsatisfied: weight {weight} below threshold {threshold}")]
    Unsatisfied { weight: usize, threshold: u8 },
}

/// A spending condition attached to an output.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    /// The canonical `threshold`-of-n script.
    pub fn new_threshold(threshold: u8) -> Self {
        Self(vec![OPERATOR_CMP, OPERATOR_SUM, threshold])
    }

    /// Wrap raw bytes without checking them. Use
    /// [`verify_format`](Self::verify_format) before trusting the result.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The script plain outputs carry.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The threshold byte, if the script is non-empty.
    pub fn threshold(&self) -> Option<u8> {
        self.0.last().copied()
    }

    /// Check the shape: known operators, each exactly once in canonical
    /// order, and a non-zero threshold.
    pub fn verify_format(&self) -> Result<(), ScriptError> {
        let Some((&threshold, operators)) = self.0.split_last() else {
            return Err(ScriptError::Malformed("empty script".into()));
        };
        if let Some(&op) = operators
            .iter()
            .find(|op| !matches!(**op, OPERATOR_CMP | OPERATOR_SUM))
        {
            return Err(ScriptError::UnknownOperator(op));
        }
        if operators != [OPERATOR_CMP, OPERATOR_SUM] {
            return Err(ScriptError::Malformed(format!(
                "expected [cmp, sum], got {}",
                hex::encode(operators)
            )));
        }
        if threshold == 0 {
            return Err(ScriptError::Malformed("zero threshold".into()));
        }
        Ok(())
    }

    /// Check a signer count against the threshold without looking at the
    /// signatures themselves. Used by the signer to decide whether it has
    /// collected enough keys.
    pub fn validate(&self, signers: usize) -> Result<(), ScriptError> {
        self.verify_format()?;
        let threshold = self.threshold().unwrap_or(0);
        if signers < threshold as usize {
            return Err(ScriptError::Unsatisfied {
                weight: signers,
                threshold,
            });
        }
        Ok(())
    }

    /// Run the script against `signatures` (key position to signature) over
    /// `keys`, for `message`. Returns the accumulated weight on success.
    pub fn evaluate(
        &self,
        message: &[u8],
        keys: &[PublicKey],
        signatures: &BTreeMap<u16, Signature>,
    ) -> Result<usize, ScriptError> {
        self.verify_format()?;
        let Some((&threshold, operators)) = self.0.split_last() else {
            return Err(ScriptError::Malformed("empty script".into()));
        };

        let mut weight = 0usize;
        for &op in operators {
            match op {
                OPERATOR_CMP => {
                    for (&index, signature) in signatures {
                        let verified = keys
                            .get(index as usize)
                            .is_some_and(|key| key.verify(message, signature));
                        if !verified {
                            return Err(ScriptError::SignatureMismatch { index });
                        }
                    }
                }
                OPERATOR_SUM => weight += signatures.len(),
                other => return Err(ScriptError::UnknownOperator(other)),
            }
        }

        if weight < threshold as usize {
            return Err(ScriptError::Unsatisfied { weight, threshold });
        }
        Ok(weight)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self)
    }
}
