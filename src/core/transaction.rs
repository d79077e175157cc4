//! Transaction model for shared wallets
//!
//! Implements a UTXO-based transaction whose inputs each carry an m-of-n
//! witness: one signature slot per cosigner, filled as approvals arrive.

use crate::crypto::{double_sha256, sha256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Current transaction version
pub const TX_VERSION: u32 = 2;

/// Outputs at or below this value are folded into the fee
pub const DUST_THRESHOLD: u64 = 546;

/// Largest amount any single value or sum may reach (21M coins)
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Highest accepted fee rate per 1000 bytes
pub const MAX_FEE_RATE: u64 = 10_000_000;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Input index {0} out of range")]
    InputOutOfRange(usize),
    #[error("Invalid outpoint: {0}")]
    InvalidOutpoint(String),
}

// =============================================================================
// Outpoint / Key path / Coin
// =============================================================================

/// Reference to a transaction output, the identity of a coin
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    pub tx_id: String,
    pub index: u32,
}

impl Outpoint {
    pub fn new(tx_id: impl Into<String>, index: u32) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
        }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.index)
    }
}

impl FromStr for Outpoint {
    type Err = TransactionError;

    /// Parse the `txid:index` form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx_id, index) = s
            .rsplit_once(':')
            .ok_or_else(|| TransactionError::InvalidOutpoint(s.to_string()))?;

        if tx_id.is_empty() {
            return Err(TransactionError::InvalidOutpoint(s.to_string()));
        }

        let index = index
            .parse()
            .map_err(|_| TransactionError::InvalidOutpoint(s.to_string()))?;

        Ok(Self::new(tx_id, index))
    }
}

/// Derivation path of a shared address below the cosigners' account keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPath {
    pub branch: u32,
    pub index: u32,
}

impl KeyPath {
    pub const RECEIVE: u32 = 0;
    pub const CHANGE: u32 = 1;

    pub fn receive(index: u32) -> Self {
        Self {
            branch: Self::RECEIVE,
            index,
        }
    }

    pub fn change(index: u32) -> Self {
        Self {
            branch: Self::CHANGE,
            index,
        }
    }

    pub fn is_receive(&self) -> bool {
        self.branch == Self::RECEIVE
    }
}

/// Spendable output owned by a shared wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub outpoint: Outpoint,
    pub value: u64,
    pub address: String,
    pub path: KeyPath,
    /// Confirmation height, `None` while unconfirmed
    pub height: Option<u64>,
}

// =============================================================================
// Inputs / Outputs
// =============================================================================

/// Transaction input spending a shared coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    pub prevout: Outpoint,
    /// Value of the spent coin (committed to by the signature hash)
    pub value: u64,
    /// Path of the address that owns the spent coin
    pub path: KeyPath,
    /// Hex compact signatures, one slot per cosigner id
    pub signatures: Vec<Option<String>>,
}

impl TxInput {
    /// Create an unsigned input with `n` empty signature slots
    pub fn unsigned(coin: &Coin, n: u8) -> Self {
        Self {
            prevout: coin.outpoint.clone(),
            value: coin.value,
            path: coin.path,
            signatures: vec![None; n as usize],
        }
    }

    /// Number of filled signature slots
    pub fn signature_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub value: u64,
}

// =============================================================================
// Transaction
// =============================================================================

/// A spend from a shared wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub locktime: u32,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            locktime: 0,
        }
    }

    /// Deterministic byte encoding, optionally including witness data
    pub fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.version.to_le_bytes());

        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            write_bytes(&mut buf, input.prevout.tx_id.as_bytes());
            buf.extend_from_slice(&input.prevout.index.to_le_bytes());
            buf.extend_from_slice(&input.value.to_le_bytes());
            buf.extend_from_slice(&input.path.branch.to_le_bytes());
            buf.extend_from_slice(&input.path.index.to_le_bytes());
        }

        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_bytes(&mut buf, output.address.as_bytes());
        }

        buf.extend_from_slice(&self.locktime.to_le_bytes());

        if with_witness {
            for input in &self.inputs {
                buf.push(input.signatures.len() as u8);
                for slot in &input.signatures {
                    match slot {
                        Some(sig) => {
                            buf.push(1);
                            write_bytes(&mut buf, sig.as_bytes());
                        }
                        None => buf.push(0),
                    }
                }
            }
        }

        buf
    }

    /// Transaction id: double SHA-256 of the encoding without witness data
    ///
    /// Stable while signatures are being collected.
    pub fn txid(&self) -> String {
        hex::encode(double_sha256(&self.encode(false)))
    }

    /// Hex encoding of the full transaction, witness included
    pub fn to_raw_hex(&self) -> String {
        hex::encode(self.encode(true))
    }

    /// Signature hash for one input
    ///
    /// Commits to every input and output, the input index and the spent value.
    pub fn sighash(&self, input_index: usize) -> Result<Vec<u8>, TransactionError> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or(TransactionError::InputOutOfRange(input_index))?;

        let mut data = self.encode(false);
        data.extend_from_slice(&(input_index as u32).to_le_bytes());
        data.extend_from_slice(&input.value.to_le_bytes());
        Ok(sha256(&data))
    }

    /// Coins spent by this transaction
    pub fn prevouts(&self) -> Vec<Outpoint> {
        self.inputs.iter().map(|i| i.prevout.clone()).collect()
    }

    /// Total value of spent coins, `None` on overflow
    pub fn input_value(&self) -> Option<u64> {
        checked_sum(self.inputs.iter().map(|i| i.value))
    }

    /// Total value of outputs, `None` on overflow
    pub fn output_value(&self) -> Option<u64> {
        checked_sum(self.outputs.iter().map(|o| o.value))
    }

    /// Implied fee, `None` when outputs exceed inputs
    pub fn fee(&self) -> Option<u64> {
        self.input_value()?.checked_sub(self.output_value()?)
    }

    /// Check that every input carries at least `m` signatures
    pub fn is_fully_signed(&self, m: u8) -> bool {
        !self.inputs.is_empty()
            && self
                .inputs
                .iter()
                .all(|input| input.signature_count() >= m as usize)
    }
}

/// Sum of amounts, `None` on overflow
pub fn checked_sum(values: impl IntoIterator<Item = u64>) -> Option<u64> {
    values
        .into_iter()
        .try_fold(0u64, |total, value| total.checked_add(value))
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

// =============================================================================
// Funding options
// =============================================================================

/// Requested payment output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub address: String,
    pub value: u64,
}

/// Options handed to the wallet backend for coin selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxOptions {
    pub outputs: Vec<OutputSpec>,
    /// Deduct the fee from the first output instead of adding inputs
    #[serde(default)]
    pub subtract_fee: bool,
    /// Fee rate per 1000 bytes, backend default when absent
    #[serde(default)]
    pub rate: Option<u64>,
    /// Spend exactly these coins instead of selecting automatically
    #[serde(default)]
    pub inputs: Option<Vec<Outpoint>>,
}

impl TxOptions {
    /// Total requested payment value, `None` on overflow
    pub fn total(&self) -> Option<u64> {
        checked_sum(self.outputs.iter().map(|o| o.value))
    }

    /// Validate option shape before touching any coins
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.outputs.is_empty() {
            return Err(TransactionError::InvalidTransaction(
                "at least one output is required".to_string(),
            ));
        }

        for output in &self.outputs {
            if output.address.is_empty() {
                return Err(TransactionError::InvalidTransaction(
                    "output address is empty".to_string(),
                ));
            }
            if output.value <= DUST_THRESHOLD {
                return Err(TransactionError::InvalidTransaction(format!(
                    "output value {} is dust",
                    output.value
                )));
            }
            if output.value > MAX_MONEY {
                return Err(TransactionError::InvalidTransaction(format!(
                    "output value {} is out of range",
                    output.value
                )));
            }
        }

        match self.total() {
            Some(total) if total <= MAX_MONEY => {}
            _ => {
                return Err(TransactionError::InvalidTransaction(
                    "output total is out of range".to_string(),
                ))
            }
        }

        if let Some(rate) = self.rate {
            if rate > MAX_FEE_RATE {
                return Err(TransactionError::InvalidTransaction(format!(
                    "fee rate {} is above {}",
                    rate, MAX_FEE_RATE
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_coin(index: u32, value: u64) -> Coin {
        Coin {
            outpoint: Outpoint::new("aa".repeat(32), index),
            value,
            address: "3shared".to_string(),
            path: KeyPath::receive(index),
            height: Some(1),
        }
    }

    fn sample_tx() -> Transaction {
        Transaction::new(
            vec![
                TxInput::unsigned(&sample_coin(0, 60_000), 3),
                TxInput::unsigned(&sample_coin(1, 50_000), 3),
            ],
            vec![TxOutput {
                address: "1recipient".to_string(),
                value: 100_000,
            }],
        )
    }

    #[test]
    fn test_outpoint_parse() {
        let outpoint: Outpoint = "abcd:3".parse().unwrap();
        assert_eq!(outpoint, Outpoint::new("abcd", 3));
        assert_eq!(outpoint.to_string(), "abcd:3");

        assert!("abcd".parse::<Outpoint>().is_err());
        assert!(":1".parse::<Outpoint>().is_err());
        assert!("abcd:x".parse::<Outpoint>().is_err());
    }

    #[test]
    fn test_txid_ignores_signatures() {
        let mut tx = sample_tx();
        let txid = tx.txid();
        let raw = tx.to_raw_hex();

        tx.inputs[0].signatures[1] = Some("deadbeef".to_string());

        assert_eq!(tx.txid(), txid);
        assert_ne!(tx.to_raw_hex(), raw);
    }

    #[test]
    fn test_sighash_differs_per_input() {
        let tx = sample_tx();
        let first = tx.sighash(0).unwrap();
        let second = tx.sighash(1).unwrap();

        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
        assert!(matches!(
            tx.sighash(2),
            Err(TransactionError::InputOutOfRange(2))
        ));
    }

    #[test]
    fn test_values_and_signing_progress() {
        let mut tx = sample_tx();
        assert_eq!(tx.input_value(), Some(110_000));
        assert_eq!(tx.output_value(), Some(100_000));
        assert_eq!(tx.fee(), Some(10_000));
        assert!(!tx.is_fully_signed(2));

        for input in &mut tx.inputs {
            input.signatures[0] = Some("aa".to_string());
            input.signatures[2] = Some("bb".to_string());
        }
        assert!(tx.is_fully_signed(2));
        assert!(!tx.is_fully_signed(3));
    }

    #[test]
    fn test_options_validation() {
        let mut options = TxOptions::default();
        assert!(options.validate().is_err());

        options.outputs.push(OutputSpec {
            address: "1recipient".to_string(),
            value: 100,
        });
        assert!(options.validate().is_err());

        options.outputs[0].value = 10_000;
        assert!(options.validate().is_ok());
        assert_eq!(options.total(), Some(10_000));
    }

    #[test]
    fn test_options_reject_out_of_range_amounts() {
        let mut options = TxOptions {
            outputs: vec![
                OutputSpec {
                    address: "1recipient".to_string(),
                    value: u64::MAX,
                },
                OutputSpec {
                    address: "1other".to_string(),
                    value: 10_000,
                },
            ],
            ..Default::default()
        };
        assert_eq!(options.total(), None);
        assert!(options.validate().is_err());

        // Each value in range, sum above the money supply
        options.outputs[0].value = MAX_MONEY;
        assert!(options.validate().is_err());

        options.outputs[0].value = 10_000;
        assert!(options.validate().is_ok());

        options.rate = Some(u64::MAX);
        assert!(options.validate().is_err());
        options.rate = Some(MAX_FEE_RATE);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_values_overflow() {
        let mut tx = sample_tx();
        tx.outputs.push(TxOutput {
            address: "1other".to_string(),
            value: u64::MAX,
        });
        assert_eq!(tx.output_value(), None);
        assert_eq!(tx.fee(), None);

        tx.outputs.pop();
        tx.outputs[0].value = 200_000;
        assert_eq!(tx.fee(), None);
    }
}
