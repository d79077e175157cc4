//! Core transaction components
//!
//! This module contains the UTXO model shared by the coordinator and
//! the wallet backend:
//! - Outpoints, coins and key paths
//! - Transactions with per-cosigner signature slots
//! - Funding options for coin selection

pub mod transaction;

pub use transaction::{
    checked_sum, Coin, KeyPath, Outpoint, OutputSpec, Transaction, TransactionError, TxInput,
    TxOptions, TxOutput, DUST_THRESHOLD, MAX_FEE_RATE, MAX_MONEY, TX_VERSION,
};
