//! Wallet backend seam
//!
//! The coordinator never holds keys, selects coins or talks to the network
//! itself. Everything that touches funds goes through [`WalletBackend`],
//! which a node integration implements. [`MemoryBackend`] is a complete
//! in-process implementation used for development and tests.

pub mod memory;

use crate::core::{Coin, Outpoint, Transaction, TransactionError, TxOptions};
use crate::crypto::KeyError;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub use memory::{MemoryBackend, DEFAULT_FEE_RATE};

/// Id of the node's own single-key wallet, never a shared wallet
pub const PRIMARY_WALLET: &str = "primary";

/// Backend failures
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
    #[error("Wallet already exists: {0}")]
    WalletExists(String),
    #[error("Wallet not ready: {0}")]
    NotReady(String),
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Unknown coin: {0}")]
    UnknownCoin(Outpoint),
    #[error("Unknown address: {0}")]
    UnknownAddress(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("Verification failed: {0}")]
    Verify(String),
    #[error("Broadcast failed: {0}")]
    Broadcast(String),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// Wallet balance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Sum of confirmed coins
    pub confirmed: u64,
    /// Sum of coins not spent by a broadcast transaction, confirmed or not
    pub unconfirmed: u64,
    /// Number of spendable coins
    pub coins: usize,
}

/// Freshly derived receive address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub name: String,
    pub account: u32,
    pub branch: u32,
    pub index: u32,
    pub address: String,
}

/// Backend view of a shared account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub name: String,
    pub watch_only: bool,
    pub initialized: bool,
    pub m: u8,
    pub n: u8,
    pub receive_depth: u32,
    pub change_depth: u32,
    pub receive_address: Option<String>,
    pub change_address: Option<String>,
    /// Registered account keys (hex), in cosigner order
    pub keys: Vec<String>,
}

/// Operations the coordinator consumes from the underlying wallet engine
///
/// Calls are synchronous and expected to be fast. The coordinator invokes
/// them while holding a wallet's serialization lock.
pub trait WalletBackend: Send + Sync {
    /// Create a watch-only m-of-n wallet, returning its wallet index
    fn create_wallet(&self, id: &str, m: u8, n: u8) -> Result<u32, BackendError>;

    /// Register the next cosigner's account key
    fn add_shared_key(&self, id: &str, key: &PublicKey) -> Result<(), BackendError>;

    /// Remove a wallet; `false` when unknown or not removable
    fn remove_wallet(&self, id: &str) -> Result<bool, BackendError>;

    /// All wallet ids, primary first, then in creation order
    fn wallet_ids(&self) -> Result<Vec<String>, BackendError>;

    fn account(&self, id: &str) -> Result<AccountInfo, BackendError>;

    fn balance(&self, id: &str) -> Result<Balance, BackendError>;

    fn coins(&self, id: &str) -> Result<Vec<Coin>, BackendError>;

    fn create_address(&self, id: &str) -> Result<AddressInfo, BackendError>;

    /// Select coins and build an unsigned transaction
    ///
    /// Automatic selection never picks a coin in `locked`.
    fn fund(
        &self,
        id: &str,
        options: &TxOptions,
        locked: &HashSet<Outpoint>,
    ) -> Result<Transaction, BackendError>;

    /// Verify and relay a fully signed transaction, returning its txid
    fn broadcast(&self, id: &str, tx: &Transaction) -> Result<String, BackendError>;

    fn rescan(&self, height: u64) -> Result<(), BackendError>;
}
