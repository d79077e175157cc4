//! Coordinator error taxonomy

use crate::backend::BackendError;
use crate::core::Outpoint;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by coordinator operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Authentication error.")]
    AuthenticationError,
    #[error("Bad token.")]
    BadToken,
    #[error("Wallet is full")]
    WalletFull,
    #[error("Cosigner {0} already voted")]
    DuplicateVote(u8),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Coins are locked: {}", format_outpoints(.0))]
    CoinsLocked(Vec<Outpoint>),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Wallet can not be removed: {0}")]
    NotRemovable(String),
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
    #[error("Proposal not found: {0}")]
    ProposalNotFound(u32),
    #[error("Wallet already exists: {0}")]
    WalletExists(String),
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error("Backend error: {0}")]
    Backend(BackendError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<BackendError> for MultisigError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::InsufficientFunds { have, need } => {
                MultisigError::InsufficientFunds(format!("have {}, need {}", have, need))
            }
            BackendError::InvalidOptions(msg) => MultisigError::InvalidOptions(msg),
            BackendError::WalletExists(id) => MultisigError::WalletExists(id),
            other => MultisigError::Backend(other),
        }
    }
}

fn format_outpoints(outpoints: &[Outpoint]) -> String {
    outpoints
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
