//! Multi-signature proposal coordination
//!
//! Cosigners of an m-of-n wallet join with a shared join key, then propose
//! spends that the others approve (with signatures) or reject. Coins held by
//! a live proposal can not be used by another one.
//!
//! # Example
//!
//! ```ignore
//! use multisig_coordinator::multisig::{MultisigManager, WalletOptions};
//!
//! // Cosigner A creates a 2-of-2 wallet and shares the join key
//! let created = manager.create_wallet("team", options).await?;
//!
//! // Cosigner B joins, which initializes the wallet
//! let joined = manager.join("team", &join_key, b_options).await?;
//!
//! // B proposes, A and B approve with their signatures, anyone sends
//! let proposal = manager.create_proposal("team", Some(&b_token), "rent", &tx_options).await?;
//! manager.approve("team", Some(&a_token), proposal.id, &a_signatures).await?;
//! manager.approve("team", Some(&b_token), proposal.id, &b_signatures).await?;
//! manager.send("team", Some(&a_token), proposal.id).await?;
//! ```

pub mod auth;
pub mod cosigner;
pub mod error;
pub mod join;
pub mod lock;
pub mod manager;
pub mod proposal;
pub mod signature;
pub mod token;
pub mod view;
pub mod wallet;

pub use auth::{AuthGate, Scope};
pub use cosigner::{Cosigner, CosignerOptions};
pub use error::MultisigError;
pub use lock::CoinLocks;
pub use manager::MultisigManager;
pub use proposal::{Proposal, ProposalStatus};
pub use signature::{sign_inputs, InputScript, SignatureAggregator};
pub use token::Token;
pub use view::{
    CosignerDetails, CosignerEntry, CosignerView, InputPath, ProposalTxView, ProposalView,
    SendView, VoteView, WalletDetailsView, WalletInfo, WalletView,
};
pub use wallet::{MultisigWallet, WalletOptions};
