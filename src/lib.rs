//! Multisig Coordinator: m-of-n proposal coordination in Rust
//!
//! This crate coordinates spending from shared wallets:
//! - Cosigner registry with per-cosigner capability tokens
//! - Join flow gated by a shared join key
//! - Spend proposals with approve/reject voting and coin locking
//! - Signature verification and aggregation into a spendable transaction
//! - Admin and cosigner authentication
//! - Per-wallet event sessions over WebSocket
//! - JSON persistence of wallets and proposals
//!
//! # Example
//!
//! ```rust
//! use multisig_coordinator::backend::MemoryBackend;
//! use multisig_coordinator::events::EventBus;
//! use multisig_coordinator::multisig::{MultisigManager, Token};
//! use std::sync::Arc;
//!
//! let manager = MultisigManager::open(
//!     Arc::new(MemoryBackend::new()),
//!     None,
//!     Token::generate(),
//!     Arc::new(EventBus::default()),
//! )
//! .unwrap();
//! assert_eq!(manager.events().session_count(), 0);
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod core;
pub mod crypto;
pub mod events;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use backend::{MemoryBackend, WalletBackend};
pub use config::CoordinatorConfig;
pub use core::{Coin, Outpoint, Transaction, TxOptions};
pub use crypto::KeyPair;
pub use events::{EventBus, WalletEvent};
pub use multisig::{MultisigError, MultisigManager, MultisigWallet, Proposal, Token};
pub use storage::WalletStore;
