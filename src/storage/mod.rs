//! Storage module for wallet persistence

pub mod persistence;

pub use persistence::{StorageConfig, StorageError, WalletStore};
