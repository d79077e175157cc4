//! Wallet persistence layer
//!
//! Each shared wallet is stored as one JSON document under
//! `<data_dir>/wallets/<id>.json`, written atomically through a temp file.

use crate::multisig::MultisigWallet;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Keep the previous version of a wallet file as `<id>.json.bak`
    pub backup_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".coordinator_data"),
            backup_enabled: true,
        }
    }
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }
}

/// File-backed wallet store
#[derive(Debug)]
pub struct WalletStore {
    config: StorageConfig,
}

impl WalletStore {
    /// Open the store, creating its directory
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(config.data_dir.join("wallets"))?;
        Ok(Self { config })
    }

    fn wallets_dir(&self) -> PathBuf {
        self.config.data_dir.join("wallets")
    }

    fn wallet_path(&self, id: &str) -> PathBuf {
        self.wallets_dir().join(format!("{}.json", id))
    }

    /// Write a wallet record
    pub fn save(&self, wallet: &MultisigWallet) -> Result<(), StorageError> {
        let path = self.wallet_path(&wallet.id);

        if self.config.backup_enabled && path.exists() {
            fs::copy(&path, path.with_extension("json.bak"))?;
        }

        // Write to temporary file first
        let temp_path = self.wallets_dir().join(format!("{}.tmp", wallet.id));
        let file = fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, wallet)?;
        writer.flush()?;

        // Atomic rename
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    /// Delete a wallet record and its backup
    pub fn remove(&self, id: &str) -> Result<(), StorageError> {
        let path = self.wallet_path(id);
        if path.exists() {
            fs::remove_file(&path)?;
        }

        let backup = path.with_extension("json.bak");
        if backup.exists() {
            fs::remove_file(backup)?;
        }

        Ok(())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.wallet_path(id).exists()
    }

    /// Load every stored wallet, ordered by wallet index
    pub fn load_all(&self) -> Result<Vec<MultisigWallet>, StorageError> {
        let mut wallets = Vec::new();

        for entry in fs::read_dir(self.wallets_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let file = fs::File::open(&path)?;
            let wallet: MultisigWallet = serde_json::from_reader(BufReader::new(file))?;

            if wallet.check().is_err() {
                return Err(StorageError::InvalidData(format!(
                    "inconsistent wallet record {}",
                    path.display()
                )));
            }

            wallets.push(wallet);
        }

        wallets.sort_by_key(|w| w.wid);
        Ok(wallets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::multisig::{CosignerOptions, WalletOptions};
    use tempfile::tempdir;

    fn wallet(wid: u32, id: &str) -> MultisigWallet {
        MultisigWallet::create(
            wid,
            id,
            WalletOptions {
                m: 1,
                n: 2,
                cosigner: CosignerOptions {
                    name: "cosigner1".to_string(),
                    key: KeyPair::generate().public_key_hex(),
                    ..Default::default()
                },
                join_key: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = WalletStore::new(StorageConfig::new(dir.path())).unwrap();

        store.save(&wallet(2, "second")).unwrap();
        store.save(&wallet(1, "first")).unwrap();

        let loaded = store.load_all().unwrap();
        let ids: Vec<&str> = loaded.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert!(store.exists("first"));
    }

    #[test]
    fn test_overwrite_keeps_backup() {
        let dir = tempdir().unwrap();
        let store = WalletStore::new(StorageConfig::new(dir.path())).unwrap();

        let mut w = wallet(1, "test");
        store.save(&w).unwrap();
        w.cosigners[0].name = "renamed".to_string();
        store.save(&w).unwrap();

        assert!(dir.path().join("wallets/test.json.bak").exists());
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].cosigners[0].name, "renamed");
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let store = WalletStore::new(StorageConfig::new(dir.path())).unwrap();

        let w = wallet(1, "test");
        store.save(&w).unwrap();
        store.save(&w).unwrap();
        store.remove("test").unwrap();
        store.remove("missing").unwrap();

        assert!(!store.exists("test"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_corrupt_records() {
        let dir = tempdir().unwrap();
        let store = WalletStore::new(StorageConfig::new(dir.path())).unwrap();

        fs::write(dir.path().join("wallets/bad.json"), "{ not json").unwrap();
        assert!(matches!(
            store.load_all(),
            Err(StorageError::SerializationError(_))
        ));
    }
}
