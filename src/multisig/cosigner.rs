//! Cosigner registry
//!
//! Cosigners are appended in join order and receive dense ids `0..n`. They
//! are never removed on their own, only together with their wallet.

use crate::crypto::public_key_from_hex;
use crate::multisig::error::MultisigError;
use crate::multisig::token::Token;
use crate::multisig::wallet::MultisigWallet;
use chrono::{DateTime, Utc};
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// Longest accepted cosigner name
pub const MAX_NAME_LENGTH: usize = 100;

/// A participant of a shared wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cosigner {
    /// Position in join order
    pub id: u8,
    pub name: String,
    /// Client-side derivation path of the account key
    #[serde(default)]
    pub path: String,
    /// Hex-encoded account public key
    pub key: String,
    pub token: Token,
    /// Number of token rotations
    #[serde(default)]
    pub token_depth: u32,
    pub joined_at: DateTime<Utc>,
}

impl Cosigner {
    /// Parsed account public key
    pub fn public_key(&self) -> Result<PublicKey, MultisigError> {
        public_key_from_hex(&self.key)
            .map_err(|_| MultisigError::InvalidOptions(format!("cosigner {} key", self.id)))
    }
}

/// Cosigner details supplied on wallet creation and join
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CosignerOptions {
    pub name: String,
    #[serde(default)]
    pub path: String,
    /// Hex-encoded account public key
    pub key: String,
    /// Hex token; a random one is generated when absent
    #[serde(default)]
    pub token: Option<String>,
}

impl MultisigWallet {
    /// Append a cosigner with the next free id
    pub fn add_cosigner(&mut self, options: CosignerOptions) -> Result<&Cosigner, MultisigError> {
        if self.cosigners.len() >= self.n as usize {
            return Err(MultisigError::WalletFull);
        }

        let name = options.name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(MultisigError::InvalidOptions(
                "cosigner name is required".to_string(),
            ));
        }

        let key = public_key_from_hex(&options.key)
            .map_err(|_| MultisigError::InvalidOptions("invalid account key".to_string()))?;
        let key = hex::encode(key.serialize());
        if self.cosigners.iter().any(|c| c.key == key) {
            return Err(MultisigError::InvalidOptions(
                "account key already registered".to_string(),
            ));
        }

        let token = match options.token {
            Some(hex) => {
                let token = Token::from_hex(&hex).ok_or_else(|| {
                    MultisigError::InvalidOptions("token must be 32 bytes of hex".to_string())
                })?;
                if self.token_in_use(&token) {
                    return Err(MultisigError::InvalidOptions(
                        "token already in use".to_string(),
                    ));
                }
                token
            }
            None => self.unused_token(),
        };

        let id = self.cosigners.len() as u8;
        self.cosigners.push(Cosigner {
            id,
            name: name.to_string(),
            path: options.path,
            key,
            token,
            token_depth: 0,
            joined_at: Utc::now(),
        });

        Ok(&self.cosigners[id as usize])
    }

    /// Replace a cosigner's token, invalidating the old one
    pub fn rotate_token(
        &mut self,
        cosigner_id: u8,
        token: Option<Token>,
    ) -> Result<&Cosigner, MultisigError> {
        let token = match token {
            Some(token) if self.token_in_use(&token) => {
                return Err(MultisigError::InvalidOptions(
                    "token already in use".to_string(),
                ))
            }
            Some(token) => token,
            None => self.unused_token(),
        };

        let cosigner = self
            .cosigners
            .get_mut(cosigner_id as usize)
            .ok_or(MultisigError::AuthenticationError)?;

        cosigner.token = token;
        cosigner.token_depth += 1;
        Ok(cosigner)
    }

    /// Cosigner holding `token`, if any
    pub fn cosigner_by_token(&self, token: &Token) -> Option<&Cosigner> {
        self.cosigners.iter().find(|c| &c.token == token)
    }

    pub fn cosigner(&self, id: u8) -> Option<&Cosigner> {
        self.cosigners.get(id as usize)
    }

    fn token_in_use(&self, token: &Token) -> bool {
        self.cosigner_by_token(token).is_some()
    }

    fn unused_token(&self) -> Token {
        loop {
            let token = Token::generate();
            if !self.token_in_use(&token) {
                return token;
            }
        }
    }
}
