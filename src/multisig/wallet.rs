//! Shared wallet record
//!
//! A [`MultisigWallet`] exclusively owns its cosigners and proposals. It is
//! the unit of persistence and of serialization inside the manager.

use crate::backend::PRIMARY_WALLET;
use crate::multisig::cosigner::{Cosigner, CosignerOptions};
use crate::multisig::error::MultisigError;
use crate::multisig::proposal::Proposal;
use crate::multisig::token::Token;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest supported cosigner count
pub const MAX_COSIGNERS: u8 = 15;

/// Longest accepted wallet id
pub const MAX_ID_LENGTH: usize = 40;

/// Options for creating a shared wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletOptions {
    /// Required approvals
    pub m: u8,
    /// Total cosigners
    pub n: u8,
    /// The creating cosigner, who receives id 0
    pub cosigner: CosignerOptions,
    /// Hex join key; generated when absent
    #[serde(default)]
    pub join_key: Option<String>,
}

impl WalletOptions {
    /// Validate the threshold pair
    pub fn validate(&self) -> Result<(), MultisigError> {
        if self.m == 0 || self.n == 0 {
            return Err(MultisigError::InvalidOptions(
                "m and n must be at least 1".to_string(),
            ));
        }

        if self.m > self.n {
            return Err(MultisigError::InvalidOptions(format!(
                "m ({}) can not exceed n ({})",
                self.m, self.n
            )));
        }

        if self.n > MAX_COSIGNERS {
            return Err(MultisigError::InvalidOptions(format!(
                "n can not exceed {}",
                MAX_COSIGNERS
            )));
        }

        Ok(())
    }

    /// Parse or generate the join key
    pub fn join_key(&self) -> Result<Token, MultisigError> {
        match &self.join_key {
            Some(hex) => Token::from_hex(hex).ok_or_else(|| {
                MultisigError::InvalidOptions("join key must be 32 bytes of hex".to_string())
            }),
            None => Ok(Token::generate()),
        }
    }
}

/// Check that `id` can name a shared wallet
pub fn validate_wallet_id(id: &str) -> Result<(), MultisigError> {
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        return Err(MultisigError::InvalidOptions(format!(
            "wallet id must be 1 to {} characters",
            MAX_ID_LENGTH
        )));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(MultisigError::InvalidOptions(format!(
            "invalid wallet id: {}",
            id
        )));
    }

    if id == PRIMARY_WALLET {
        return Err(MultisigError::WalletExists(id.to_string()));
    }

    Ok(())
}

/// An m-of-n shared wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultisigWallet {
    /// Backend wallet index
    pub wid: u32,
    pub id: String,
    pub m: u8,
    pub n: u8,
    /// Shared onboarding secret, retired once the wallet is full
    pub join_key: Option<Token>,
    /// Join key after retirement; only recognized, never admits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_join_key: Option<Token>,
    pub initialized: bool,
    pub cosigners: Vec<Cosigner>,
    /// Proposals indexed by id
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    pub created_at: DateTime<Utc>,
}

impl MultisigWallet {
    /// Create an empty wallet record
    pub fn new(wid: u32, id: impl Into<String>, m: u8, n: u8, join_key: Token) -> Self {
        Self {
            wid,
            id: id.into(),
            m,
            n,
            join_key: Some(join_key),
            retired_join_key: None,
            initialized: false,
            cosigners: Vec::new(),
            proposals: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create a wallet with its first cosigner
    pub fn create(
        wid: u32,
        id: &str,
        options: WalletOptions,
    ) -> Result<Self, MultisigError> {
        options.validate()?;
        validate_wallet_id(id)?;

        let join_key = options.join_key()?;
        let mut wallet = Self::new(wid, id, options.m, options.n, join_key);
        wallet.add_cosigner(options.cosigner)?;
        wallet.refresh_initialized();
        Ok(wallet)
    }

    /// Mark the wallet initialized once every cosigner has joined
    ///
    /// Returns `true` on the transition. The join key is retired with it.
    pub fn refresh_initialized(&mut self) -> bool {
        if self.initialized || self.cosigners.len() < self.n as usize {
            return false;
        }

        self.initialized = true;
        self.retired_join_key = self.join_key.take();
        true
    }

    pub fn is_full(&self) -> bool {
        self.cosigners.len() >= self.n as usize
    }

    pub fn proposal(&self, id: u32) -> Result<&Proposal, MultisigError> {
        self.proposals
            .get(id as usize)
            .ok_or(MultisigError::ProposalNotFound(id))
    }

    pub fn proposal_mut(&mut self, id: u32) -> Result<&mut Proposal, MultisigError> {
        self.proposals
            .get_mut(id as usize)
            .ok_or(MultisigError::ProposalNotFound(id))
    }

    /// Next proposal id
    pub fn next_proposal_id(&self) -> u32 {
        self.proposals.len() as u32
    }

    /// Proposals, optionally only those still collecting votes
    pub fn list_proposals(&self, pending_only: bool) -> impl Iterator<Item = &Proposal> {
        self.proposals
            .iter()
            .filter(move |p| !pending_only || p.is_pending())
    }

    /// Check the structural invariants of a stored record
    pub fn check(&self) -> Result<(), MultisigError> {
        if self.cosigners.len() > self.n as usize {
            return Err(MultisigError::InvalidOptions(format!(
                "wallet {} has more than {} cosigners",
                self.id, self.n
            )));
        }

        if self.initialized != self.is_full() {
            return Err(MultisigError::InvalidOptions(format!(
                "wallet {} initialization flag is inconsistent",
                self.id
            )));
        }

        for (index, cosigner) in self.cosigners.iter().enumerate() {
            if cosigner.id as usize != index {
                return Err(MultisigError::InvalidOptions(format!(
                    "wallet {} cosigner ids are not dense",
                    self.id
                )));
            }
        }

        Ok(())
    }
}
