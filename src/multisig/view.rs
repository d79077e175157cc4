//! Response and event payloads
//!
//! Public views never carry secrets. The creator and joiner views add that
//! one cosigner's token and, for an uninitialized wallet, the join key.

use crate::backend::AccountInfo;
use crate::core::Transaction;
use crate::multisig::cosigner::Cosigner;
use crate::multisig::proposal::{Proposal, ProposalStatus};
use crate::multisig::signature::InputScript;
use crate::multisig::wallet::MultisigWallet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public cosigner view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignerView {
    pub id: u8,
    pub name: String,
}

impl From<&Cosigner> for CosignerView {
    fn from(cosigner: &Cosigner) -> Self {
        Self {
            id: cosigner.id,
            name: cosigner.name.clone(),
        }
    }
}

/// A cosigner's own view, including their token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosignerDetails {
    pub id: u8,
    pub name: String,
    pub path: String,
    pub key: String,
    pub token: String,
    pub token_depth: u32,
}

impl From<&Cosigner> for CosignerDetails {
    fn from(cosigner: &Cosigner) -> Self {
        Self {
            id: cosigner.id,
            name: cosigner.name.clone(),
            path: cosigner.path.clone(),
            key: cosigner.key.clone(),
            token: cosigner.token.to_hex(),
            token_depth: cosigner.token_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CosignerEntry {
    Details(CosignerDetails),
    Public(CosignerView),
}

/// Wallet view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletView {
    pub wid: u32,
    pub id: String,
    pub m: u8,
    pub n: u8,
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub join_key: Option<String>,
    pub cosigners: Vec<CosignerEntry>,
}

impl WalletView {
    /// View shared with every authorized caller
    pub fn public(wallet: &MultisigWallet) -> Self {
        Self {
            wid: wallet.wid,
            id: wallet.id.clone(),
            m: wallet.m,
            n: wallet.n,
            initialized: wallet.initialized,
            join_key: None,
            cosigners: wallet
                .cosigners
                .iter()
                .map(|c| CosignerEntry::Public(c.into()))
                .collect(),
        }
    }

    /// View returned to the cosigner who just created or joined the wallet
    pub fn for_cosigner(wallet: &MultisigWallet, cosigner_id: u8) -> Self {
        let mut view = Self::public(wallet);
        view.join_key = wallet.join_key.map(|key| key.to_hex());

        if let Some(cosigner) = wallet.cosigner(cosigner_id) {
            view.cosigners[cosigner_id as usize] = CosignerEntry::Details(cosigner.into());
        }
        view
    }
}

/// Wallet view with backend account details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDetailsView {
    #[serde(flatten)]
    pub wallet: WalletView,
    pub account: AccountInfo,
}

/// Either wallet view, as returned by `get_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WalletInfo {
    Details(WalletDetailsView),
    Public(WalletView),
}

/// Proposal view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalView {
    pub id: u32,
    pub memo: String,
    pub author: u8,
    pub author_details: Option<CosignerView>,
    pub status: ProposalStatus,
    pub m: u8,
    pub n: u8,
    pub approvals: Vec<u8>,
    pub rejections: Vec<u8>,
    pub cosigner_approvals: Vec<CosignerView>,
    pub cosigner_rejections: Vec<CosignerView>,
    /// Candidate transaction, raw hex
    pub tx: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub txid: Option<String>,
}

impl ProposalView {
    pub fn new(proposal: &Proposal, wallet: &MultisigWallet) -> Self {
        let cosigners = |ids: &std::collections::BTreeSet<u8>| -> Vec<CosignerView> {
            ids.iter()
                .filter_map(|id| wallet.cosigner(*id))
                .map(CosignerView::from)
                .collect()
        };

        Self {
            id: proposal.id,
            memo: proposal.memo.clone(),
            author: proposal.author,
            author_details: wallet.cosigner(proposal.author).map(CosignerView::from),
            status: proposal.status,
            m: proposal.m,
            n: proposal.n,
            approvals: proposal.approvals.iter().copied().collect(),
            rejections: proposal.rejections.iter().copied().collect(),
            cosigner_approvals: cosigners(&proposal.approvals),
            cosigner_rejections: cosigners(&proposal.rejections),
            tx: proposal.tx.to_raw_hex(),
            created_at: proposal.created_at,
            closed_at: proposal.closed_at,
            txid: proposal.txid.clone(),
        }
    }
}

/// Key path of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPath {
    pub branch: u32,
    pub index: u32,
    pub receive: bool,
}

/// Proposal transaction with optional signing aids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalTxView {
    pub tx: Transaction,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub paths: Option<Vec<InputPath>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scripts: Option<Vec<InputScript>>,
}

/// Result of a vote, also the payload of vote events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteView {
    pub proposal: ProposalView,
    pub cosigner: CosignerView,
}

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendView {
    pub txid: String,
    /// Finalized transaction, raw hex
    pub tx: String,
}
