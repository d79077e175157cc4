//! Spend proposals and their voting state machine
//!
//! ```text
//! PROGRESS ──approve (|approvals| >= m)──▶ APPROVED
//!     │
//!     └──reject (n - |rejections| < m)──▶ REJECTED
//! ```
//!
//! Both end states are terminal.

use crate::core::{Outpoint, Transaction};
use crate::multisig::error::MultisigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Longest accepted memo
pub const MAX_MEMO_LENGTH: usize = 1000;

/// Proposal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    /// Collecting votes
    Progress,
    /// Threshold reached
    Approved,
    /// Threshold can no longer be reached
    Rejected,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Progress)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalStatus::Progress => "PROGRESS",
            ProposalStatus::Approved => "APPROVED",
            ProposalStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// A candidate spend awaiting threshold approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u32,
    pub memo: String,
    /// Authoring cosigner id
    pub author: u8,
    pub status: ProposalStatus,
    /// Threshold snapshot at creation
    pub m: u8,
    pub n: u8,
    pub approvals: BTreeSet<u8>,
    pub rejections: BTreeSet<u8>,
    /// Coins reserved by this proposal
    pub coins: Vec<Outpoint>,
    /// Candidate transaction with merged signatures
    pub tx: Transaction,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Broadcast transaction id, set by a successful send
    #[serde(default)]
    pub txid: Option<String>,
}

impl Proposal {
    /// Create a proposal in `PROGRESS`
    pub fn new(id: u32, memo: String, author: u8, m: u8, n: u8, tx: Transaction) -> Self {
        Self {
            id,
            memo,
            author,
            status: ProposalStatus::Progress,
            m,
            n,
            approvals: BTreeSet::new(),
            rejections: BTreeSet::new(),
            coins: tx.prevouts(),
            tx,
            created_at: Utc::now(),
            closed_at: None,
            txid: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Progress
    }

    /// Still holding its coins: collecting votes, or approved and not yet sent
    pub fn is_live(&self) -> bool {
        match self.status {
            ProposalStatus::Progress => true,
            ProposalStatus::Approved => self.txid.is_none(),
            ProposalStatus::Rejected => false,
        }
    }

    /// Guards shared by approve and reject
    pub fn ensure_votable(&self, cosigner_id: u8) -> Result<(), MultisigError> {
        if self.status.is_terminal() {
            return Err(MultisigError::InvalidState(format!(
                "proposal {} is {}",
                self.id, self.status
            )));
        }

        if self.approvals.contains(&cosigner_id) || self.rejections.contains(&cosigner_id) {
            return Err(MultisigError::DuplicateVote(cosigner_id));
        }

        Ok(())
    }

    /// Record an approval whose signatures were already merged
    ///
    /// Returns `true` when the proposal became `APPROVED`.
    pub fn record_approval(&mut self, cosigner_id: u8) -> Result<bool, MultisigError> {
        self.ensure_votable(cosigner_id)?;
        self.approvals.insert(cosigner_id);

        if self.approvals.len() >= self.m as usize {
            self.close(ProposalStatus::Approved);
            return Ok(true);
        }

        Ok(false)
    }

    /// Record a rejection
    ///
    /// Returns `true` when the proposal became `REJECTED`.
    pub fn record_rejection(&mut self, cosigner_id: u8) -> Result<bool, MultisigError> {
        self.ensure_votable(cosigner_id)?;
        self.rejections.insert(cosigner_id);

        let remaining = self.n as usize - self.rejections.len();
        if remaining < self.m as usize {
            self.close(ProposalStatus::Rejected);
            return Ok(true);
        }

        Ok(false)
    }

    /// Check the proposal can be broadcast
    pub fn ensure_sendable(&self) -> Result<(), MultisigError> {
        if self.status != ProposalStatus::Approved {
            return Err(MultisigError::InvalidState(format!(
                "proposal {} is {}",
                self.id, self.status
            )));
        }

        if self.txid.is_some() {
            return Err(MultisigError::InvalidState(format!(
                "proposal {} was already sent",
                self.id
            )));
        }

        Ok(())
    }

    fn close(&mut self, status: ProposalStatus) {
        self.status = status;
        self.closed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Coin, KeyPath, TxInput, TxOutput};

    fn proposal(m: u8, n: u8) -> Proposal {
        let coin = Coin {
            outpoint: Outpoint::new("aa".repeat(32), 0),
            value: 50_000,
            address: "3shared".to_string(),
            path: KeyPath::receive(0),
            height: Some(1),
        };
        let tx = Transaction::new(
            vec![TxInput::unsigned(&coin, n)],
            vec![TxOutput {
                address: "1dest".to_string(),
                value: 40_000,
            }],
        );
        Proposal::new(0, "memo".to_string(), 0, m, n, tx)
    }

    #[test]
    fn test_new_references_coins() {
        let p = proposal(2, 3);
        assert_eq!(p.coins, vec![Outpoint::new("aa".repeat(32), 0)]);
        assert!(p.is_pending());
        assert!(p.is_live());
    }

    #[test]
    fn test_approval_threshold() {
        let mut p = proposal(2, 3);

        assert!(!p.record_approval(0).unwrap());
        assert_eq!(p.status, ProposalStatus::Progress);

        assert!(p.record_approval(2).unwrap());
        assert_eq!(p.status, ProposalStatus::Approved);
        assert!(p.closed_at.is_some());
        assert!(p.is_live());

        assert!(matches!(
            p.record_approval(1),
            Err(MultisigError::InvalidState(_))
        ));
    }

    #[test]
    fn test_rejection_threshold() {
        // 2-of-3 survives one rejection
        let mut p = proposal(2, 3);
        assert!(!p.record_rejection(0).unwrap());
        assert!(p.record_rejection(1).unwrap());
        assert_eq!(p.status, ProposalStatus::Rejected);
        assert!(p.n as usize - p.rejections.len() < p.m as usize);
        assert!(!p.is_live());

        // 2-of-2 is rejected by a single vote
        let mut p = proposal(2, 2);
        assert!(p.record_rejection(0).unwrap());
    }

    #[test]
    fn test_duplicate_votes() {
        let mut p = proposal(2, 3);
        p.record_approval(0).unwrap();

        assert!(matches!(p.record_approval(0), Err(MultisigError::DuplicateVote(0))));
        assert!(matches!(p.record_rejection(0), Err(MultisigError::DuplicateVote(0))));

        p.record_rejection(1).unwrap();
        assert!(matches!(p.record_approval(1), Err(MultisigError::DuplicateVote(1))));
        assert!(p.approvals.is_disjoint(&p.rejections));
    }

    #[test]
    fn test_sendable() {
        let mut p = proposal(1, 2);
        assert!(p.ensure_sendable().is_err());

        p.record_approval(1).unwrap();
        assert!(p.ensure_sendable().is_ok());

        p.txid = Some("ff".repeat(32));
        assert!(p.ensure_sendable().is_err());
        assert!(!p.is_live());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&ProposalStatus::Progress).unwrap();
        assert_eq!(json, "\"PROGRESS\"");
        assert_eq!(ProposalStatus::Rejected.to_string(), "REJECTED");
    }
}
