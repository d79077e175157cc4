//! Coin reservations held by live proposals

use crate::core::Outpoint;
use crate::multisig::error::MultisigError;
use crate::multisig::proposal::Proposal;
use std::collections::{HashMap, HashSet};

/// Outpoint -> owning proposal id, for one wallet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinLocks {
    locks: HashMap<Outpoint, u32>,
}

impl CoinLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the table from stored proposals
    pub fn rebuild(proposals: &[Proposal]) -> Self {
        let mut locks = Self::new();
        for proposal in proposals.iter().filter(|p| p.is_live()) {
            for coin in &proposal.coins {
                locks.locks.insert(coin.clone(), proposal.id);
            }
        }
        locks
    }

    /// Reserve every coin for `proposal_id`, or none of them
    pub fn lock(&mut self, coins: &[Outpoint], proposal_id: u32) -> Result<(), MultisigError> {
        let conflicts: Vec<Outpoint> = coins
            .iter()
            .filter(|coin| matches!(self.locks.get(*coin), Some(owner) if *owner != proposal_id))
            .cloned()
            .collect();

        if !conflicts.is_empty() {
            return Err(MultisigError::CoinsLocked(conflicts));
        }

        for coin in coins {
            self.locks.insert(coin.clone(), proposal_id);
        }
        Ok(())
    }

    /// Release everything `proposal_id` holds
    pub fn unlock(&mut self, proposal_id: u32) -> Vec<Outpoint> {
        let released: Vec<Outpoint> = self
            .locks
            .iter()
            .filter(|(_, owner)| **owner == proposal_id)
            .map(|(coin, _)| coin.clone())
            .collect();

        for coin in &released {
            self.locks.remove(coin);
        }
        released
    }

    pub fn owner(&self, coin: &Outpoint) -> Option<u32> {
        self.locks.get(coin).copied()
    }

    /// All reserved coins
    pub fn locked(&self) -> HashSet<Outpoint> {
        self.locks.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coin(i: u32) -> Outpoint {
        Outpoint::new("bb".repeat(32), i)
    }

    #[test]
    fn test_lock_is_all_or_nothing() {
        let mut locks = CoinLocks::new();
        locks.lock(&[coin(0), coin(1)], 0).unwrap();

        let err = locks.lock(&[coin(2), coin(1)], 1).unwrap_err();
        match err {
            MultisigError::CoinsLocked(conflicts) => assert_eq!(conflicts, vec![coin(1)]),
            other => panic!("unexpected error: {other}"),
        }

        // coin 2 must not have been taken
        assert_eq!(locks.owner(&coin(2)), None);
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_unlock_frees_coins() {
        let mut locks = CoinLocks::new();
        locks.lock(&[coin(0), coin(1)], 0).unwrap();
        locks.lock(&[coin(5)], 1).unwrap();

        let mut released = locks.unlock(0);
        released.sort();
        assert_eq!(released, vec![coin(0), coin(1)]);

        locks.lock(&[coin(0)], 2).unwrap();
        assert_eq!(locks.owner(&coin(0)), Some(2));
        assert_eq!(locks.locked().len(), 2);
        assert!(locks.unlock(7).is_empty());
    }
}
