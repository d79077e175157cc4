//! Wallet lifecycle events
//!
//! Events are published once per state change and fanned out by the
//! [`EventBus`] to every session bound to the wallet or to the admin
//! wildcard channel.

pub mod bus;

use crate::multisig::{CosignerView, ProposalView, VoteView};
use serde::{Deserialize, Serialize};

pub use bus::{EventBus, SessionId, Topic, DEFAULT_QUEUE_CAPACITY};

/// Lifecycle event of one wallet
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WalletEvent {
    /// A cosigner joined
    Join(CosignerView),
    /// A proposal was created
    ProposalCreated(ProposalView),
    /// A cosigner approved, with or without reaching the threshold
    ProposalApproved(VoteView),
    /// A cosigner rejected, with or without closing the proposal
    ProposalRejected(VoteView),
}

impl WalletEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            WalletEvent::Join(_) => "join",
            WalletEvent::ProposalCreated(_) => "proposal created",
            WalletEvent::ProposalApproved(_) => "proposal approved",
            WalletEvent::ProposalRejected(_) => "proposal rejected",
        }
    }
}

/// Event as delivered to a session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    pub wallet: String,
    pub data: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(wallet_id: &str, event: &WalletEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.name().to_string(),
            wallet: wallet_id.to_string(),
            data: serde_json::to_value(event)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let event = WalletEvent::Join(CosignerView {
            id: 1,
            name: "cosigner2".to_string(),
        });
        let envelope = EventEnvelope::new("test", &event).unwrap();

        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "join",
                "wallet": "test",
                "data": { "id": 1, "name": "cosigner2" }
            })
        );
    }
}
