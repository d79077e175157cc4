//! Session-based event fan-out
//!
//! Every session owns a bounded queue. Publishing never blocks: a full
//! queue drops the event for that session only, and a closed queue removes
//! the session.

use super::{EventEnvelope, WalletEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;

/// Default per-session queue length
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Wildcard binding for the admin channel
pub const WILDCARD: &str = "*";

pub type SessionId = u64;

/// Channel a session can bind to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Wallet(String),
    All,
}

impl Topic {
    /// `*` maps to the admin channel, anything else to a wallet channel
    pub fn parse(target: &str) -> Self {
        if target == WILDCARD {
            Topic::All
        } else {
            Topic::Wallet(target.to_string())
        }
    }

    fn matches(&self, wallet_id: &str) -> bool {
        match self {
            Topic::All => true,
            Topic::Wallet(id) => id == wallet_id,
        }
    }
}

#[derive(Debug)]
struct Session {
    sender: mpsc::Sender<EventEnvelope>,
    /// Bound topics and the cosigner whose token made the binding
    /// (`None` for admin)
    topics: HashMap<Topic, Option<u8>>,
}

/// Publishes wallet events to bound sessions
#[derive(Debug)]
pub struct EventBus {
    sessions: RwLock<HashMap<SessionId, Session>>,
    next_session: AtomicU64,
    capacity: usize,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_session: AtomicU64::new(1),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Open a session with no bindings
    pub fn open_session(&self) -> (SessionId, mpsc::Receiver<EventEnvelope>) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.capacity);

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                Session {
                    sender,
                    topics: HashMap::new(),
                },
            );

        (id, receiver)
    }

    pub fn close_session(&self, session: SessionId) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
    }

    /// Bind a session to a topic; `false` when the session is gone
    ///
    /// Callers check the subscriber's scope first and pass the cosigner it
    /// resolved to, or `None` for admin.
    pub fn subscribe(&self, session: SessionId, topic: Topic, cosigner: Option<u8>) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(&session) {
            Some(s) => {
                s.topics.insert(topic, cosigner);
                true
            }
            None => false,
        }
    }

    /// Remove one binding, or every binding for `*`
    pub fn unsubscribe(&self, session: SessionId, target: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(s) = sessions.get_mut(&session) {
            match Topic::parse(target) {
                Topic::All => s.topics.clear(),
                topic => {
                    s.topics.remove(&topic);
                }
            }
        }
    }

    /// Drop the wallet bindings made with one cosigner's token
    ///
    /// Returns the number of bindings removed.
    pub fn unbind_cosigner(&self, wallet_id: &str, cosigner_id: u8) -> usize {
        let topic = Topic::Wallet(wallet_id.to_string());
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for session in sessions.values_mut() {
            if session.topics.get(&topic) == Some(&Some(cosigner_id)) {
                session.topics.remove(&topic);
                removed += 1;
            }
        }
        removed
    }

    /// Drop every binding to a wallet's channel
    pub fn unbind_wallet(&self, wallet_id: &str) {
        let topic = Topic::Wallet(wallet_id.to_string());
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        for session in sessions.values_mut() {
            session.topics.remove(&topic);
        }
    }

    /// Deliver an event to every session bound to the wallet or to `*`
    ///
    /// Each session receives it at most once. Returns the number of queues
    /// that accepted it.
    pub fn publish(&self, wallet_id: &str, event: &WalletEvent) -> usize {
        let envelope = match EventEnvelope::new(wallet_id, event) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::error!("Failed to encode {} event: {}", event.name(), e);
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            for (id, session) in sessions.iter() {
                if !session.topics.keys().any(|t| t.matches(wallet_id)) {
                    continue;
                }

                match session.sender.try_send(envelope.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        log::warn!("Session {} queue full, dropped {}", id, event.name());
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            for id in closed {
                sessions.remove(&id);
            }
        }

        delivered
    }

    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Events dropped on full queues since start
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::CosignerView;

    fn join_event(id: u8) -> WalletEvent {
        WalletEvent::Join(CosignerView {
            id,
            name: format!("cosigner{}", id + 1),
        })
    }

    #[tokio::test]
    async fn test_wallet_and_wildcard_delivery() {
        let bus = EventBus::default();
        let (alice, mut alice_rx) = bus.open_session();
        let (admin, mut admin_rx) = bus.open_session();
        let (other, mut other_rx) = bus.open_session();

        bus.subscribe(alice, Topic::parse("test"), None);
        bus.subscribe(admin, Topic::All, None);
        bus.subscribe(other, Topic::parse("other"), None);

        assert_eq!(bus.publish("test", &join_event(1)), 2);

        let event = alice_rx.recv().await.unwrap();
        assert_eq!(event.event, "join");
        assert_eq!(event.wallet, "test");
        assert_eq!(admin_rx.recv().await.unwrap().wallet, "test");
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delivered_once_per_session() {
        let bus = EventBus::default();
        let (session, mut rx) = bus.open_session();
        bus.subscribe(session, Topic::parse("test"), None);
        bus.subscribe(session, Topic::All, None);

        assert_eq!(bus.publish("test", &join_event(0)), 1);
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::default();
        let (session, mut rx) = bus.open_session();
        bus.subscribe(session, Topic::parse("a"), None);
        bus.subscribe(session, Topic::parse("b"), None);

        bus.unsubscribe(session, "a");
        assert_eq!(bus.publish("a", &join_event(0)), 0);
        assert_eq!(bus.publish("b", &join_event(0)), 1);

        bus.unsubscribe(session, "*");
        assert_eq!(bus.publish("b", &join_event(0)), 0);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops() {
        let bus = EventBus::new(1);
        let (session, _rx) = bus.open_session();
        bus.subscribe(session, Topic::All, None);

        assert_eq!(bus.publish("test", &join_event(0)), 1);
        assert_eq!(bus.publish("test", &join_event(1)), 0);
        assert_eq!(bus.dropped(), 1);
        assert_eq!(bus.session_count(), 1);
    }

    #[test]
    fn test_closed_session_is_pruned() {
        let bus = EventBus::default();
        let (session, rx) = bus.open_session();
        bus.subscribe(session, Topic::All, None);
        drop(rx);

        assert_eq!(bus.publish("test", &join_event(0)), 0);
        assert_eq!(bus.session_count(), 0);
        assert!(!bus.subscribe(session, Topic::All, None));
    }

    #[test]
    fn test_unbind_cosigner() {
        let bus = EventBus::default();
        let (stale, _stale_rx) = bus.open_session();
        let (other, _other_rx) = bus.open_session();
        let (admin, _admin_rx) = bus.open_session();
        bus.subscribe(stale, Topic::parse("test"), Some(1));
        bus.subscribe(other, Topic::parse("test"), Some(0));
        bus.subscribe(admin, Topic::parse("test"), None);

        assert_eq!(bus.unbind_cosigner("test", 1), 1);
        assert_eq!(bus.publish("test", &join_event(0)), 2);
        assert_eq!(bus.unbind_cosigner("other", 0), 0);
    }

    #[test]
    fn test_unbind_wallet() {
        let bus = EventBus::default();
        let (session, _rx) = bus.open_session();
        bus.subscribe(session, Topic::parse("test"), None);

        bus.unbind_wallet("test");
        assert_eq!(bus.publish("test", &join_event(0)), 0);
    }
}
