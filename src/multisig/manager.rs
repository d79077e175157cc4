//! Shared wallet and proposal manager
//!
//! Owns the wallet table and runs every coordinator operation: wallet
//! lifecycle, join, proxy calls to the backend, proposals and event
//! subscriptions.
//!
//! Each wallet sits behind its own async mutex. Mutating operations work
//! on a copy of the wallet, persist it, and only then commit and publish,
//! so a failed call leaves nothing behind.

use crate::backend::{AddressInfo, Balance, WalletBackend, PRIMARY_WALLET};
use crate::core::{Coin, Transaction, TxOptions};
use crate::events::{EventBus, Topic, WalletEvent};
use crate::multisig::auth::{AuthGate, Scope};
use crate::multisig::cosigner::CosignerOptions;
use crate::multisig::error::MultisigError;
use crate::multisig::join;
use crate::multisig::lock::CoinLocks;
use crate::multisig::proposal::{Proposal, MAX_MEMO_LENGTH};
use crate::multisig::signature::SignatureAggregator;
use crate::multisig::token::Token;
use crate::multisig::view::{
    CosignerDetails, CosignerView, InputPath, ProposalTxView, ProposalView, SendView, VoteView,
    WalletDetailsView, WalletInfo, WalletView,
};
use crate::multisig::wallet::{validate_wallet_id, MultisigWallet, WalletOptions};
use crate::storage::WalletStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Mutable state of one wallet
#[derive(Debug)]
struct WalletEntry {
    wallet: MultisigWallet,
    locks: CoinLocks,
    /// Set under the lock by removal; waiters must not touch the wallet
    removed: bool,
}

#[derive(Debug)]
struct WalletSlot {
    wid: u32,
    entry: Arc<Mutex<WalletEntry>>,
}

impl WalletSlot {
    fn new(wallet: MultisigWallet) -> Arc<Self> {
        let locks = CoinLocks::rebuild(&wallet.proposals);
        Arc::new(Self {
            wid: wallet.wid,
            entry: Arc::new(Mutex::new(WalletEntry {
                wallet,
                locks,
                removed: false,
            })),
        })
    }
}

/// Coordinator for shared wallets
pub struct MultisigManager {
    backend: Arc<dyn WalletBackend>,
    store: Option<WalletStore>,
    auth: AuthGate,
    events: Arc<EventBus>,
    wallets: RwLock<HashMap<String, Arc<WalletSlot>>>,
}

impl MultisigManager {
    /// Open the manager, restoring stored wallets into the backend
    pub fn open(
        backend: Arc<dyn WalletBackend>,
        store: Option<WalletStore>,
        admin_token: Token,
        events: Arc<EventBus>,
    ) -> Result<Self, MultisigError> {
        let mut wallets = HashMap::new();

        if let Some(store) = &store {
            for mut wallet in store.load_all()? {
                let wid = backend.create_wallet(&wallet.id, wallet.m, wallet.n)?;
                for cosigner in &wallet.cosigners {
                    backend.add_shared_key(&wallet.id, &cosigner.public_key()?)?;
                }

                if wid != wallet.wid {
                    log::debug!(
                        "Wallet {} re-registered with index {} (was {})",
                        wallet.id,
                        wid,
                        wallet.wid
                    );
                    wallet.wid = wid;
                }

                log::info!(
                    "Loaded wallet {} ({}-of-{}, {} proposals)",
                    wallet.id,
                    wallet.m,
                    wallet.n,
                    wallet.proposals.len()
                );
                wallets.insert(wallet.id.clone(), WalletSlot::new(wallet));
            }
        }

        Ok(Self {
            backend,
            store,
            auth: AuthGate::new(admin_token),
            events,
            wallets: RwLock::new(wallets),
        })
    }

    /// Event bus shared with the transport
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn slot(&self, id: &str) -> Option<Arc<WalletSlot>> {
        self.wallets.read().await.get(id).cloned()
    }

    /// Unknown wallets are only named to admin
    fn missing(&self, id: &str, token: Option<&str>) -> MultisigError {
        if self.auth.is_admin(token) {
            MultisigError::WalletNotFound(id.to_string())
        } else {
            MultisigError::AuthenticationError
        }
    }

    /// Find a wallet without revealing its existence to non-admin callers
    async fn locate(&self, id: &str, token: Option<&str>) -> Result<Arc<WalletSlot>, MultisigError> {
        self.slot(id).await.ok_or_else(|| self.missing(id, token))
    }

    /// Lock a wallet for the rest of an operation
    ///
    /// A wallet removed while the caller waited counts as unknown.
    async fn enter(
        &self,
        id: &str,
        token: Option<&str>,
    ) -> Result<OwnedMutexGuard<WalletEntry>, MultisigError> {
        let slot = self.locate(id, token).await?;
        let entry = slot.entry.clone().lock_owned().await;
        if entry.removed {
            return Err(self.missing(id, token));
        }
        Ok(entry)
    }

    fn persist(&self, wallet: &MultisigWallet) -> Result<(), MultisigError> {
        if let Some(store) = &self.store {
            store.save(wallet).map_err(|e| {
                log::error!("Failed to persist wallet {}: {}", wallet.id, e);
                e
            })?;
        }
        Ok(())
    }

    fn publish(&self, wallet_id: &str, event: WalletEvent) {
        let delivered = self.events.publish(wallet_id, &event);
        log::debug!("{} for {} delivered to {} sessions", event.name(), wallet_id, delivered);
    }

    /// Resolve a cosigner caller and return their id
    fn cosigner_id(&self, token: Option<&str>, wallet: &MultisigWallet) -> Result<u8, MultisigError> {
        self.auth.require_cosigner(token, wallet)?.cosigner_id()
    }

    fn cosigner_view(wallet: &MultisigWallet, id: u8) -> Result<CosignerView, MultisigError> {
        wallet
            .cosigner(id)
            .map(CosignerView::from)
            .ok_or(MultisigError::AuthenticationError)
    }

    // =========================================================================
    // Wallets
    // =========================================================================

    /// Create a wallet; the caller becomes cosigner 0
    pub async fn create_wallet(
        &self,
        id: &str,
        options: WalletOptions,
    ) -> Result<WalletView, MultisigError> {
        options.validate()?;
        validate_wallet_id(id)?;

        if self.wallets.read().await.contains_key(id) {
            return Err(MultisigError::WalletExists(id.to_string()));
        }

        let wid = self.backend.create_wallet(id, options.m, options.n)?;

        let created = MultisigWallet::create(wid, id, options).and_then(|wallet| {
            let key = wallet.cosigners[0].public_key()?;
            self.backend.add_shared_key(id, &key)?;
            self.persist(&wallet)?;
            Ok(wallet)
        });

        let wallet = match created {
            Ok(wallet) => wallet,
            Err(e) => {
                if let Err(cleanup) = self.backend.remove_wallet(id) {
                    log::error!("Failed to roll back backend wallet {}: {}", id, cleanup);
                }
                return Err(e);
            }
        };

        let view = WalletView::for_cosigner(&wallet, 0);
        log::info!(
            "Created wallet {} ({}-of-{}, wid {})",
            id,
            wallet.m,
            wallet.n,
            wid
        );
        if wallet.initialized {
            log::info!("Wallet {} initialized", id);
        }

        self.wallets
            .write()
            .await
            .insert(id.to_string(), WalletSlot::new(wallet));

        Ok(view)
    }

    /// Join a wallet with its join key
    pub async fn join(
        &self,
        id: &str,
        join_key: &str,
        options: CosignerOptions,
    ) -> Result<WalletView, MultisigError> {
        let slot = self.slot(id).await.ok_or(MultisigError::AuthenticationError)?;
        let mut entry = slot.entry.lock().await;
        if entry.removed {
            return Err(MultisigError::AuthenticationError);
        }

        let mut draft = entry.wallet.clone();
        let admission = join::admit(&mut draft, join_key, options)?;

        let cosigner = draft
            .cosigner(admission.cosigner_id)
            .ok_or(MultisigError::WalletFull)?;
        let key = cosigner.public_key()?;

        // Stored record first; a restart replays its keys into the backend
        self.persist(&draft)?;
        if let Err(e) = self.backend.add_shared_key(id, &key) {
            if let Err(restore) = self.persist(&entry.wallet) {
                log::error!("Failed to restore wallet record {}: {}", id, restore);
            }
            return Err(e.into());
        }

        let view = WalletView::for_cosigner(&draft, admission.cosigner_id);
        let joined = CosignerView::from(cosigner);
        entry.wallet = draft;

        log::info!("Cosigner {} joined wallet {}", joined.id, id);
        if admission.initialized {
            log::info!("Wallet {} initialized", id);
        }
        self.publish(id, WalletEvent::Join(joined));

        Ok(view)
    }

    /// Wallet info, `None` for unknown ids and the primary wallet
    pub async fn get_info(
        &self,
        id: &str,
        token: Option<&str>,
        details: bool,
    ) -> Result<Option<WalletInfo>, MultisigError> {
        if id == PRIMARY_WALLET {
            return Ok(None);
        }

        let Some(slot) = self.slot(id).await else {
            return Ok(None);
        };
        let entry = slot.entry.lock().await;
        if entry.removed {
            return Ok(None);
        }
        self.auth.authorize(token, &entry.wallet)?;

        let view = WalletView::public(&entry.wallet);
        if !details {
            return Ok(Some(WalletInfo::Public(view)));
        }

        Ok(Some(WalletInfo::Details(WalletDetailsView {
            wallet: view,
            account: self.backend.account(id)?,
        })))
    }

    /// Ids of all shared wallets in creation order
    pub async fn wallet_ids(&self, token: Option<&str>) -> Result<Vec<String>, MultisigError> {
        self.auth.require_admin(token)?;

        let wallets = self.wallets.read().await;
        let mut ids: Vec<(u32, String)> = wallets
            .iter()
            .map(|(id, slot)| (slot.wid, id.clone()))
            .collect();
        ids.sort();
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    /// Remove a wallet; `false` for unknown ids and the primary wallet
    pub async fn remove_wallet(&self, id: &str, token: Option<&str>) -> Result<bool, MultisigError> {
        self.auth.require_admin(token)?;

        if id == PRIMARY_WALLET {
            return Ok(false);
        }
        let Some(slot) = self.slot(id).await else {
            return Ok(false);
        };

        let mut entry = slot.entry.lock().await;
        if entry.removed {
            return Ok(false);
        }

        if let Some(store) = &self.store {
            store.remove(id)?;
        }
        let outcome = self.backend.remove_wallet(id);
        if !matches!(outcome, Ok(true)) {
            if let Err(restore) = self.persist(&entry.wallet) {
                log::error!("Failed to restore wallet record {}: {}", id, restore);
            }
            outcome?;
            return Err(MultisigError::NotRemovable(id.to_string()));
        }

        entry.removed = true;
        self.wallets.write().await.remove(id);
        self.events.unbind_wallet(id);

        log::info!("Removed wallet {}", id);
        Ok(true)
    }

    pub async fn rescan(&self, token: Option<&str>, height: u64) -> Result<(), MultisigError> {
        self.auth.require_admin(token)?;
        self.backend.rescan(height)?;
        Ok(())
    }

    /// Replace the caller's token
    pub async fn rotate_token(
        &self,
        id: &str,
        token: Option<&str>,
        new_token: Option<&str>,
    ) -> Result<CosignerDetails, MultisigError> {
        let new_token = new_token
            .map(|hex| {
                Token::from_hex(hex).ok_or_else(|| {
                    MultisigError::InvalidOptions("token must be 32 bytes of hex".to_string())
                })
            })
            .transpose()?;

        let mut entry = self.enter(id, token).await?;
        let cosigner_id = self.cosigner_id(token, &entry.wallet)?;

        let mut draft = entry.wallet.clone();
        let details = CosignerDetails::from(draft.rotate_token(cosigner_id, new_token)?);
        self.persist(&draft)?;
        entry.wallet = draft;

        let unbound = self.events.unbind_cosigner(id, cosigner_id);
        log::info!(
            "Cosigner {} of {} rotated token, {} sessions unbound",
            cosigner_id,
            id,
            unbound
        );
        Ok(details)
    }

    // =========================================================================
    // Backend proxy
    // =========================================================================

    pub async fn balance(&self, id: &str, token: Option<&str>) -> Result<Balance, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;
        Ok(self.backend.balance(id)?)
    }

    pub async fn coins(&self, id: &str, token: Option<&str>) -> Result<Vec<Coin>, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;
        Ok(self.backend.coins(id)?)
    }

    pub async fn create_address(
        &self,
        id: &str,
        token: Option<&str>,
    ) -> Result<AddressInfo, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;
        Ok(self.backend.create_address(id)?)
    }

    /// Build an unsigned transaction without reserving coins
    pub async fn create_tx(
        &self,
        id: &str,
        token: Option<&str>,
        options: &TxOptions,
    ) -> Result<Transaction, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;
        Ok(self.backend.fund(id, options, &entry.locks.locked())?)
    }

    // =========================================================================
    // Proposals
    // =========================================================================

    /// Create a proposal and reserve its coins
    pub async fn create_proposal(
        &self,
        id: &str,
        token: Option<&str>,
        memo: &str,
        options: &TxOptions,
    ) -> Result<ProposalView, MultisigError> {
        let mut entry = self.enter(id, token).await?;
        let author = self.cosigner_id(token, &entry.wallet)?;

        if !entry.wallet.initialized {
            return Err(MultisigError::InvalidState(format!(
                "wallet {} is not initialized",
                id
            )));
        }
        if memo.len() > MAX_MEMO_LENGTH {
            return Err(MultisigError::InvalidOptions("memo is too long".to_string()));
        }

        let tx = self.backend.fund(id, options, &entry.locks.locked())?;

        let mut draft = entry.wallet.clone();
        let mut locks = entry.locks.clone();
        let pid = draft.next_proposal_id();

        locks.lock(&tx.prevouts(), pid)?;
        draft.proposals.push(Proposal::new(
            pid,
            memo.to_string(),
            author,
            draft.m,
            draft.n,
            tx,
        ));
        self.persist(&draft)?;

        let view = ProposalView::new(draft.proposal(pid)?, &draft);
        entry.wallet = draft;
        entry.locks = locks;

        log::info!("Proposal {} created in {} by cosigner {}", pid, id, author);
        self.publish(id, WalletEvent::ProposalCreated(view.clone()));

        Ok(view)
    }

    /// List proposals, optionally only pending ones
    pub async fn proposals(
        &self,
        id: &str,
        token: Option<&str>,
        pending_only: bool,
    ) -> Result<Vec<ProposalView>, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;

        Ok(entry
            .wallet
            .list_proposals(pending_only)
            .map(|p| ProposalView::new(p, &entry.wallet))
            .collect())
    }

    pub async fn proposal(
        &self,
        id: &str,
        token: Option<&str>,
        pid: u32,
    ) -> Result<ProposalView, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;

        Ok(ProposalView::new(entry.wallet.proposal(pid)?, &entry.wallet))
    }

    /// Proposal transaction with optional input paths and scripts
    pub async fn proposal_tx(
        &self,
        id: &str,
        token: Option<&str>,
        pid: u32,
        paths: bool,
        scripts: bool,
    ) -> Result<ProposalTxView, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;

        let tx = &entry.wallet.proposal(pid)?.tx;
        let paths = paths.then(|| {
            tx.inputs
                .iter()
                .map(|input| InputPath {
                    branch: input.path.branch,
                    index: input.path.index,
                    receive: input.path.is_receive(),
                })
                .collect()
        });
        let scripts = if scripts {
            Some(SignatureAggregator::new(&entry.wallet).scripts(tx)?)
        } else {
            None
        };

        Ok(ProposalTxView {
            tx: tx.clone(),
            paths,
            scripts,
        })
    }

    /// Approve with one signature per input
    pub async fn approve(
        &self,
        id: &str,
        token: Option<&str>,
        pid: u32,
        signatures: &[String],
    ) -> Result<VoteView, MultisigError> {
        let mut entry = self.enter(id, token).await?;
        let cosigner_id = self.cosigner_id(token, &entry.wallet)?;

        let mut draft = entry.wallet.clone();
        let proposal = draft.proposal(pid)?;
        proposal.ensure_votable(cosigner_id)?;

        let mut tx = proposal.tx.clone();
        SignatureAggregator::new(&draft).apply(&mut tx, cosigner_id, signatures)?;

        let approved = {
            let proposal = draft.proposal_mut(pid)?;
            proposal.tx = tx;
            proposal.record_approval(cosigner_id)?
        };
        if approved {
            SignatureAggregator::new(&draft).finalize(&draft.proposal(pid)?.tx)?;
        }
        self.persist(&draft)?;

        let vote = VoteView {
            proposal: ProposalView::new(draft.proposal(pid)?, &draft),
            cosigner: Self::cosigner_view(&draft, cosigner_id)?,
        };
        entry.wallet = draft;

        if approved {
            log::info!("Proposal {} in {} approved", pid, id);
        } else {
            log::info!("Cosigner {} approved proposal {} in {}", cosigner_id, pid, id);
        }
        self.publish(id, WalletEvent::ProposalApproved(vote.clone()));

        Ok(vote)
    }

    /// Reject a proposal
    pub async fn reject(
        &self,
        id: &str,
        token: Option<&str>,
        pid: u32,
    ) -> Result<VoteView, MultisigError> {
        let mut entry = self.enter(id, token).await?;
        let cosigner_id = self.cosigner_id(token, &entry.wallet)?;

        let mut draft = entry.wallet.clone();
        let rejected = draft.proposal_mut(pid)?.record_rejection(cosigner_id)?;

        let mut locks = entry.locks.clone();
        if rejected {
            locks.unlock(pid);
        }
        self.persist(&draft)?;

        let vote = VoteView {
            proposal: ProposalView::new(draft.proposal(pid)?, &draft),
            cosigner: Self::cosigner_view(&draft, cosigner_id)?,
        };
        entry.wallet = draft;
        entry.locks = locks;

        if rejected {
            log::info!("Proposal {} in {} rejected", pid, id);
        } else {
            log::info!("Cosigner {} rejected proposal {} in {}", cosigner_id, pid, id);
        }
        self.publish(id, WalletEvent::ProposalRejected(vote.clone()));

        Ok(vote)
    }

    /// Broadcast an approved proposal
    pub async fn send(
        &self,
        id: &str,
        token: Option<&str>,
        pid: u32,
    ) -> Result<SendView, MultisigError> {
        let mut entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)?;

        let proposal = entry.wallet.proposal(pid)?;
        proposal.ensure_sendable()?;
        SignatureAggregator::new(&entry.wallet).finalize(&proposal.tx)?;

        let raw = proposal.tx.to_raw_hex();
        let txid = self.backend.broadcast(id, &proposal.tx)?;

        let mut draft = entry.wallet.clone();
        draft.proposal_mut(pid)?.txid = Some(txid.clone());
        entry.locks.unlock(pid);

        // The spend is final once broadcast; keep it in memory even if the
        // write fails.
        let persisted = self.persist(&draft);
        entry.wallet = draft;
        log::info!("Proposal {} in {} sent as {}", pid, id, txid);
        persisted?;

        Ok(SendView { txid, tx: raw })
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Bind a session to a wallet's events or, with `*`, to every wallet
    pub async fn subscribe(
        &self,
        session: u64,
        target: &str,
        token: &str,
    ) -> Result<(), MultisigError> {
        AuthGate::parse_strict(token)?;

        let topic = Topic::parse(target);
        let bound = match &topic {
            Topic::All => {
                self.auth.require_admin(Some(token))?;
                self.events.subscribe(session, topic.clone(), None)
            }
            Topic::Wallet(id) => {
                // Bound under the wallet lock, as rotation and removal unbind
                let entry = self.enter(id, Some(token)).await?;
                let holder = match self.auth.authorize(Some(token), &entry.wallet)? {
                    Scope::Admin => None,
                    scope => Some(scope.cosigner_id()?),
                };
                self.events.subscribe(session, topic.clone(), holder)
            }
        };

        if !bound {
            return Err(MultisigError::InvalidState(format!(
                "session {} is closed",
                session
            )));
        }
        Ok(())
    }

    pub fn unsubscribe(&self, session: u64, target: &str) {
        self.events.unsubscribe(session, target);
    }

    /// Caller scope for a wallet, mainly for the transport
    pub async fn scope(&self, id: &str, token: Option<&str>) -> Result<Scope, MultisigError> {
        let entry = self.enter(id, token).await?;
        self.auth.authorize(token, &entry.wallet)
    }
}
