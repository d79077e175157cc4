//! In-memory wallet backend
//!
//! Tracks shared wallets, their derived addresses and coins, and a simple
//! chain tip. Funding, broadcast and block application follow the same UTXO
//! rules a node-backed implementation would.

use super::{
    AccountInfo, AddressInfo, Balance, BackendError, WalletBackend, PRIMARY_WALLET,
};
use crate::core::{
    Coin, KeyPath, Outpoint, Transaction, TxInput, TxOptions, TxOutput, DUST_THRESHOLD,
};
use crate::crypto::{derive_public_key, multisig_address, verify_signature};
use secp256k1::PublicKey;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default fee rate per 1000 bytes
pub const DEFAULT_FEE_RATE: u64 = 10_000;

/// Account name reported for every shared wallet
const ACCOUNT_NAME: &str = "default";

// =============================================================================
// Internal state
// =============================================================================

#[derive(Debug)]
struct SharedWallet {
    wid: u32,
    m: u8,
    n: u8,
    keys: Vec<PublicKey>,
    receive_depth: u32,
    change_depth: u32,
    coins: BTreeMap<Outpoint, Coin>,
    pending_spends: HashSet<Outpoint>,
}

impl SharedWallet {
    fn new(wid: u32, m: u8, n: u8) -> Self {
        Self {
            wid,
            m,
            n,
            keys: Vec::new(),
            receive_depth: 0,
            change_depth: 0,
            coins: BTreeMap::new(),
            pending_spends: HashSet::new(),
        }
    }

    fn is_ready(&self) -> bool {
        self.keys.len() == self.n as usize
    }

    fn derive_address(&self, path: KeyPath) -> Result<String, BackendError> {
        let keys = self
            .keys
            .iter()
            .map(|key| derive_public_key(key, path.branch, path.index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(multisig_address(self.m, &keys))
    }

    fn current_address(&self, branch: u32) -> Result<Option<String>, BackendError> {
        let depth = if branch == KeyPath::RECEIVE {
            self.receive_depth
        } else {
            self.change_depth
        };

        if !self.is_ready() || depth == 0 {
            return Ok(None);
        }

        self.derive_address(KeyPath {
            branch,
            index: depth - 1,
        })
        .map(Some)
    }

    fn spendable(&self) -> impl Iterator<Item = &Coin> {
        self.coins
            .values()
            .filter(move |coin| !self.pending_spends.contains(&coin.outpoint))
    }
}

#[derive(Debug, Default)]
struct BackendState {
    wallets: BTreeMap<String, SharedWallet>,
    /// Derived address -> owning wallet and path
    addresses: HashMap<String, (String, KeyPath)>,
    next_wid: u32,
    height: u64,
    mempool: HashMap<String, Transaction>,
    nonce: u64,
}

impl BackendState {
    fn wallet(&self, id: &str) -> Result<&SharedWallet, BackendError> {
        self.wallets
            .get(id)
            .ok_or_else(|| BackendError::WalletNotFound(id.to_string()))
    }

    fn wallet_mut(&mut self, id: &str) -> Result<&mut SharedWallet, BackendError> {
        self.wallets
            .get_mut(id)
            .ok_or_else(|| BackendError::WalletNotFound(id.to_string()))
    }

    fn register_address(&mut self, id: &str, path: KeyPath) -> Result<String, BackendError> {
        let address = self.wallet(id)?.derive_address(path)?;
        self.addresses
            .insert(address.clone(), (id.to_string(), path));
        Ok(address)
    }

    /// Credit outputs that pay one of our derived addresses
    fn credit_outputs(&mut self, tx: &Transaction, height: Option<u64>) {
        let txid = tx.txid();

        for (index, output) in tx.outputs.iter().enumerate() {
            let Some((owner, path)) = self.addresses.get(&output.address).cloned() else {
                continue;
            };

            if let Some(wallet) = self.wallets.get_mut(&owner) {
                let outpoint = Outpoint::new(txid.clone(), index as u32);
                wallet.coins.insert(
                    outpoint.clone(),
                    Coin {
                        outpoint,
                        value: output.value,
                        address: output.address.clone(),
                        path,
                        height,
                    },
                );
            }
        }
    }
}

fn overflow() -> BackendError {
    BackendError::InvalidOptions("amount is out of range".to_string())
}

/// Rough serialized size of an m-of-n spend
fn estimate_size(inputs: usize, outputs: usize, m: u8, n: u8) -> u64 {
    let per_input = 41 + 3 + 73 * m as u64 + 34 * n as u64;
    10 + per_input * inputs as u64 + 34 * outputs as u64
}

// =============================================================================
// MemoryBackend
// =============================================================================

/// Thread-safe in-memory [`WalletBackend`]
#[derive(Debug)]
pub struct MemoryBackend {
    state: RwLock<BackendState>,
    fee_rate: u64,
}

impl MemoryBackend {
    /// Create an empty backend with the default fee rate
    pub fn new() -> Self {
        Self::with_fee_rate(DEFAULT_FEE_RATE)
    }

    /// Create an empty backend with a custom fee rate per 1000 bytes
    pub fn with_fee_rate(fee_rate: u64) -> Self {
        Self {
            state: RwLock::new(BackendState {
                next_wid: 1,
                ..Default::default()
            }),
            fee_rate,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BackendState>, BackendError> {
        self.state
            .read()
            .map_err(|_| BackendError::Unavailable("backend state poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BackendState>, BackendError> {
        self.state
            .write()
            .map_err(|_| BackendError::Unavailable("backend state poisoned".to_string()))
    }

    /// Current chain height
    pub fn height(&self) -> Result<u64, BackendError> {
        Ok(self.read()?.height)
    }

    /// Credit a confirmed coin to a derived address in a new block
    pub fn fund_address(&self, address: &str, value: u64) -> Result<Outpoint, BackendError> {
        let mut state = self.write()?;

        if !state.addresses.contains_key(address) {
            return Err(BackendError::UnknownAddress(address.to_string()));
        }

        state.nonce += 1;
        state.height += 1;

        // Coinbase-like funding; the nonce keeps repeated payments distinct
        let mut funding = Transaction::new(
            Vec::new(),
            vec![TxOutput {
                address: address.to_string(),
                value,
            }],
        );
        funding.locktime = state.nonce as u32;

        let height = state.height;
        state.credit_outputs(&funding, Some(height));

        log::debug!("Funded {} with {} at height {}", address, value, height);
        Ok(Outpoint::new(funding.txid(), 0))
    }

    /// Confirm transactions in a new block
    ///
    /// Spent coins disappear from every wallet; outputs paying derived
    /// addresses become confirmed coins.
    pub fn add_block(&self, txs: &[Transaction]) -> Result<u64, BackendError> {
        let mut state = self.write()?;
        state.height += 1;
        let height = state.height;

        for tx in txs {
            let prevouts = tx.prevouts();
            for wallet in state.wallets.values_mut() {
                for prevout in &prevouts {
                    wallet.coins.remove(prevout);
                    wallet.pending_spends.remove(prevout);
                }
            }

            state.credit_outputs(tx, Some(height));
            state.mempool.remove(&tx.txid());
        }

        Ok(height)
    }

    /// Verify that every input carries at least m valid signatures
    fn verify_signatures(wallet: &SharedWallet, tx: &Transaction) -> Result<(), BackendError> {
        for (i, input) in tx.inputs.iter().enumerate() {
            let sighash = tx.sighash(i)?;
            let mut valid = 0;

            for (slot, signature) in input.signatures.iter().enumerate() {
                let Some(signature) = signature else {
                    continue;
                };
                let key = wallet.keys.get(slot).ok_or_else(|| {
                    BackendError::Verify(format!("input {} has unknown signer slot {}", i, slot))
                })?;

                let child = derive_public_key(key, input.path.branch, input.path.index)?;
                let Ok(bytes) = hex::decode(signature) else {
                    continue;
                };
                if matches!(verify_signature(&child, &sighash, &bytes), Ok(true)) {
                    valid += 1;
                }
            }

            if valid < wallet.m as usize {
                return Err(BackendError::Verify(format!(
                    "input {} has {} of {} required signatures",
                    i, valid, wallet.m
                )));
            }
        }

        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletBackend for MemoryBackend {
    fn create_wallet(&self, id: &str, m: u8, n: u8) -> Result<u32, BackendError> {
        let mut state = self.write()?;

        if id == PRIMARY_WALLET || state.wallets.contains_key(id) {
            return Err(BackendError::WalletExists(id.to_string()));
        }

        let wid = state.next_wid;
        state.next_wid += 1;
        state
            .wallets
            .insert(id.to_string(), SharedWallet::new(wid, m, n));

        log::debug!("Backend wallet {} created (wid {}, {}-of-{})", id, wid, m, n);
        Ok(wid)
    }

    fn add_shared_key(&self, id: &str, key: &PublicKey) -> Result<(), BackendError> {
        let mut state = self.write()?;
        let wallet = state.wallet_mut(id)?;

        if wallet.is_ready() {
            return Err(BackendError::InvalidOptions(
                "all shared keys are registered".to_string(),
            ));
        }
        if wallet.keys.contains(key) {
            return Err(BackendError::InvalidOptions(
                "shared key already registered".to_string(),
            ));
        }

        wallet.keys.push(*key);

        if wallet.is_ready() {
            wallet.receive_depth = 1;
            wallet.change_depth = 1;
            state.register_address(id, KeyPath::receive(0))?;
            state.register_address(id, KeyPath::change(0))?;
        }

        Ok(())
    }

    fn remove_wallet(&self, id: &str) -> Result<bool, BackendError> {
        let mut state = self.write()?;

        if state.wallets.remove(id).is_none() {
            return Ok(false);
        }

        state.addresses.retain(|_, (owner, _)| owner != id);
        Ok(true)
    }

    fn wallet_ids(&self) -> Result<Vec<String>, BackendError> {
        let state = self.read()?;

        let mut shared: Vec<(&String, u32)> = state
            .wallets
            .iter()
            .map(|(id, wallet)| (id, wallet.wid))
            .collect();
        shared.sort_by_key(|(_, wid)| *wid);

        let mut ids = vec![PRIMARY_WALLET.to_string()];
        ids.extend(shared.into_iter().map(|(id, _)| id.clone()));
        Ok(ids)
    }

    fn account(&self, id: &str) -> Result<AccountInfo, BackendError> {
        let state = self.read()?;
        let wallet = state.wallet(id)?;

        Ok(AccountInfo {
            name: ACCOUNT_NAME.to_string(),
            watch_only: true,
            initialized: wallet.is_ready(),
            m: wallet.m,
            n: wallet.n,
            receive_depth: wallet.receive_depth,
            change_depth: wallet.change_depth,
            receive_address: wallet.current_address(KeyPath::RECEIVE)?,
            change_address: wallet.current_address(KeyPath::CHANGE)?,
            keys: wallet
                .keys
                .iter()
                .map(|k| hex::encode(k.serialize()))
                .collect(),
        })
    }

    fn balance(&self, id: &str) -> Result<Balance, BackendError> {
        let state = self.read()?;
        let wallet = state.wallet(id)?;

        let confirmed = wallet
            .coins
            .values()
            .filter(|coin| coin.height.is_some())
            .map(|coin| coin.value)
            .sum();
        let unconfirmed = wallet.spendable().map(|coin| coin.value).sum();

        Ok(Balance {
            confirmed,
            unconfirmed,
            coins: wallet.spendable().count(),
        })
    }

    fn coins(&self, id: &str) -> Result<Vec<Coin>, BackendError> {
        let state = self.read()?;
        Ok(state.wallet(id)?.spendable().cloned().collect())
    }

    fn create_address(&self, id: &str) -> Result<AddressInfo, BackendError> {
        let mut state = self.write()?;
        let wallet = state.wallet_mut(id)?;

        if !wallet.is_ready() {
            return Err(BackendError::NotReady(id.to_string()));
        }

        let index = wallet.receive_depth;
        wallet.receive_depth += 1;
        let address = state.register_address(id, KeyPath::receive(index))?;

        Ok(AddressInfo {
            name: ACCOUNT_NAME.to_string(),
            account: 0,
            branch: KeyPath::RECEIVE,
            index,
            address,
        })
    }

    fn fund(
        &self,
        id: &str,
        options: &TxOptions,
        locked: &HashSet<Outpoint>,
    ) -> Result<Transaction, BackendError> {
        options
            .validate()
            .map_err(|e| BackendError::InvalidOptions(e.to_string()))?;

        let state = self.read()?;
        let wallet = state.wallet(id)?;

        if !wallet.is_ready() {
            return Err(BackendError::NotReady(id.to_string()));
        }

        let rate = options.rate.unwrap_or(self.fee_rate);
        let target = options.total().ok_or_else(overflow)?;
        let output_count = options.outputs.len() + 1;
        let fee_for = |inputs: usize| {
            estimate_size(inputs, output_count, wallet.m, wallet.n)
                .checked_mul(rate)
                .map(|cost| cost / 1000)
                .ok_or_else(overflow)
        };
        let need_for = |fee: u64| {
            if options.subtract_fee {
                Ok(target)
            } else {
                target.checked_add(fee).ok_or_else(overflow)
            }
        };

        let candidates: Vec<Coin> = match &options.inputs {
            Some(requested) => {
                let mut seen = HashSet::new();
                requested
                    .iter()
                    .map(|outpoint| {
                        wallet
                            .coins
                            .get(outpoint)
                            .filter(|_| !wallet.pending_spends.contains(outpoint))
                            .filter(|_| seen.insert(outpoint.clone()))
                            .cloned()
                            .ok_or_else(|| BackendError::UnknownCoin(outpoint.clone()))
                    })
                    .collect::<Result<_, _>>()?
            }
            None => {
                let mut coins: Vec<Coin> = wallet
                    .spendable()
                    .filter(|coin| !locked.contains(&coin.outpoint))
                    .cloned()
                    .collect();
                // Confirmed first, larger first
                coins.sort_by(|a, b| {
                    b.height
                        .is_some()
                        .cmp(&a.height.is_some())
                        .then(b.value.cmp(&a.value))
                });
                coins
            }
        };

        let explicit = options.inputs.is_some();
        let mut selected: Vec<Coin> = Vec::new();
        let mut total = 0u64;

        for coin in candidates {
            if !explicit && !selected.is_empty() && total >= need_for(fee_for(selected.len())?)? {
                break;
            }
            total = total.checked_add(coin.value).ok_or_else(overflow)?;
            selected.push(coin);
        }

        let fee = fee_for(selected.len())?;
        let need = need_for(fee)?;

        if selected.is_empty() || total < need {
            return Err(BackendError::InsufficientFunds { have: total, need });
        }

        let mut outputs: Vec<TxOutput> = options
            .outputs
            .iter()
            .map(|spec| TxOutput {
                address: spec.address.clone(),
                value: spec.value,
            })
            .collect();

        if options.subtract_fee {
            let first = &mut outputs[0];
            if first.value <= fee.saturating_add(DUST_THRESHOLD) {
                return Err(BackendError::InvalidOptions(
                    "first output can not pay the fee".to_string(),
                ));
            }
            first.value -= fee;
        }

        let change = total - need;
        if change > DUST_THRESHOLD {
            if let Some(address) = wallet.current_address(KeyPath::CHANGE)? {
                outputs.push(TxOutput {
                    address,
                    value: change,
                });
            }
        }

        let inputs = selected
            .iter()
            .map(|coin| TxInput::unsigned(coin, wallet.n))
            .collect();

        Ok(Transaction::new(inputs, outputs))
    }

    fn broadcast(&self, id: &str, tx: &Transaction) -> Result<String, BackendError> {
        let mut state = self.write()?;

        {
            let wallet = state.wallet(id)?;

            if tx.inputs.is_empty() {
                return Err(BackendError::Broadcast("transaction has no inputs".to_string()));
            }

            for input in &tx.inputs {
                if !wallet.coins.contains_key(&input.prevout)
                    || wallet.pending_spends.contains(&input.prevout)
                {
                    return Err(BackendError::Broadcast(format!(
                        "input {} is missing or already spent",
                        input.prevout
                    )));
                }
            }

            if tx.fee().is_none() {
                return Err(BackendError::Verify("outputs exceed inputs".to_string()));
            }

            Self::verify_signatures(wallet, tx)?;
        }

        let txid = tx.txid();
        let wallet = state.wallet_mut(id)?;
        for prevout in tx.prevouts() {
            wallet.pending_spends.insert(prevout);
        }

        state.credit_outputs(tx, None);
        state.mempool.insert(txid.clone(), tx.clone());

        log::info!("Broadcast {} from {}", txid, id);
        Ok(txid)
    }

    fn rescan(&self, height: u64) -> Result<(), BackendError> {
        let state = self.read()?;

        if height > state.height {
            return Err(BackendError::InvalidOptions(format!(
                "rescan height {} is above tip {}",
                height, state.height
            )));
        }

        log::info!("Rescanning from height {} (tip {})", height, state.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputSpec;
    use crate::crypto::{derive_key_pair, KeyPair};

    const COIN: u64 = 100_000_000;

    fn shared_wallet(backend: &MemoryBackend, id: &str, m: u8, n: u8) -> Vec<KeyPair> {
        backend.create_wallet(id, m, n).unwrap();
        let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        for key in &keys {
            backend.add_shared_key(id, &key.public_key).unwrap();
        }
        keys
    }

    fn pay(value: u64, subtract_fee: bool) -> TxOptions {
        TxOptions {
            outputs: vec![OutputSpec {
                address: "1external".to_string(),
                value,
            }],
            subtract_fee,
            ..Default::default()
        }
    }

    fn sign(tx: &mut Transaction, keys: &[KeyPair], slots: &[usize]) {
        for i in 0..tx.inputs.len() {
            let sighash = tx.sighash(i).unwrap();
            let path = tx.inputs[i].path;
            for &slot in slots {
                let child = derive_key_pair(&keys[slot], path.branch, path.index).unwrap();
                tx.inputs[i].signatures[slot] = Some(hex::encode(child.sign(&sighash).unwrap()));
            }
        }
    }

    #[test]
    fn test_wallet_listing() {
        let backend = MemoryBackend::new();
        backend.create_wallet("b", 1, 2).unwrap();
        backend.create_wallet("a", 1, 2).unwrap();

        assert_eq!(backend.wallet_ids().unwrap(), vec!["primary", "b", "a"]);
        assert!(matches!(
            backend.create_wallet("primary", 1, 1),
            Err(BackendError::WalletExists(_))
        ));

        assert!(!backend.remove_wallet("primary").unwrap());
        assert!(!backend.remove_wallet("nowallet").unwrap());
        assert!(backend.remove_wallet("b").unwrap());
        assert_eq!(backend.wallet_ids().unwrap(), vec!["primary", "a"]);
    }

    #[test]
    fn test_addresses_require_all_keys() {
        let backend = MemoryBackend::new();
        backend.create_wallet("test", 2, 2).unwrap();
        backend
            .add_shared_key("test", &KeyPair::generate().public_key)
            .unwrap();

        let account = backend.account("test").unwrap();
        assert!(!account.initialized);
        assert!(account.receive_address.is_none());
        assert!(matches!(
            backend.create_address("test"),
            Err(BackendError::NotReady(_))
        ));

        backend
            .add_shared_key("test", &KeyPair::generate().public_key)
            .unwrap();
        let account = backend.account("test").unwrap();
        assert!(account.initialized);
        assert!(account.watch_only);
        assert_eq!(account.keys.len(), 2);
        assert!(account.receive_address.unwrap().starts_with('3'));
        assert!(account.change_address.is_some());

        let first = backend.create_address("test").unwrap();
        let second = backend.create_address("test").unwrap();
        assert_eq!((first.index, second.index), (1, 2));
        assert_eq!(first.name, "default");
        assert_eq!(first.account, 0);
        assert_ne!(first.address, second.address);
    }

    #[test]
    fn test_fund_subtract_fee_spends_whole_coin() {
        let backend = MemoryBackend::new();
        shared_wallet(&backend, "test", 2, 2);

        let address = backend.account("test").unwrap().receive_address.unwrap();
        backend.fund_address(&address, COIN).unwrap();

        let tx = backend.fund("test", &pay(COIN, true), &HashSet::new()).unwrap();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 1);
        assert!(tx.outputs[0].value < COIN);
        assert_eq!(tx.inputs[0].signatures.len(), 2);
    }

    #[test]
    fn test_fund_adds_change_and_skips_locked() {
        let backend = MemoryBackend::new();
        shared_wallet(&backend, "test", 1, 2);

        let address = backend.account("test").unwrap().receive_address.unwrap();
        let first = backend.fund_address(&address, COIN).unwrap();

        let tx = backend
            .fund("test", &pay(COIN / 2, false), &HashSet::new())
            .unwrap();
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.output_value().unwrap() + tx.fee().unwrap(), COIN);

        let locked: HashSet<Outpoint> = [first].into_iter().collect();
        assert!(matches!(
            backend.fund("test", &pay(COIN / 2, false), &locked),
            Err(BackendError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_fund_explicit_inputs() {
        let backend = MemoryBackend::new();
        shared_wallet(&backend, "test", 1, 2);
        let address = backend.account("test").unwrap().receive_address.unwrap();
        let coin = backend.fund_address(&address, COIN).unwrap();

        let mut options = pay(COIN / 4, false);
        options.inputs = Some(vec![coin.clone()]);
        let locked: HashSet<Outpoint> = [coin.clone()].into_iter().collect();

        // Explicit inputs are not filtered by the lock set
        let tx = backend.fund("test", &options, &locked).unwrap();
        assert_eq!(tx.prevouts(), vec![coin]);

        options.inputs = Some(vec![Outpoint::new("ff".repeat(32), 0)]);
        assert!(matches!(
            backend.fund("test", &options, &HashSet::new()),
            Err(BackendError::UnknownCoin(_))
        ));
    }

    #[test]
    fn test_fund_rejects_out_of_range_amounts() {
        let backend = MemoryBackend::new();
        let keys = shared_wallet(&backend, "test", 1, 1);
        let address = backend.account("test").unwrap().receive_address.unwrap();
        backend.fund_address(&address, COIN).unwrap();

        let mut options = pay(10_000, false);
        options.outputs.insert(
            0,
            OutputSpec {
                address: "1recipient".to_string(),
                value: u64::MAX,
            },
        );
        assert!(matches!(
            backend.fund("test", &options, &HashSet::new()),
            Err(BackendError::InvalidOptions(_))
        ));

        let mut options = pay(10_000, false);
        options.rate = Some(u64::MAX);
        assert!(matches!(
            backend.fund("test", &options, &HashSet::new()),
            Err(BackendError::InvalidOptions(_))
        ));

        // A hand-built spend paying more than its input is refused
        let mut tx = backend.fund("test", &pay(10_000, false), &HashSet::new()).unwrap();
        tx.outputs[0].value = u64::MAX;
        sign(&mut tx, &keys, &[0]);
        assert!(matches!(
            backend.broadcast("test", &tx),
            Err(BackendError::Verify(_))
        ));
    }

    #[test]
    fn test_broadcast_requires_threshold_signatures() {
        let backend = MemoryBackend::new();
        let keys = shared_wallet(&backend, "test", 2, 3);
        let address = backend.account("test").unwrap().receive_address.unwrap();
        backend.fund_address(&address, COIN).unwrap();

        let mut tx = backend.fund("test", &pay(COIN, true), &HashSet::new()).unwrap();

        sign(&mut tx, &keys, &[2]);
        assert!(matches!(
            backend.broadcast("test", &tx),
            Err(BackendError::Verify(_))
        ));
        assert_eq!(backend.balance("test").unwrap().unconfirmed, COIN);

        sign(&mut tx, &keys, &[0]);
        let txid = backend.broadcast("test", &tx).unwrap();
        assert_eq!(txid, tx.txid());

        let balance = backend.balance("test").unwrap();
        assert_eq!(balance.confirmed, COIN);
        assert_eq!(balance.unconfirmed, 0);

        // Double spend
        assert!(matches!(
            backend.broadcast("test", &tx),
            Err(BackendError::Broadcast(_))
        ));

        backend.add_block(&[tx]).unwrap();
        let balance = backend.balance("test").unwrap();
        assert_eq!(balance.confirmed, 0);
        assert_eq!(balance.coins, 0);
    }

    #[test]
    fn test_change_returns_to_wallet() {
        let backend = MemoryBackend::new();
        let keys = shared_wallet(&backend, "test", 1, 1);
        let address = backend.account("test").unwrap().receive_address.unwrap();
        backend.fund_address(&address, COIN).unwrap();

        let mut tx = backend
            .fund("test", &pay(COIN / 2, false), &HashSet::new())
            .unwrap();
        sign(&mut tx, &keys, &[0]);
        backend.broadcast("test", &tx).unwrap();

        let change = tx.outputs[1].value;
        assert_eq!(backend.balance("test").unwrap().unconfirmed, change);

        backend.add_block(&[tx]).unwrap();
        assert_eq!(backend.balance("test").unwrap().confirmed, change);
    }

    #[test]
    fn test_rescan_bounds() {
        let backend = MemoryBackend::new();
        assert!(backend.rescan(0).is_ok());
        assert!(backend.rescan(5).is_err());
    }
}
