//! Nullable ledger actors and the factory that hands them out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use custody_types::{CanisterId, NftRecord, Principal, TokenAmount, TokenInfo};
use custody_wallet_core::{
    ActorFactory, ActorKind, Agent, LedgerActor, NftLedger, RemoteError, TransferArgs,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fungible ledger held in memory. Transfers are recorded, not applied.
pub struct NullLedgerActor {
    balance: Mutex<TokenAmount>,
    metadata: Mutex<TokenInfo>,
    transfers: Mutex<Vec<TransferArgs>>,
    fail_next: Mutex<Option<RemoteError>>,
    delay: Mutex<Option<Duration>>,
    next_block: AtomicU64,
    metadata_calls: AtomicUsize,
}

impl NullLedgerActor {
    pub fn new() -> Self {
        Self {
            balance: Mutex::new(TokenAmount::ZERO),
            metadata: Mutex::new(TokenInfo::default()),
            transfers: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            delay: Mutex::new(None),
            next_block: AtomicU64::new(1),
            metadata_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, balance: TokenAmount) {
        *lock(&self.balance) = balance;
    }

    pub fn set_metadata(&self, metadata: TokenInfo) {
        *lock(&self.metadata) = metadata;
    }

    /// Fail the next call (of any kind) with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        *lock(&self.fail_next) = Some(error);
    }

    /// Sleep for `delay` inside every transfer before answering.
    pub fn set_transfer_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn transfers(&self) -> Vec<TransferArgs> {
        lock(&self.transfers).clone()
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), RemoteError> {
        match lock(&self.fail_next).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for NullLedgerActor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerActor for NullLedgerActor {
    async fn balance(&self) -> Result<TokenAmount, RemoteError> {
        self.take_failure()?;
        Ok(*lock(&self.balance))
    }

    async fn transfer(&self, args: TransferArgs) -> Result<u64, RemoteError> {
        self.take_failure()?;
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.transfers).push(args);
        Ok(self.next_block.fetch_add(1, Ordering::SeqCst))
    }

    async fn metadata(&self) -> Result<TokenInfo, RemoteError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        Ok(lock(&self.metadata).clone())
    }
}

/// An NFT collection with a fixed owner → tokens table.
#[derive(Default)]
pub struct NullNftLedger {
    owned: Mutex<HashMap<Principal, Vec<NftRecord>>>,
    calls: AtomicUsize,
}

impl NullNftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn give(&self, owner: &Principal, record: NftRecord) {
        lock(&self.owned).entry(owner.clone()).or_default().push(record);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NftLedger for NullNftLedger {
    async fn tokens_of(&self, owner: &Principal) -> Result<Vec<NftRecord>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.owned).get(owner).cloned().unwrap_or_default())
    }
}

/// Hands out one shared [`NullLedgerActor`] per canister.
///
/// Tests reach the same actor through [`NullActorFactory::actor`] to seed
/// balances or inspect recorded transfers.
#[derive(Default)]
pub struct NullActorFactory {
    actors: Mutex<HashMap<CanisterId, Arc<NullLedgerActor>>>,
    collections: Mutex<HashMap<CanisterId, Arc<NullNftLedger>>>,
    kinds: Mutex<HashMap<CanisterId, ActorKind>>,
    failing: Mutex<HashMap<CanisterId, RemoteError>>,
    creates: AtomicUsize,
}

impl NullActorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The actor for `canister`, created on first use.
    pub fn actor(&self, canister: &CanisterId) -> Arc<NullLedgerActor> {
        lock(&self.actors).entry(canister.clone()).or_default().clone()
    }

    pub fn collection(&self, canister: &CanisterId) -> Arc<NullNftLedger> {
        lock(&self.collections).entry(canister.clone()).or_default().clone()
    }

    /// Make every `create` for `canister` fail with `error`.
    pub fn fail_canister(&self, canister: &CanisterId, error: RemoteError) {
        lock(&self.failing).insert(canister.clone(), error);
    }

    pub fn restore_canister(&self, canister: &CanisterId) {
        lock(&self.failing).remove(canister);
    }

    /// The interface the last `create` for `canister` asked for.
    pub fn kind_of(&self, canister: &CanisterId) -> Option<ActorKind> {
        lock(&self.kinds).get(canister).copied()
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn check(&self, canister: &CanisterId) -> Result<(), RemoteError> {
        match lock(&self.failing).get(canister) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ActorFactory for NullActorFactory {
    async fn create(
        &self,
        _agent: Arc<dyn Agent>,
        canister: &CanisterId,
        kind: ActorKind,
    ) -> Result<Arc<dyn LedgerActor>, RemoteError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check(canister)?;
        lock(&self.kinds).insert(canister.clone(), kind);
        Ok(self.actor(canister))
    }

    async fn create_nft(
        &self,
        _agent: Arc<dyn Agent>,
        canister: &CanisterId,
    ) -> Result<Arc<dyn NftLedger>, RemoteError> {
        self.check(canister)?;
        Ok(self.collection(canister))
    }
}
