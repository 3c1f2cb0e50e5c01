//! The wallet aggregate and its unlock state machine.
//!
//! ```text
//! Locked -> Unlocking -> ConnectingAgent -> SyncingTokens -> Ready
//!                              |                 |
//!                              +---> Degraded <--+
//! ```
//!
//! A failed decrypt returns the wallet to `Locked`. Network trouble while
//! connecting the agent or binding actors lands in `Degraded`: the wallet is
//! unlocked and inspectable, but remote calls fail until [`Wallet::build`]
//! succeeds.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use custody_cache::keys::{agent_key, nft_key, principal_nft_key, token_key};
use custody_crypto::{decrypt, encrypt_with, EncryptedSecret, Identity, SessionIdentity};
use custody_types::{
    AccountIdentifier, CanisterId, Destination, ErrorKind, Network, NftRecord, Principal,
    PrivateKey, TokenAmount, TokenInfo, TokenMetadata,
};
use tokio::sync::watch;
use zeroize::Zeroizing;

use crate::context::WalletContext;
use crate::error::WalletError;
use crate::record::{TokenRecord, WalletRecord};
use crate::remote::{ActorKind, Agent, RemoteError};
use crate::result::CallResult;
use crate::token::TokenHandle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Locked,
    Unlocking,
    ConnectingAgent,
    SyncingTokens,
    Ready,
    Degraded { reason: String },
}

impl SessionState {
    /// Ready or degraded: the secret is open for this session.
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Ready | Self::Degraded { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Unlocking => f.write_str("unlocking"),
            Self::ConnectingAgent => f.write_str("connecting agent"),
            Self::SyncingTokens => f.write_str("syncing tokens"),
            Self::Ready => f.write_str("ready"),
            Self::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

struct Session {
    identity: Arc<SessionIdentity>,
    agent: Option<Arc<dyn Agent>>,
}

pub struct Wallet {
    ctx: Arc<WalletContext>,
    name: String,
    network: Network,
    derivation_index: u32,
    identity: Identity,
    secret: EncryptedSecret,
    tokens: BTreeMap<CanisterId, TokenHandle>,
    nfts: BTreeMap<String, NftRecord>,
    session: Option<Session>,
    state: watch::Sender<SessionState>,
}

impl Wallet {
    /// Create a locked wallet for `keys`, sealing its secret under `password`.
    pub async fn new(
        ctx: Arc<WalletContext>,
        name: impl Into<String>,
        derivation_index: u32,
        keys: &SessionIdentity,
        password: &str,
    ) -> Result<Self, WalletError> {
        let secret = seal_bytes(&ctx, keys.secret_bytes(), password).await?;
        let network = ctx.config.network;
        let mut wallet = Self::assemble(
            ctx,
            name.into(),
            network,
            derivation_index,
            keys.identity().clone(),
            secret,
        );
        wallet.ensure_native_token();
        tracing::info!(name = %wallet.name, principal = %wallet.identity.principal, "wallet created");
        Ok(wallet)
    }

    /// Rebuild a locked wallet from its persisted form.
    pub fn from_record(ctx: Arc<WalletContext>, record: WalletRecord) -> Self {
        let identity = Identity::from_public_key(record.public_key);
        let mut wallet = Self::assemble(
            ctx,
            record.name,
            record.blockchain_id,
            record.derivation_index,
            identity,
            record.encrypted_secret,
        );
        let ledger = wallet.network.ledger_canister_id();
        for (canister, token) in record.tokens {
            let kind = if canister == ledger {
                ActorKind::NativeLedger
            } else {
                ActorKind::Fungible
            };
            let handle = TokenHandle::new(
                canister.clone(),
                token.index_canister_id.clone(),
                kind,
                token.metadata(),
            );
            wallet.tokens.insert(canister, handle);
        }
        wallet.nfts = record.nfts;
        wallet.ensure_native_token();
        wallet
    }

    pub fn to_record(&self) -> WalletRecord {
        WalletRecord {
            name: self.name.clone(),
            blockchain_id: self.network,
            derivation_index: self.derivation_index,
            public_key: self.identity.public_key.clone(),
            encrypted_secret: self.secret.clone(),
            tokens: self
                .tokens
                .iter()
                .map(|(canister, handle)| {
                    let record = TokenRecord::from_metadata(
                        handle.metadata(),
                        handle.index_canister_id().cloned(),
                    );
                    (canister.clone(), record)
                })
                .collect(),
            nfts: self.nfts.clone(),
        }
    }

    /// JSON form of [`to_record`](Self::to_record).
    pub fn serialize(&self) -> Result<String, WalletError> {
        serde_json::to_string(&self.to_record()).map_err(|e| WalletError::Record(e.to_string()))
    }

    /// Inverse of [`serialize`](Self::serialize). The wallet comes back locked
    /// with no actors bound.
    pub fn deserialize(ctx: Arc<WalletContext>, json: &str) -> Result<Self, WalletError> {
        let record: WalletRecord =
            serde_json::from_str(json).map_err(|e| WalletError::Record(e.to_string()))?;
        Ok(Self::from_record(ctx, record))
    }

    fn assemble(
        ctx: Arc<WalletContext>,
        name: String,
        network: Network,
        derivation_index: u32,
        identity: Identity,
        secret: EncryptedSecret,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Locked);
        Self {
            ctx,
            name,
            network,
            derivation_index,
            identity,
            secret,
            tokens: BTreeMap::new(),
            nfts: BTreeMap::new(),
            session: None,
            state,
        }
    }

    fn ensure_native_token(&mut self) {
        let ledger = self.network.ledger_canister_id();
        if !self.tokens.contains_key(&ledger) {
            let handle = TokenHandle::new(
                ledger.clone(),
                Some(self.network.index_canister_id()),
                ActorKind::NativeLedger,
                self.network.native_token(),
            );
            self.tokens.insert(ledger, handle);
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn derivation_index(&self) -> u32 {
        self.derivation_index
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn principal(&self) -> &Principal {
        &self.identity.principal
    }

    pub fn account_id(&self) -> &AccountIdentifier {
        &self.identity.account_id
    }

    pub fn encrypted_secret(&self) -> &EncryptedSecret {
        &self.secret
    }

    pub fn token(&self, canister: &CanisterId) -> Option<&TokenHandle> {
        self.tokens.get(canister)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenHandle> {
        self.tokens.values()
    }

    pub fn nft(&self, key: &str) -> Option<&NftRecord> {
        self.nfts.get(key)
    }

    pub fn nfts(&self) -> impl Iterator<Item = &NftRecord> {
        self.nfts.values()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!(wallet = %self.name, %state, "session state");
        self.state.send_replace(state);
    }

    fn agent(&self) -> Option<Arc<dyn Agent>> {
        self.session.as_ref().and_then(|s| s.agent.clone())
    }

    // ── Session ─────────────────────────────────────────────────────────

    /// Decrypt the secret, connect an agent and bind every token's actor.
    ///
    /// A wrong password fails with a crypto error and leaves the wallet
    /// locked. Network failures do not fail the unlock; they end in
    /// [`SessionState::Degraded`].
    pub async fn unlock(&mut self, password: &str) -> Result<SessionState, WalletError> {
        if self.session.is_some() {
            return Ok(self.state());
        }
        self.set_state(SessionState::Unlocking);

        match self.open_secret(password).await {
            Ok(identity) => Ok(self.start_session(identity).await),
            Err(e) => {
                tracing::warn!(wallet = %self.name, error = %e, "unlock failed");
                self.set_state(SessionState::Locked);
                Err(e)
            }
        }
    }

    /// Unlock with an identity derived elsewhere (from the keyring's phrase).
    pub(crate) async fn unlock_with(
        &mut self,
        identity: SessionIdentity,
    ) -> Result<SessionState, WalletError> {
        if self.session.is_some() {
            return Ok(self.state());
        }
        if identity.public_key() != &self.identity.public_key {
            return Err(WalletError::KeyMismatch);
        }
        self.set_state(SessionState::Unlocking);
        Ok(self.start_session(identity).await)
    }

    async fn open_secret(&self, password: &str) -> Result<SessionIdentity, WalletError> {
        let secret = self.secret.clone();
        let password = Zeroizing::new(password.to_string());
        let plaintext = tokio::task::spawn_blocking(move || decrypt(&secret, &password)).await??;

        let bytes: [u8; 32] = plaintext
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::KeyMismatch)?;
        let identity = SessionIdentity::from_private_key(PrivateKey(bytes));
        if identity.public_key() != &self.identity.public_key {
            return Err(WalletError::KeyMismatch);
        }
        Ok(identity)
    }

    async fn start_session(&mut self, identity: SessionIdentity) -> SessionState {
        let identity = Arc::new(identity);
        self.set_state(SessionState::ConnectingAgent);
        let connected = self.connect_agent(identity.clone()).await;

        let state = match connected {
            Ok(agent) => {
                self.session = Some(Session {
                    identity,
                    agent: Some(agent),
                });
                self.set_state(SessionState::SyncingTokens);
                self.sync_tokens(false).await
            }
            Err(e) => {
                tracing::warn!(wallet = %self.name, error = %e, "agent unavailable, continuing offline");
                self.session = Some(Session {
                    identity,
                    agent: None,
                });
                SessionState::Degraded {
                    reason: e.to_string(),
                }
            }
        };

        tracing::info!(wallet = %self.name, principal = %self.identity.principal, %state, "wallet unlocked");
        self.set_state(state.clone());
        state
    }

    /// Reconnect the agent if needed and rebind every token's actor.
    ///
    /// Used after [`deserialize`](Self::deserialize) plus unlock, or to leave
    /// `Degraded` once the network is back.
    pub async fn build(&mut self) -> Result<SessionState, WalletError> {
        let identity = match &self.session {
            Some(session) => session.identity.clone(),
            None => return Err(WalletError::Locked),
        };

        if self.agent().is_none() {
            self.set_state(SessionState::ConnectingAgent);
            match self.connect_agent(identity.clone()).await {
                Ok(agent) => {
                    self.session = Some(Session {
                        identity,
                        agent: Some(agent),
                    });
                }
                Err(e) => {
                    let state = SessionState::Degraded {
                        reason: e.to_string(),
                    };
                    self.set_state(state.clone());
                    return Ok(state);
                }
            }
        }

        self.set_state(SessionState::SyncingTokens);
        let state = self.sync_tokens(true).await;
        self.set_state(state.clone());
        Ok(state)
    }

    async fn connect_agent(
        &self,
        identity: Arc<SessionIdentity>,
    ) -> Result<Arc<dyn Agent>, RemoteError> {
        let key = agent_key(identity.principal());
        let connector = self.ctx.connector.clone();
        let host = self.ctx.config.host();
        let timeout = self.ctx.config.agent_timeout();

        self.ctx
            .agents
            .get_or_try_init(&key, move || async move {
                tokio::time::timeout(timeout, connector.connect(identity, &host))
                    .await
                    .map_err(|_| {
                        RemoteError::Unreachable(format!(
                            "agent did not connect within {} ms",
                            timeout.as_millis()
                        ))
                    })?
            })
            .await
    }

    /// Bind actors for every token (or only unbound ones). Failures are
    /// isolated per token. Ends `Degraded` only if every attempt failed for
    /// network reasons.
    async fn sync_tokens(&mut self, rebuild: bool) -> SessionState {
        let Some(agent) = self.agent() else {
            return SessionState::Degraded {
                reason: "no agent connected".to_string(),
            };
        };

        let targets: Vec<(CanisterId, ActorKind)> = self
            .tokens
            .values()
            .filter(|handle| rebuild || !handle.is_bound())
            .map(|handle| (handle.canister_id().clone(), handle.kind()))
            .collect();

        let actors = self.ctx.actors.clone();
        let results = futures::future::join_all(targets.iter().map(|(canister, kind)| {
            let actors = actors.clone();
            let agent = agent.clone();
            async move { actors.create(agent, canister, *kind).await }
        }))
        .await;

        let mut unreachable = 0;
        for ((canister, _), result) in targets.iter().zip(results) {
            match result {
                Ok(actor) => {
                    if let Some(handle) = self.tokens.get_mut(canister) {
                        handle.bind(actor);
                    }
                }
                Err(e) => {
                    tracing::warn!(%canister, error = %e, "token binding failed");
                    if e.kind() == ErrorKind::Network {
                        unreachable += 1;
                    }
                }
            }
        }

        if !targets.is_empty() && unreachable == targets.len() {
            SessionState::Degraded {
                reason: "no ledger reachable".to_string(),
            }
        } else {
            SessionState::Ready
        }
    }

    /// Drop the session identity, the agent and every actor binding.
    pub fn lock(&mut self) {
        if let Some(session) = self.session.take() {
            self.ctx.agents.remove(&agent_key(session.identity.principal()));
        }
        for handle in self.tokens.values_mut() {
            handle.unbind();
        }
        self.set_state(SessionState::Locked);
        tracing::info!(wallet = %self.name, "wallet locked");
    }

    // ── Tokens ──────────────────────────────────────────────────────────

    /// Register a token, or update the metadata of one already registered.
    ///
    /// Idempotent. An existing handle keeps its bound actor unless `rebuild`
    /// is set. Returns whether the token was newly added.
    pub async fn add_token(&mut self, canister: CanisterId, info: TokenInfo, rebuild: bool) -> bool {
        let added = match self.tokens.get_mut(&canister) {
            Some(handle) => {
                handle.metadata = info.apply_to(&handle.metadata);
                tracing::debug!(%canister, "token metadata updated");
                false
            }
            None => {
                let handle = self.new_handle(canister.clone(), info);
                tracing::info!(%canister, symbol = handle.symbol(), "token added");
                self.tokens.insert(canister.clone(), handle);
                true
            }
        };

        if added || rebuild {
            if let Some(agent) = self.agent() {
                self.bind_token(&canister, agent).await;
            }
        }
        added
    }

    fn new_handle(&self, canister: CanisterId, info: TokenInfo) -> TokenHandle {
        if canister == self.network.ledger_canister_id() {
            let metadata = info.apply_to(&self.network.native_token());
            TokenHandle::new(
                canister,
                Some(self.network.index_canister_id()),
                ActorKind::NativeLedger,
                metadata,
            )
        } else {
            let metadata = info.resolve(&canister.to_text());
            TokenHandle::new(canister, None, ActorKind::Fungible, metadata)
        }
    }

    async fn bind_token(&mut self, canister: &CanisterId, agent: Arc<dyn Agent>) {
        let Some(kind) = self.tokens.get(canister).map(TokenHandle::kind) else {
            return;
        };
        match self.ctx.actors.create(agent, canister, kind).await {
            Ok(actor) => {
                if let Some(handle) = self.tokens.get_mut(canister) {
                    handle.bind(actor);
                }
            }
            Err(e) => tracing::warn!(%canister, error = %e, "token binding failed"),
        }
    }

    /// Unregister a token. The native ledger token always stays.
    pub fn remove_token(&mut self, canister: &CanisterId) -> Result<TokenHandle, WalletError> {
        if *canister == self.network.ledger_canister_id() {
            return Err(WalletError::NativeTokenRequired);
        }
        let handle = self
            .tokens
            .remove(canister)
            .ok_or_else(|| WalletError::UnknownToken(canister.clone()))?;
        self.ctx.metadata.invalidate(&token_key(canister));
        tracing::info!(%canister, "token removed");
        Ok(handle)
    }

    /// Fetch metadata from the token's ledger (cached per TTL) and apply it.
    pub async fn refresh_metadata(&mut self, canister: &CanisterId) -> Result<TokenMetadata, WalletError> {
        let handle = self
            .tokens
            .get(canister)
            .ok_or_else(|| WalletError::UnknownToken(canister.clone()))?;
        let actor = handle
            .actor()
            .ok_or_else(|| WalletError::ActorUnavailable(canister.clone()))?;

        let ttl = self.ctx.config.cache.metadata_ttl();
        let info = self
            .ctx
            .metadata
            .try_get(&token_key(canister), ttl, move || async move { actor.metadata().await })
            .await?;

        let handle = self
            .tokens
            .get_mut(canister)
            .ok_or_else(|| WalletError::UnknownToken(canister.clone()))?;
        handle.metadata = info.apply_to(&handle.metadata);
        Ok(handle.metadata.clone())
    }

    fn unlocked_token(&self, canister: &CanisterId) -> Result<&TokenHandle, WalletError> {
        if self.session.is_none() {
            return Err(WalletError::Locked);
        }
        self.tokens
            .get(canister)
            .ok_or_else(|| WalletError::UnknownToken(canister.clone()))
    }

    pub async fn balance(&self, canister: &CanisterId) -> CallResult<TokenAmount> {
        let result = match self.unlocked_token(canister) {
            Ok(handle) => handle.balance().await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::warn!(%canister, error = %e, "balance query failed");
        }
        result.into()
    }

    /// Transfer `amount` to `to`, returning the ledger block index.
    pub async fn transfer(
        &self,
        canister: &CanisterId,
        to: Destination,
        amount: TokenAmount,
    ) -> CallResult<u64> {
        let result = match self.unlocked_token(canister) {
            Ok(handle) => handle.transfer(to, amount).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(block) => tracing::info!(%canister, block, "transfer submitted"),
            Err(e) => tracing::warn!(%canister, error = %e, "transfer failed"),
        }
        result.into()
    }

    // ── NFTs ────────────────────────────────────────────────────────────

    /// Add or replace an NFT, returning the one it replaced.
    pub fn add_nft(&mut self, record: NftRecord) -> Option<NftRecord> {
        self.nfts.insert(record.key(), record)
    }

    pub fn remove_nft(&mut self, key: &str) -> Option<NftRecord> {
        self.nfts.remove(key)
    }

    /// List the wallet's holdings in one collection (cached per TTL) and make
    /// them the wallet's NFTs for that collection. Empty listings are not
    /// cached, so a token received meanwhile shows up on the next sync.
    pub async fn sync_nfts(&mut self, canister: &CanisterId) -> Result<Vec<NftRecord>, WalletError> {
        if self.session.is_none() {
            return Err(WalletError::Locked);
        }
        let agent = self
            .agent()
            .ok_or_else(|| RemoteError::Unreachable("no agent connected".to_string()))?;

        let owner = self.identity.principal.clone();
        let key = principal_nft_key(&owner, canister);
        let ttl = self.ctx.config.cache.nft_ttl();
        let actors = self.ctx.actors.clone();
        let collection = canister.clone();

        let listing = self
            .ctx
            .nft_listings
            .try_get_where(&key, ttl, |listing| !listing.is_empty(), move || async move {
                let ledger = actors.create_nft(agent, &collection).await?;
                ledger.tokens_of(&owner).await
            })
            .await?;

        self.nfts.retain(|_, record| record.canister_id != *canister);
        for record in &listing {
            self.nfts.insert(record.key(), record.clone());
        }
        tracing::info!(%canister, count = listing.len(), "nfts synced");
        Ok(listing)
    }

    pub async fn cache_nft_thumbnail(
        &self,
        canister: &CanisterId,
        token_id: &str,
        image: Vec<u8>,
    ) -> Result<(), WalletError> {
        Ok(self.ctx.blobs.save(&nft_key(canister, token_id), image).await?)
    }

    pub async fn load_nft_thumbnail(
        &self,
        canister: &CanisterId,
        token_id: &str,
    ) -> Result<Option<Vec<u8>>, WalletError> {
        let blob = self.ctx.blobs.load(&nft_key(canister, token_id)).await?;
        Ok(blob.map(|b| b.content))
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("name", &self.name)
            .field("principal", &self.identity.principal)
            .field("state", &*self.state.borrow())
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

/// Seal secret bytes under `password` off the async runtime.
pub(crate) async fn seal_bytes(
    ctx: &WalletContext,
    secret: &[u8],
    password: &str,
) -> Result<EncryptedSecret, WalletError> {
    let plaintext = Zeroizing::new(secret.to_vec());
    let password = Zeroizing::new(password.to_string());
    let kdf = ctx.config.kdf.clone();
    Ok(tokio::task::spawn_blocking(move || encrypt_with(&plaintext[..], &password, &kdf)).await??)
}
