//! Fungible token handles.

use std::sync::Arc;

use custody_types::{CanisterId, Destination, TokenAmount, TokenMetadata, ValidationError};
use tokio::sync::Mutex;

use crate::error::WalletError;
use crate::remote::{ActorKind, LedgerActor, TransferArgs};

/// One fungible token registered in a wallet.
///
/// The remote actor is transient: it is bound on unlock and dropped on lock.
/// The memo counter starts at zero every session and is advanced before each
/// transfer is dispatched; its lock is held for the whole dispatch, so
/// transfers on one handle are serialized.
pub struct TokenHandle {
    canister_id: CanisterId,
    index_canister_id: Option<CanisterId>,
    kind: ActorKind,
    pub(crate) metadata: TokenMetadata,
    actor: Option<Arc<dyn LedgerActor>>,
    memo: Mutex<u64>,
}

impl TokenHandle {
    pub fn new(
        canister_id: CanisterId,
        index_canister_id: Option<CanisterId>,
        kind: ActorKind,
        metadata: TokenMetadata,
    ) -> Self {
        Self {
            canister_id,
            index_canister_id,
            kind,
            metadata,
            actor: None,
            memo: Mutex::new(0),
        }
    }

    pub fn canister_id(&self) -> &CanisterId {
        &self.canister_id
    }

    pub fn index_canister_id(&self) -> Option<&CanisterId> {
        self.index_canister_id.as_ref()
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn is_bound(&self) -> bool {
        self.actor.is_some()
    }

    pub(crate) fn actor(&self) -> Option<Arc<dyn LedgerActor>> {
        self.actor.clone()
    }

    pub(crate) fn bind(&mut self, actor: Arc<dyn LedgerActor>) {
        self.actor = Some(actor);
    }

    /// Drop the actor and start a fresh memo sequence.
    pub(crate) fn unbind(&mut self) {
        self.actor = None;
        *self.memo.get_mut() = 0;
    }

    /// The last memo handed out this session (0 before the first transfer).
    pub async fn last_memo(&self) -> u64 {
        *self.memo.lock().await
    }

    pub async fn balance(&self) -> Result<TokenAmount, WalletError> {
        let actor = self.bound_actor()?;
        Ok(actor.balance().await?)
    }

    /// Validate, assign the next memo, then dispatch. Returns the ledger block index.
    pub async fn transfer(&self, to: Destination, amount: TokenAmount) -> Result<u64, WalletError> {
        let to = self.resolve_destination(to)?;
        if amount.is_zero() {
            return Err(ValidationError::Other("transfer amount must be greater than zero".into()).into());
        }
        let actor = self.bound_actor()?;

        let mut memo = self.memo.lock().await;
        *memo += 1;
        let args = TransferArgs {
            to,
            amount,
            fee: TokenAmount::new(self.metadata.fee),
            memo: *memo,
        };
        tracing::debug!(canister = %self.canister_id, memo = *memo, "dispatching transfer");
        Ok(actor.transfer(args).await?)
    }

    /// Native-ledger transfers address account identifiers; other ledgers
    /// address principals and cannot take a raw account identifier.
    fn resolve_destination(&self, to: Destination) -> Result<Destination, ValidationError> {
        match (self.kind, to) {
            (ActorKind::NativeLedger, to) => Ok(Destination::Account(to.account_identifier())),
            (ActorKind::Fungible, Destination::Principal(p)) => Ok(Destination::Principal(p)),
            (ActorKind::Fungible, Destination::Account(a)) => Err(ValidationError::InvalidDestination(
                format!("{a}: {} accepts principals only", self.canister_id),
            )),
        }
    }

    fn bound_actor(&self) -> Result<Arc<dyn LedgerActor>, WalletError> {
        self.actor
            .clone()
            .ok_or_else(|| WalletError::ActorUnavailable(self.canister_id.clone()))
    }
}

impl std::fmt::Debug for TokenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenHandle")
            .field("canister_id", &self.canister_id)
            .field("kind", &self.kind)
            .field("symbol", &self.metadata.symbol)
            .field("bound", &self.actor.is_some())
            .finish()
    }
}
