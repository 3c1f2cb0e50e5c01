//! Boundary to the remote ledger network.
//!
//! The wire protocol lives outside this crate. Wallets only see these traits:
//! an [`AgentConnector`] yields an [`Agent`] bound to the session identity, and
//! an [`ActorFactory`] turns an agent plus a canister id into ledger actors.

use std::sync::Arc;

use async_trait::async_trait;
use custody_crypto::SessionIdentity;
use custody_types::{CanisterId, Destination, ErrorKind, NftRecord, Principal, TokenAmount, TokenInfo};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network failure or timeout. Recoverable.
    #[error("remote unreachable: {0}")]
    Unreachable(String),

    /// The canister answered with an explicit failure.
    #[error("remote call rejected: {0}")]
    Rejected(String),

    #[error("not supported by remote: {0}")]
    Unsupported(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unreachable(_) => ErrorKind::Network,
            Self::Rejected(_) | Self::Unsupported(_) => ErrorKind::RemoteCall,
        }
    }
}

/// Which actor interface a canister speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorKind {
    /// The network's native ledger (account-identifier addressed).
    NativeLedger,
    /// Any other fungible token ledger (principal addressed).
    Fungible,
}

/// A network agent bound to one identity.
pub trait Agent: Send + Sync {
    fn principal(&self) -> &Principal;
    fn host(&self) -> &str;
}

#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(
        &self,
        identity: Arc<SessionIdentity>,
        host: &str,
    ) -> Result<Arc<dyn Agent>, RemoteError>;
}

#[async_trait]
pub trait ActorFactory: Send + Sync {
    async fn create(
        &self,
        agent: Arc<dyn Agent>,
        canister: &CanisterId,
        kind: ActorKind,
    ) -> Result<Arc<dyn LedgerActor>, RemoteError>;

    async fn create_nft(
        &self,
        agent: Arc<dyn Agent>,
        canister: &CanisterId,
    ) -> Result<Arc<dyn NftLedger>, RemoteError>;
}

/// A transfer as dispatched to a ledger actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferArgs {
    pub to: Destination,
    pub amount: TokenAmount,
    pub fee: TokenAmount,
    pub memo: u64,
}

/// A fungible token ledger as seen by the bound identity.
#[async_trait]
pub trait LedgerActor: Send + Sync {
    /// Balance of the bound identity's default account.
    async fn balance(&self) -> Result<TokenAmount, RemoteError>;

    /// Submit a transfer, returning the ledger's block index.
    async fn transfer(&self, args: TransferArgs) -> Result<u64, RemoteError>;

    async fn metadata(&self) -> Result<TokenInfo, RemoteError>;
}

#[async_trait]
pub trait NftLedger: Send + Sync {
    async fn tokens_of(&self, owner: &Principal) -> Result<Vec<NftRecord>, RemoteError>;
}
