//! A ledger backend that is never reachable.

use std::sync::Arc;

use async_trait::async_trait;
use custody_crypto::SessionIdentity;
use custody_types::CanisterId;

use crate::remote::{ActorFactory, ActorKind, Agent, AgentConnector, LedgerActor, NftLedger, RemoteError};

/// Connector and actor factory for running without a network.
///
/// Unlocking against it always ends `Degraded`, leaving the wallet
/// inspectable offline.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineLedger;

fn offline() -> RemoteError {
    RemoteError::Unreachable("offline mode".to_string())
}

#[async_trait]
impl AgentConnector for OfflineLedger {
    async fn connect(
        &self,
        _identity: Arc<SessionIdentity>,
        _host: &str,
    ) -> Result<Arc<dyn Agent>, RemoteError> {
        Err(offline())
    }
}

#[async_trait]
impl ActorFactory for OfflineLedger {
    async fn create(
        &self,
        _agent: Arc<dyn Agent>,
        _canister: &CanisterId,
        _kind: ActorKind,
    ) -> Result<Arc<dyn LedgerActor>, RemoteError> {
        Err(offline())
    }

    async fn create_nft(
        &self,
        _agent: Arc<dyn Agent>,
        _canister: &CanisterId,
    ) -> Result<Arc<dyn NftLedger>, RemoteError> {
        Err(offline())
    }
}
