//! Shared collaborators handed to every wallet at construction.

use std::sync::Arc;

use custody_cache::{BlobCache, LazyCache, TtlCache};
use custody_types::{NftRecord, TokenInfo};

use crate::config::WalletConfig;
use crate::offline::OfflineLedger;
use crate::remote::{ActorFactory, Agent, AgentConnector};

/// Everything a wallet needs from the outside world.
///
/// One context is shared (behind an `Arc`) by all wallets of a process, so the
/// caches it holds are process-wide.
pub struct WalletContext {
    pub config: WalletConfig,
    pub connector: Arc<dyn AgentConnector>,
    pub actors: Arc<dyn ActorFactory>,
    /// Token metadata, keyed `token:<canisterId>`.
    pub metadata: TtlCache<TokenInfo>,
    /// NFT listings, keyed `<principal>:nft:<canisterId>`.
    pub nft_listings: TtlCache<Vec<NftRecord>>,
    /// Connected agents, keyed `<principal>:agent`.
    pub agents: LazyCache<Arc<dyn Agent>>,
    /// Durable storage for the keyring and NFT thumbnails.
    pub blobs: BlobCache,
}

impl WalletContext {
    pub fn new(
        config: WalletConfig,
        connector: Arc<dyn AgentConnector>,
        actors: Arc<dyn ActorFactory>,
        blobs: BlobCache,
    ) -> Self {
        Self {
            config,
            connector,
            actors,
            metadata: TtlCache::new(),
            nft_listings: TtlCache::new(),
            agents: LazyCache::new(),
            blobs,
        }
    }

    /// A context whose network is always unreachable.
    pub fn offline(config: WalletConfig, blobs: BlobCache) -> Self {
        let ledger = Arc::new(OfflineLedger);
        Self::new(config, ledger.clone(), ledger, blobs)
    }
}
