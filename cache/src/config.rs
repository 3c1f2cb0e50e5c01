//! Cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long fetched token metadata stays fresh.
    #[serde(default = "default_metadata_ttl_secs")]
    pub metadata_ttl_secs: u64,

    /// How long an NFT collection listing stays fresh.
    #[serde(default = "default_nft_ttl_secs")]
    pub nft_ttl_secs: u64,

    /// LMDB map size for the blob store, in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,
}

fn default_metadata_ttl_secs() -> u64 {
    3600
}

fn default_nft_ttl_secs() -> u64 {
    300
}

fn default_map_size() -> usize {
    64 * 1024 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_secs: default_metadata_ttl_secs(),
            nft_ttl_secs: default_nft_ttl_secs(),
            map_size: default_map_size(),
        }
    }
}

impl CacheConfig {
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    pub fn nft_ttl(&self) -> Duration {
        Duration::from_secs(self.nft_ttl_secs)
    }
}
