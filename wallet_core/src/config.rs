//! Wallet configuration.

use std::time::Duration;

use custody_cache::CacheConfig;
use custody_crypto::KdfParams;
use custody_types::Network;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub network: Network,

    /// Agent host URL. Defaults to the network's public boundary node.
    #[serde(default)]
    pub host: Option<String>,

    /// How long unlock waits for the agent before going offline.
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,

    /// KDF used when sealing new secrets. Existing secrets keep their own.
    #[serde(default)]
    pub kdf: KdfParams,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_agent_timeout_ms() -> u64 {
    10_000
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            host: None,
            agent_timeout_ms: default_agent_timeout_ms(),
            kdf: KdfParams::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl WalletConfig {
    pub fn host(&self) -> String {
        self.host
            .clone()
            .unwrap_or_else(|| self.network.default_host().to_string())
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WalletConfig::default();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.agent_timeout(), Duration::from_secs(10));
        assert_eq!(config.host(), "https://icp-api.io");
        assert_eq!(config.kdf.iterations(), 100_000);
    }

    #[test]
    fn explicit_host_wins() {
        let config = WalletConfig {
            network: Network::Local,
            host: Some("http://localhost:8080".into()),
            ..WalletConfig::default()
        };
        assert_eq!(config.host(), "http://localhost:8080");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: WalletConfig = toml::from_str(
            r#"
            network = "local"
            agent_timeout_ms = 2500

            [cache]
            nft_ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.network, Network::Local);
        assert_eq!(config.host(), "http://127.0.0.1:4943");
        assert_eq!(config.agent_timeout(), Duration::from_millis(2500));
        assert_eq!(config.cache.nft_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache.metadata_ttl(), Duration::from_secs(3600));
        assert_eq!(config.kdf, KdfParams::default());
    }
}
