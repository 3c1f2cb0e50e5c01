//! Network identifier.

use serde::{Deserialize, Serialize};

use crate::principal::{CanisterId, Principal};
use crate::token::TokenMetadata;

/// Identifies which network (blockchain id) a wallet belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The production network.
    #[default]
    Mainnet,
    /// A local development replica.
    Local,
}

/// Raw bytes of the native ledger canister, `ryjl3-tyaaa-aaaaa-aaaba-cai`.
const LEDGER_CANISTER_BYTES: [u8; 10] = [0, 0, 0, 0, 0, 0, 0, 2, 1, 1];
/// Raw bytes of the native ledger index canister, `qhbym-qaaaa-aaaaa-aaafq-cai`.
const INDEX_CANISTER_BYTES: [u8; 10] = [0, 0, 0, 0, 0, 0, 0, 11, 1, 1];

impl Network {
    /// Canister id of the network's native ledger.
    pub fn ledger_canister_id(&self) -> CanisterId {
        Principal::from_static(&LEDGER_CANISTER_BYTES)
    }

    /// Canister id of the native ledger's transaction index.
    pub fn index_canister_id(&self) -> CanisterId {
        Principal::from_static(&INDEX_CANISTER_BYTES)
    }

    /// Metadata of the native token.
    pub fn native_token(&self) -> TokenMetadata {
        TokenMetadata {
            name: "Internet Computer".to_string(),
            symbol: "ICP".to_string(),
            decimals: 8,
            fee: 10_000,
        }
    }

    /// Default agent host for this network.
    pub fn default_host(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://icp-api.io",
            Self::Local => "http://127.0.0.1:4943",
        }
    }

    /// Human-readable name, also the persisted blockchain id.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Local => "local",
        }
    }
}
