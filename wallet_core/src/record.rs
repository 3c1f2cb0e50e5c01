//! Persisted wallet form.
//!
//! Drops live actor handles, balances and session state. Secrets stay sealed.

use std::collections::BTreeMap;

use custody_crypto::EncryptedSecret;
use custody_types::{CanisterId, Network, NftRecord, PublicKey, TokenMetadata, DEFAULT_DECIMALS, DEFAULT_FEE};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub name: String,
    pub blockchain_id: Network,
    #[serde(default)]
    pub derivation_index: u32,
    pub public_key: PublicKey,
    pub encrypted_secret: EncryptedSecret,
    #[serde(default)]
    pub tokens: BTreeMap<CanisterId, TokenRecord>,
    #[serde(default)]
    pub nfts: BTreeMap<String, NftRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_fee")]
    pub fee: u128,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_canister_id: Option<CanisterId>,
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_fee() -> u128 {
    DEFAULT_FEE
}

impl TokenRecord {
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            fee: self.fee,
        }
    }

    pub fn from_metadata(metadata: &TokenMetadata, index_canister_id: Option<CanisterId>) -> Self {
        Self {
            name: metadata.name.clone(),
            symbol: metadata.symbol.clone(),
            decimals: metadata.decimals,
            fee: metadata.fee,
            index_canister_id,
        }
    }
}
