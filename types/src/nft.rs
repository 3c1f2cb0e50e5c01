//! Non-fungible token records.

use serde::{Deserialize, Serialize};

use crate::principal::CanisterId;

/// One NFT held by a wallet, as persisted and as listed by an NFT ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftRecord {
    /// Token id within its collection.
    pub id: String,
    /// Canister hosting the collection.
    pub canister_id: CanisterId,
    /// Token standard (e.g. `"EXT"`, `"ICRC-7"`).
    pub standard: String,
    /// Collection display name.
    pub collection: String,
    /// Thumbnail URL, if the collection provides one.
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl NftRecord {
    /// Key identifying this NFT inside a wallet: `<canisterId>:<tokenId>`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.canister_id, self.id)
    }
}
