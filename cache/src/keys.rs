//! Cache key namespaces.
//!
//! Textual principals and canister ids never contain `:`, so the namespaces
//! below cannot collide with each other.

use custody_types::{CanisterId, Principal};

/// Blob key under which the keyring is persisted.
pub const KEYRING_KEY: &str = "keyring";

/// Token metadata: `token:<canisterId>`.
pub fn token_key(canister: &CanisterId) -> String {
    format!("token:{canister}")
}

/// NFT thumbnail: `nft:<canisterId>:<tokenId>`.
pub fn nft_key(canister: &CanisterId, token_id: &str) -> String {
    format!("nft:{canister}:{token_id}")
}

/// A principal's NFT listing in one collection: `<principal>:nft:<canisterId>`.
pub fn principal_nft_key(owner: &Principal, canister: &CanisterId) -> String {
    format!("{owner}:nft:{canister}")
}

/// The network agent bound to a principal: `<principal>:agent`.
pub fn agent_key(owner: &Principal) -> String {
    format!("{owner}:agent")
}
