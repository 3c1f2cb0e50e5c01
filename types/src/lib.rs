//! Fundamental types for the custody wallet core.
//!
//! This crate defines the value types shared across every other crate in the workspace:
//! principals and canister ids, account identifiers, token amounts and metadata,
//! network ids, timestamps, and the error taxonomy.

pub mod account;
pub mod amount;
pub mod error;
pub mod keys;
pub mod network;
pub mod nft;
pub mod principal;
pub mod time;
pub mod token;

pub use account::{AccountIdentifier, Destination, Subaccount};
pub use amount::TokenAmount;
pub use error::{ErrorKind, ValidationError};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::Network;
pub use nft::NftRecord;
pub use principal::{CanisterId, Principal};
pub use time::Timestamp;
pub use token::{TokenInfo, TokenMetadata, DEFAULT_DECIMALS, DEFAULT_FEE};
