//! Wallet aggregate for the custody wallet core.
//!
//! Provides everything a wallet front end needs:
//! - The unlock state machine (decrypt, connect agent, bind ledger actors)
//! - Fungible token handles with per-session memo counters
//! - NFT holdings, collection sync and cached thumbnails
//! - Persisted wallet records and the multi-wallet keyring
//!
//! Remote ledgers are reached only through the collaborator traits in
//! [`remote`]; [`HttpAgentConnector`] and [`OfflineLedger`] are the shipped
//! implementations.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod keyring;
pub mod offline;
pub mod record;
pub mod remote;
pub mod result;
pub mod token;
pub mod wallet;

pub use agent::{HttpAgent, HttpAgentConnector};
pub use config::WalletConfig;
pub use context::WalletContext;
pub use error::WalletError;
pub use keyring::{Keyring, KeyringRecord};
pub use offline::OfflineLedger;
pub use record::{TokenRecord, WalletRecord};
pub use remote::{
    ActorFactory, ActorKind, Agent, AgentConnector, LedgerActor, NftLedger, RemoteError,
    TransferArgs,
};
pub use result::CallResult;
pub use token::TokenHandle;
pub use wallet::{SessionState, Wallet};
