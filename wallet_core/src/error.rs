use custody_cache::CacheError;
use custody_crypto::VaultError;
use custody_types::{CanisterId, ErrorKind, ValidationError};
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("wallet is locked")]
    Locked,

    #[error("decrypted key does not match the wallet's public key")]
    KeyMismatch,

    #[error("unknown token: {0}")]
    UnknownToken(CanisterId),

    #[error("no ledger actor bound for {0}")]
    ActorUnavailable(CanisterId),

    #[error("the native ledger token cannot be removed")]
    NativeTokenRequired,

    #[error("no wallet at derivation index {0}")]
    UnknownWallet(u32),

    #[error("the last wallet of a keyring cannot be deleted")]
    LastWallet,

    #[error("invalid wallet record: {0}")]
    Record(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::Locked
            | Self::UnknownToken(_)
            | Self::NativeTokenRequired
            | Self::UnknownWallet(_)
            | Self::LastWallet => ErrorKind::Validation,
            Self::Vault(e) => e.kind(),
            Self::KeyMismatch => ErrorKind::Crypto,
            Self::Remote(e) => e.kind(),
            Self::ActorUnavailable(_) => ErrorKind::Network,
            Self::Cache(_) | Self::Record(_) | Self::Task(_) => ErrorKind::Storage,
        }
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
