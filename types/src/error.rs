//! Error taxonomy shared across crates.

use thiserror::Error;

/// Coarse classification of every failure the core can surface.
///
/// Crate-level error enums map onto this through their `kind()` method so
/// callers can decide on recovery (prompt for password, show offline
/// indicator, drop message) without matching crate-specific variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, rejected before any I/O.
    Validation,
    /// KDF or AEAD failure. Wrong password and tampering are not told apart.
    Crypto,
    /// Remote agent or actor unreachable or timed out.
    Network,
    /// Unauthorized sender, malformed message, stale or duplicate correlation id.
    Protocol,
    /// The ledger actor answered with an explicit failure.
    RemoteCall,
    /// Persistent storage failure.
    Storage,
}

/// Malformed user or caller input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("invalid canister id: {0}")]
    InvalidCanisterId(String),

    #[error("invalid account identifier: {0}")]
    InvalidAccountId(String),

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("password does not meet the strength policy")]
    WeakPassword,

    #[error("{0}")]
    Other(String),
}
