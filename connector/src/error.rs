use custody_types::{ErrorKind, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("unauthorized sender: {0}")]
    Unauthorized(String),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("connection rejected: {0}")]
    Rejected(String),

    #[error("request timed out")]
    TimedOut,

    #[error("vault is not ready")]
    VaultNotReady,

    #[error("vault is unavailable")]
    VaultUnavailable,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("response channel closed")]
    Disconnected,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ConnectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) | Self::Malformed(_) | Self::Rejected(_) => ErrorKind::Protocol,
            Self::TimedOut
            | Self::VaultNotReady
            | Self::VaultUnavailable
            | Self::Transport(_)
            | Self::Disconnected => ErrorKind::Network,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }
}
