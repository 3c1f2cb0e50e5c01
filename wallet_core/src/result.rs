//! Tagged results returned across the wallet boundary.

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// `{"Ok": value}` or `{"Error": reason}`.
///
/// Balance and transfer calls never propagate remote failures as errors;
/// they come back as `Error` with a human-readable reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallResult<T> {
    Ok(T),
    Error(String),
}

impl<T> CallResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Error(reason) => Some(reason),
        }
    }
}

impl<T> From<Result<T, WalletError>> for CallResult<T> {
    fn from(result: Result<T, WalletError>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}
