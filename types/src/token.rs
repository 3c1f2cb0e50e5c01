//! Fungible token metadata.

use serde::{Deserialize, Serialize};

/// Decimals assumed when a token does not report them.
pub const DEFAULT_DECIMALS: u8 = 8;
/// Transfer fee (in smallest units) assumed when a token does not report one.
pub const DEFAULT_FEE: u128 = 10_000;

/// Resolved metadata of a fungible token. Every field has a value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default = "default_fee")]
    pub fee: u128,
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_fee() -> u128 {
    DEFAULT_FEE
}

/// Partially known token metadata, as supplied by a caller or a remote ledger.
///
/// Missing fields resolve to documented defaults: decimals 8, fee 10 000,
/// symbol `"UNKNOWN"`, name = the canister id text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub fee: Option<u128>,
}

impl TokenInfo {
    /// Fill in defaults for absent fields.
    pub fn resolve(self, canister_text: &str) -> TokenMetadata {
        TokenMetadata {
            name: self.name.unwrap_or_else(|| canister_text.to_string()),
            symbol: self.symbol.unwrap_or_else(|| "UNKNOWN".to_string()),
            decimals: self.decimals.unwrap_or(DEFAULT_DECIMALS),
            fee: self.fee.unwrap_or(DEFAULT_FEE),
        }
    }

    /// Overlay the fields present in `self` onto existing metadata.
    pub fn apply_to(self, existing: &TokenMetadata) -> TokenMetadata {
        TokenMetadata {
            name: self.name.unwrap_or_else(|| existing.name.clone()),
            symbol: self.symbol.unwrap_or_else(|| existing.symbol.clone()),
            decimals: self.decimals.unwrap_or(existing.decimals),
            fee: self.fee.unwrap_or(existing.fee),
        }
    }
}

impl From<TokenMetadata> for TokenInfo {
    fn from(meta: TokenMetadata) -> Self {
        Self {
            name: Some(meta.name),
            symbol: Some(meta.symbol),
            decimals: Some(meta.decimals),
            fee: Some(meta.fee),
        }
    }
}
