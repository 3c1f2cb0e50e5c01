//! Ledger account identifiers and transfer destinations.
//!
//! An account identifier is `CRC32(hash) || hash` where
//! `hash = SHA-224("\x0Aaccount-id" || principal || subaccount)`, rendered as
//! 64 lowercase hex characters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha224};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::principal::{crc32, Principal};

/// Domain separator for account identifier hashing.
const ACCOUNT_DOMAIN_SEPARATOR: &[u8] = b"\x0Aaccount-id";

/// A 32-byte subaccount. The default subaccount is all zeros.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subaccount(pub [u8; 32]);

/// A 32-byte ledger account identifier (checksum + SHA-224 hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountIdentifier([u8; 32]);

impl AccountIdentifier {
    /// Derive the account identifier for `owner` and `subaccount`.
    pub fn new(owner: &Principal, subaccount: &Subaccount) -> Self {
        let mut hasher = Sha224::new();
        hasher.update(ACCOUNT_DOMAIN_SEPARATOR);
        hasher.update(owner.as_slice());
        hasher.update(subaccount.0);
        let hash = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes[..4].copy_from_slice(&crc32(&hash).to_be_bytes());
        bytes[4..].copy_from_slice(&hash);
        Self(bytes)
    }

    /// Account identifier of `owner`'s default subaccount.
    pub fn from_principal(owner: &Principal) -> Self {
        Self::new(owner, &Subaccount::default())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for AccountIdentifier {
    type Err = ValidationError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(text)
            .map_err(|e| ValidationError::InvalidAccountId(format!("{text}: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ValidationError::InvalidAccountId(format!("expected 32 bytes, got {}", v.len()))
        })?;
        if bytes[..4] != crc32(&bytes[4..]).to_be_bytes() {
            return Err(ValidationError::InvalidAccountId(format!(
                "{text}: checksum mismatch"
            )));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountIdentifier({})", self.to_hex())
    }
}

impl Serialize for AccountIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a transfer goes: a principal (its default account) or an explicit account id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Principal(Principal),
    Account(AccountIdentifier),
}

impl Destination {
    /// The account identifier this destination resolves to on an account-based ledger.
    pub fn account_identifier(&self) -> AccountIdentifier {
        match self {
            Self::Principal(p) => AccountIdentifier::from_principal(p),
            Self::Account(a) => *a,
        }
    }
}

impl FromStr for Destination {
    type Err = ValidationError;

    /// Accepts either a 64-char hex account identifier or a textual principal.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.len() == 64 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return text.parse().map(Self::Account);
        }
        text.parse::<Principal>()
            .map(Self::Principal)
            .map_err(|_| ValidationError::InvalidDestination(text.to_string()))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Principal(p) => p.fmt(f),
            Self::Account(a) => a.fmt(f),
        }
    }
}
