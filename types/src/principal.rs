//! Principals: network-wide identifiers for users and canisters.
//!
//! Textual format: `CRC32(bytes)` (big-endian) is prepended to the raw bytes, the
//! result is base32-encoded (RFC 4648 alphabet, lowercase, no padding) and split
//! into groups of 5 characters joined by `-`.
//!
//! A principal is at most 29 bytes. Self-authenticating principals (the ones a
//! wallet owns) are `SHA-224(DER public key) || 0x02`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha224};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Base32 alphabet (RFC 4648, lowercase).
const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let alpha = BASE32_ALPHABET;
    let mut i = 0;
    while i < 32 {
        table[alpha[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// CRC-32 (IEEE 802.3, reflected polynomial) lookup table.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Maximum length of a principal in bytes.
pub const MAX_PRINCIPAL_LEN: usize = 29;

/// Tag byte appended to self-authenticating principals.
const SELF_AUTHENTICATING_TAG: u8 = 0x02;

/// Number of characters per dash-separated group.
const GROUP_LEN: usize = 5;

/// Compute the CRC-32 checksum used by principals and account identifiers.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &b in bytes {
        crc = CRC32_TABLE[((crc ^ b as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    !crc
}

/// Encode a byte slice as lowercase unpadded base32.
fn encode_base32(bytes: &[u8]) -> String {
    let total_bits = bytes.len() * 8;
    let num_chars = total_bits.div_ceil(5);
    let mut result = String::with_capacity(num_chars);

    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }

    result
}

/// Decode unpadded base32. Returns `None` on characters outside the alphabet.
fn decode_base32(s: &str) -> Option<Vec<u8>> {
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = Vec::with_capacity(s.len() * 5 / 8);

    for c in s.bytes() {
        if c >= 128 {
            return None;
        }
        let val = BASE32_DECODE[c as usize];
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            result.push((buffer >> bits_in_buffer) as u8);
        }
    }

    Some(result)
}

/// A principal (user identity or canister address).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Principal(Vec<u8>);

/// Canisters are addressed by principal.
pub type CanisterId = Principal;

impl Principal {
    /// The management canister, `aaaaa-aa`.
    pub fn management_canister() -> Self {
        Self(Vec::new())
    }

    /// The anonymous principal, `2vxsx-fae`.
    pub fn anonymous() -> Self {
        Self(vec![0x04])
    }

    /// Build a principal from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ValidationError> {
        if bytes.len() > MAX_PRINCIPAL_LEN {
            return Err(ValidationError::InvalidPrincipal(format!(
                "principal must be at most {} bytes, got {}",
                MAX_PRINCIPAL_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Build from bytes already known to be within the length bound.
    pub(crate) fn from_static(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Derive the self-authenticating principal owned by a DER-encoded public key.
    pub fn self_authenticating(der_public_key: &[u8]) -> Self {
        let hash = Sha224::digest(der_public_key);
        let mut bytes = Vec::with_capacity(MAX_PRINCIPAL_LEN);
        bytes.extend_from_slice(&hash);
        bytes.push(SELF_AUTHENTICATING_TAG);
        Self(bytes)
    }

    /// Parse a canister id, reporting failures as canister-id errors.
    pub fn parse_canister(text: &str) -> Result<CanisterId, ValidationError> {
        text.parse::<Principal>()
            .map_err(|_| ValidationError::InvalidCanisterId(text.to_string()))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Render the textual (dash-grouped) form.
    pub fn to_text(&self) -> String {
        let mut data = Vec::with_capacity(4 + self.0.len());
        data.extend_from_slice(&crc32(&self.0).to_be_bytes());
        data.extend_from_slice(&self.0);
        let encoded = encode_base32(&data);

        let mut text = String::with_capacity(encoded.len() + encoded.len() / GROUP_LEN);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % GROUP_LEN == 0 {
                text.push('-');
            }
            text.push(c);
        }
        text
    }
}

impl FromStr for Principal {
    type Err = ValidationError;

    /// Parse and validate a textual principal.
    ///
    /// Rejects unknown characters, bad checksums, oversize principals, and any
    /// text that is not in canonical (lowercase, correctly grouped) form.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidPrincipal(format!("{text}: {reason}"));

        let compact: String = text.chars().filter(|c| *c != '-').collect();
        let decoded = decode_base32(&compact).ok_or_else(|| invalid("not base32"))?;
        if decoded.len() < 4 {
            return Err(invalid("too short"));
        }

        let (checksum, bytes) = decoded.split_at(4);
        let principal = Self::from_slice(bytes)?;
        let expected = crc32(principal.as_slice()).to_be_bytes();
        if checksum != expected {
            return Err(invalid("checksum mismatch"));
        }

        if principal.to_text() != text {
            return Err(invalid("not in canonical form"));
        }
        Ok(principal)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
