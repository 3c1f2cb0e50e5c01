//! BIP39 mnemonic generation and Ed25519 key derivation.
//!
//! Generates a 12-word mnemonic (128-bit entropy) and derives Ed25519 keypairs
//! along `m/44'/223'/0'/0/<index>` (223 = ICP coin type).
//!
//! The derivation uses HMAC-SHA512 keyed by the path string over the 64-byte
//! BIP39 seed, then takes the first 32 bytes as the Ed25519 secret key.

use bip39::Mnemonic;
use custody_types::KeyPair;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::error::VaultError;
use crate::keys::keypair_from_seed;

type HmacSha512 = Hmac<Sha512>;

/// Entropy for a 12-word phrase.
const ENTROPY_LEN: usize = 16;

/// Derivation path prefix; the wallet index is appended.
const DERIVATION_PREFIX: &str = "m/44'/223'/0'/0/";

/// Generate a new 12-word BIP39 mnemonic from 128-bit entropy.
pub fn generate_mnemonic() -> Result<String, VaultError> {
    let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
    rand::rngs::OsRng.fill_bytes(&mut entropy[..]);
    let mnemonic =
        Mnemonic::from_entropy(&entropy[..]).map_err(|e| VaultError::InvalidSeed(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Validate that a phrase is a valid BIP39 mnemonic (word list + checksum).
pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_normalized(phrase).is_ok()
}

/// The derivation path for wallet `index`.
pub fn derivation_path(index: u32) -> String {
    format!("{DERIVATION_PREFIX}{index}")
}

/// Derive the Ed25519 keypair for wallet `index` from a BIP39 phrase.
///
/// 1. Validate the phrase and derive the BIP39 seed (empty passphrase)
/// 2. HMAC-SHA512 with the derivation path as key and the seed as message
/// 3. The first 32 bytes of the MAC become the Ed25519 secret key
pub fn keypair_from_mnemonic(phrase: &str, index: u32) -> Result<KeyPair, VaultError> {
    let mnemonic =
        Mnemonic::parse_normalized(phrase).map_err(|e| VaultError::InvalidSeed(e.to_string()))?;
    let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));

    let mut mac = HmacSha512::new_from_slice(derivation_path(index).as_bytes())
        .map_err(|e| VaultError::InvalidSeed(e.to_string()))?;
    mac.update(&seed[..]);
    let output = mac.finalize().into_bytes();

    let mut secret = Zeroizing::new([0u8; 32]);
    secret.copy_from_slice(&output[..32]);
    Ok(keypair_from_seed(&secret))
}
