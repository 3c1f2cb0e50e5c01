//! Password encryption of secret bytes.
//!
//! 1. A KDF (PBKDF2-HMAC-SHA256 by default, Argon2id optionally) derives a
//!    32-byte key from the password and a fresh random salt
//! 2. AES-256-GCM seals the plaintext under a fresh random 96-bit IV
//! 3. The result records every parameter needed to decrypt it later
//!
//! Salt and IV are drawn per call, so encrypting the same plaintext twice
//! never yields the same output.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::VaultError;

/// Current `EncryptedSecret` format version.
pub const SECRET_VERSION: u32 = 1;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// Key-derivation parameters, persisted alongside each secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum KdfParams {
    Pbkdf2Sha256 {
        iterations: u32,
    },
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Pbkdf2Sha256 { iterations } | Self::Argon2id { iterations, .. } => *iterations,
        }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        match self {
            Self::Pbkdf2Sha256 { iterations } => {
                if *iterations == 0 {
                    return Err(VaultError::Kdf("iteration count must be at least 1".into()));
                }
                pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, *iterations, &mut key[..]);
            }
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                let params = Params::new(*memory_kib, *iterations, *parallelism, Some(KEY_LEN))
                    .map_err(|e| VaultError::Kdf(format!("argon2 params: {e}")))?;
                Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                    .hash_password_into(password.as_bytes(), salt, &mut key[..])
                    .map_err(|e| VaultError::Kdf(format!("argon2: {e}")))?;
            }
        }
        Ok(key)
    }
}

/// A sealed secret. Never holds plaintext; byte fields are hex strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub version: u32,
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    pub kdf: KdfParams,
}

impl EncryptedSecret {
    pub fn kdf_iterations(&self) -> u32 {
        self.kdf.iterations()
    }
}

/// Encrypt with the default KDF parameters.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<EncryptedSecret, VaultError> {
    encrypt_with(plaintext, password, &KdfParams::default())
}

/// Encrypt `plaintext` under `password` using the given KDF parameters.
pub fn encrypt_with(
    plaintext: &[u8],
    password: &str,
    kdf: &KdfParams,
) -> Result<EncryptedSecret, VaultError> {
    let mut rng = rand::rngs::OsRng;

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut iv = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut iv);

    let key = kdf.derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| VaultError::Encryption(format!("cipher init: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    Ok(EncryptedSecret {
        version: SECRET_VERSION,
        ciphertext: hex::encode(ciphertext),
        iv: hex::encode(iv),
        salt: hex::encode(salt),
        kdf: kdf.clone(),
    })
}

/// Decrypt a secret. Fails with [`VaultError::DecryptionFailed`] whenever the
/// authentication tag does not verify.
pub fn decrypt(secret: &EncryptedSecret, password: &str) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    if secret.version != SECRET_VERSION {
        return Err(VaultError::UnsupportedVersion(secret.version));
    }

    let salt = decode_field("salt", &secret.salt)?;
    let iv = decode_field("iv", &secret.iv)?;
    let ciphertext = decode_field("ciphertext", &secret.ciphertext)?;
    if iv.len() != NONCE_LEN {
        return Err(VaultError::Malformed(format!(
            "iv must be {NONCE_LEN} bytes, got {}",
            iv.len()
        )));
    }

    let key = secret.kdf.derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| VaultError::Encryption(format!("cipher init: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| VaultError::DecryptionFailed)
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, VaultError> {
    hex::decode(value).map_err(|e| VaultError::Malformed(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_kdf() -> KdfParams {
        KdfParams::Pbkdf2Sha256 { iterations: 1_000 }
    }

    #[test]
    fn default_kdf_is_pbkdf2_100k() {
        assert_eq!(KdfParams::default().iterations(), 100_000);
    }

    #[test]
    fn roundtrip() {
        let secret = encrypt_with(b"seed bytes", "Str0ng!Pass", &fast_kdf()).unwrap();
        let plain = decrypt(&secret, "Str0ng!Pass").unwrap();
        assert_eq!(plain.as_slice(), b"seed bytes");
    }

    #[test]
    fn default_parameters_roundtrip() {
        let secret = encrypt(&[42u8; 32], "pw").unwrap();
        assert_eq!(secret.kdf_iterations(), 100_000);
        assert_eq!(decrypt(&secret, "pw").unwrap().as_slice(), &[42u8; 32]);
    }

    #[test]
    fn wrong_password_fails() {
        let secret = encrypt_with(b"seed", "right", &fast_kdf()).unwrap();
        let err = decrypt(&secret, "wrong").unwrap_err();
        assert!(matches!(err, VaultError::DecryptionFailed));
        assert_eq!(err.kind(), custody_types::ErrorKind::Crypto);
    }

    #[test]
    fn tampered_ciphertext_fails_like_wrong_password() {
        let mut secret = encrypt_with(b"seed", "pw", &fast_kdf()).unwrap();
        let mut bytes = hex::decode(&secret.ciphertext).unwrap();
        bytes[0] ^= 0x01;
        secret.ciphertext = hex::encode(bytes);
        assert!(matches!(
            decrypt(&secret, "pw"),
            Err(VaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn salt_and_iv_are_fresh_per_call() {
        let a = encrypt_with(b"same", "pw", &fast_kdf()).unwrap();
        let b = encrypt_with(b"same", "pw", &fast_kdf()).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(hex::decode(&a.salt).unwrap().len(), SALT_LEN);
        assert_eq!(hex::decode(&a.iv).unwrap().len(), NONCE_LEN);
    }

    #[test]
    fn argon2id_roundtrip() {
        let kdf = KdfParams::Argon2id {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        let secret = encrypt_with(b"seed", "pw", &kdf).unwrap();
        assert_eq!(decrypt(&secret, "pw").unwrap().as_slice(), b"seed");
        assert!(decrypt(&secret, "nope").is_err());
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut secret = encrypt_with(b"seed", "pw", &fast_kdf()).unwrap();
        secret.version = 2;
        assert!(matches!(
            decrypt(&secret, "pw"),
            Err(VaultError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn malformed_fields_rejected() {
        let mut secret = encrypt_with(b"seed", "pw", &fast_kdf()).unwrap();
        secret.iv = "zz".into();
        assert!(matches!(decrypt(&secret, "pw"), Err(VaultError::Malformed(_))));

        let mut secret = encrypt_with(b"seed", "pw", &fast_kdf()).unwrap();
        secret.iv = "00ff".into();
        assert!(matches!(decrypt(&secret, "pw"), Err(VaultError::Malformed(_))));
    }

    #[test]
    fn zero_iterations_rejected() {
        let kdf = KdfParams::Pbkdf2Sha256 { iterations: 0 };
        assert!(matches!(
            encrypt_with(b"seed", "pw", &kdf),
            Err(VaultError::Kdf(_))
        ));
    }

    #[test]
    fn json_layout() {
        let secret = encrypt_with(b"seed", "pw", &fast_kdf()).unwrap();
        let json: serde_json::Value = serde_json::to_value(&secret).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["kdf"]["algorithm"], "pbkdf2-sha256");
        assert_eq!(json["kdf"]["iterations"], 1_000);
        assert!(json["ciphertext"].is_string());

        let back: EncryptedSecret = serde_json::from_value(json).unwrap();
        assert_eq!(back, secret);
    }
}
