use custody_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// Wrong password or tampered ciphertext. The two are deliberately not told apart.
    #[error("decryption failed: wrong password or corrupted data")]
    DecryptionFailed,

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("unsupported secret version: {0}")]
    UnsupportedVersion(u32),

    #[error("malformed secret: {0}")]
    Malformed(String),
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSeed(_) => ErrorKind::Validation,
            _ => ErrorKind::Crypto,
        }
    }
}
