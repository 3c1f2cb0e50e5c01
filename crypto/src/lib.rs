//! Key custody for the custody wallet core.
//!
//! - **BIP39** mnemonics and deterministic Ed25519 identity derivation
//! - Self-authenticating **principals** and default **account identifiers**
//! - **Ed25519** signing for agent requests
//! - Password encryption of secrets (PBKDF2 or Argon2id + AES-256-GCM)
//! - Password strength policy
//!
//! Everything here is a pure function of its inputs (plus fresh randomness
//! for salts and IVs). Persistence is the caller's job.

pub mod error;
pub mod identity;
pub mod keys;
pub mod mnemonic;
pub mod password;
pub mod sign;
pub mod vault;

pub use error::VaultError;
pub use identity::{derive_identity, Identity, SessionIdentity};
pub use keys::{keypair_from_private, keypair_from_seed, public_from_private, public_key_der};
pub use mnemonic::{derivation_path, generate_mnemonic, keypair_from_mnemonic, validate_mnemonic};
pub use password::{is_password_strong, password_strength, PasswordRule, MIN_PASSWORD_LEN};
pub use sign::{sign_message, verify_signature};
pub use vault::{decrypt, encrypt, encrypt_with, EncryptedSecret, KdfParams, SECRET_VERSION};
