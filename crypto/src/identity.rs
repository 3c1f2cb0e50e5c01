//! Wallet identities derived from key material.

use std::fmt;

use custody_types::{AccountIdentifier, KeyPair, PrivateKey, PublicKey, Principal, Signature};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::keys::{keypair_from_private, public_key_der};
use crate::mnemonic::keypair_from_mnemonic;
use crate::sign::sign_message;

/// The public face of a wallet: who it is on the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub principal: Principal,
    pub account_id: AccountIdentifier,
    pub public_key: PublicKey,
}

impl Identity {
    pub fn from_public_key(public_key: PublicKey) -> Self {
        let principal = Principal::self_authenticating(&public_key_der(&public_key));
        let account_id = AccountIdentifier::from_principal(&principal);
        Self {
            principal,
            account_id,
            public_key,
        }
    }
}

/// An unlocked signing identity. Lives only while a wallet is unlocked;
/// the private key is zeroized when this is dropped.
pub struct SessionIdentity {
    keypair: KeyPair,
    identity: Identity,
}

impl SessionIdentity {
    pub fn from_keypair(keypair: KeyPair) -> Self {
        let identity = Identity::from_public_key(keypair.public.clone());
        Self { keypair, identity }
    }

    pub fn from_private_key(private: PrivateKey) -> Self {
        Self::from_keypair(keypair_from_private(private))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn principal(&self) -> &Principal {
        &self.identity.principal
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    pub fn public_key_der(&self) -> Vec<u8> {
        public_key_der(&self.keypair.public)
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        sign_message(message, &self.keypair.private)
    }

    /// Raw secret bytes, for re-encryption under a new password.
    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.keypair.private.0
    }
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("principal", &self.identity.principal)
            .finish_non_exhaustive()
    }
}

/// Derive the session identity for wallet `index` of a BIP39 phrase.
///
/// Deterministic: the same phrase and index always produce the same
/// principal and account identifier. Fails with [`VaultError::InvalidSeed`]
/// when the phrase does not pass BIP39 validation.
pub fn derive_identity(phrase: &str, index: u32) -> Result<SessionIdentity, VaultError> {
    keypair_from_mnemonic(phrase, index).map(SessionIdentity::from_keypair)
}
