//! The keyring: every wallet derived from one mnemonic.
//!
//! The phrase is sealed under the user's password like each wallet secret.
//! While the keyring is unlocked the phrase is held (zeroized on lock) so
//! further wallets can be derived and switched to without re-entering it.

use std::fmt;
use std::sync::Arc;

use custody_cache::keys::KEYRING_KEY;
use custody_crypto::{
    decrypt, derive_identity, generate_mnemonic, is_password_strong, validate_mnemonic,
    EncryptedSecret, VaultError,
};
use custody_types::ValidationError;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::context::WalletContext;
use crate::error::WalletError;
use crate::record::WalletRecord;
use crate::wallet::{seal_bytes, SessionState, Wallet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringRecord {
    pub mnemonic: EncryptedSecret,
    pub wallets: Vec<WalletRecord>,
    pub current: u32,
    pub next_index: u32,
}

pub struct Keyring {
    ctx: Arc<WalletContext>,
    mnemonic: EncryptedSecret,
    wallets: Vec<Wallet>,
    current: u32,
    next_index: u32,
    phrase: Option<Zeroizing<String>>,
}

impl Keyring {
    /// Create a keyring from a fresh phrase. The phrase is returned once,
    /// for the user to write down.
    pub async fn create(
        ctx: Arc<WalletContext>,
        password: &str,
    ) -> Result<(Self, Zeroizing<String>), WalletError> {
        check_password(password)?;
        let phrase = Zeroizing::new(generate_mnemonic()?);
        let keyring = Self::import(ctx, &phrase, password).await?;
        Ok((keyring, phrase))
    }

    /// Import an existing phrase. The first wallet uses derivation index 0,
    /// so importing the same phrase always yields the same principal.
    pub async fn import(
        ctx: Arc<WalletContext>,
        phrase: &str,
        password: &str,
    ) -> Result<Self, WalletError> {
        check_password(password)?;
        if !validate_mnemonic(phrase) {
            return Err(VaultError::InvalidSeed("not a valid BIP39 phrase".to_string()).into());
        }

        let mnemonic = seal_bytes(&ctx, phrase.as_bytes(), password).await?;
        let identity = derive_identity(phrase, 0)?;
        let wallet = Wallet::new(ctx.clone(), default_name(0), 0, &identity, password).await?;
        tracing::info!(principal = %wallet.principal(), "keyring imported");

        Ok(Self {
            ctx,
            mnemonic,
            wallets: vec![wallet],
            current: 0,
            next_index: 1,
            phrase: None,
        })
    }

    pub fn from_record(ctx: Arc<WalletContext>, record: KeyringRecord) -> Result<Self, WalletError> {
        let wallets: Vec<Wallet> = record
            .wallets
            .into_iter()
            .map(|w| Wallet::from_record(ctx.clone(), w))
            .collect();
        if wallets.is_empty() {
            return Err(WalletError::Record("keyring holds no wallets".to_string()));
        }
        let current = if wallets.iter().any(|w| w.derivation_index() == record.current) {
            record.current
        } else {
            wallets[0].derivation_index()
        };
        let next_index = wallets
            .iter()
            .map(|w| w.derivation_index().checked_add(1))
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(|| WalletError::Record("derivation index out of range".to_string()))?
            .into_iter()
            .max()
            .unwrap_or(0)
            .max(record.next_index);

        Ok(Self {
            ctx,
            mnemonic: record.mnemonic,
            wallets,
            current,
            next_index,
            phrase: None,
        })
    }

    pub fn to_record(&self) -> KeyringRecord {
        KeyringRecord {
            mnemonic: self.mnemonic.clone(),
            wallets: self.wallets.iter().map(Wallet::to_record).collect(),
            current: self.current,
            next_index: self.next_index,
        }
    }

    /// Persist under the `keyring` blob key.
    pub async fn save(&self) -> Result<(), WalletError> {
        let bytes = serde_json::to_vec(&self.to_record())
            .map_err(|e| WalletError::Record(e.to_string()))?;
        self.ctx.blobs.save(KEYRING_KEY, bytes).await?;
        tracing::debug!(wallets = self.wallets.len(), "keyring saved");
        Ok(())
    }

    /// Load the persisted keyring, `Ok(None)` if none was saved.
    pub async fn load(ctx: Arc<WalletContext>) -> Result<Option<Self>, WalletError> {
        let Some(blob) = ctx.blobs.load(KEYRING_KEY).await? else {
            return Ok(None);
        };
        let record: KeyringRecord = serde_json::from_slice(&blob.content)
            .map_err(|e| WalletError::Record(e.to_string()))?;
        Self::from_record(ctx, record).map(Some)
    }

    // ── Session ─────────────────────────────────────────────────────────

    pub fn is_unlocked(&self) -> bool {
        self.phrase.is_some()
    }

    /// Open the phrase and unlock the current wallet.
    pub async fn unlock(&mut self, password: &str) -> Result<SessionState, WalletError> {
        let phrase = self.open_phrase(password).await?;
        let current = self.current;
        let identity = derive_identity(&phrase, current)?;
        let state = self.current_mut().unlock_with(identity).await?;
        self.phrase = Some(phrase);
        Ok(state)
    }

    pub fn lock(&mut self) {
        for wallet in &mut self.wallets {
            if wallet.is_unlocked() {
                wallet.lock();
            }
        }
        self.phrase = None;
    }

    async fn open_phrase(&self, password: &str) -> Result<Zeroizing<String>, WalletError> {
        let secret = self.mnemonic.clone();
        let password = Zeroizing::new(password.to_string());
        let bytes = tokio::task::spawn_blocking(move || decrypt(&secret, &password)).await??;
        let phrase = String::from_utf8(bytes.to_vec())
            .map_err(|_| WalletError::Vault(VaultError::Malformed("phrase is not UTF-8".into())))?;
        Ok(Zeroizing::new(phrase))
    }

    // ── Wallets ─────────────────────────────────────────────────────────

    pub fn wallets(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.iter()
    }

    pub fn wallet(&self, index: u32) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.derivation_index() == index)
    }

    pub fn current_index(&self) -> u32 {
        self.current
    }

    pub fn current(&self) -> &Wallet {
        self.wallet(self.current)
            .unwrap_or(&self.wallets[0])
    }

    pub fn current_mut(&mut self) -> &mut Wallet {
        let current = self.current;
        let position = self
            .wallets
            .iter()
            .position(|w| w.derivation_index() == current)
            .unwrap_or(0);
        &mut self.wallets[position]
    }

    /// Derive the next wallet. Requires the keyring to be unlocked; the
    /// password seals the new wallet's secret and must match the keyring's.
    pub async fn create_wallet(
        &mut self,
        name: Option<String>,
        password: &str,
    ) -> Result<&Wallet, WalletError> {
        if !self.is_unlocked() {
            return Err(WalletError::Locked);
        }
        let phrase = self.open_phrase(password).await?;
        let index = self.next_index;
        let identity = derive_identity(&phrase, index)?;
        let name = name.unwrap_or_else(|| default_name(index));
        let wallet = Wallet::new(self.ctx.clone(), name, index, &identity, password).await?;
        tracing::info!(index, principal = %wallet.principal(), "wallet derived");

        self.wallets.push(wallet);
        self.next_index += 1;
        let position = self.wallets.len() - 1;
        Ok(&self.wallets[position])
    }

    /// Remove a wallet. The last one cannot be removed; removing the
    /// current wallet makes the first remaining one current.
    pub fn delete_wallet(&mut self, index: u32) -> Result<(), WalletError> {
        let position = self
            .wallets
            .iter()
            .position(|w| w.derivation_index() == index)
            .ok_or(WalletError::UnknownWallet(index))?;
        if self.wallets.len() == 1 {
            return Err(WalletError::LastWallet);
        }

        let mut removed = self.wallets.remove(position);
        if removed.is_unlocked() {
            removed.lock();
        }
        if self.current == index {
            self.current = self.wallets[0].derivation_index();
        }
        tracing::info!(index, "wallet deleted");
        Ok(())
    }

    /// Switch the current wallet. When the keyring is unlocked the previous
    /// wallet is locked and the new one unlocked from the held phrase.
    pub async fn set_current(&mut self, index: u32) -> Result<SessionState, WalletError> {
        if self.wallet(index).is_none() {
            return Err(WalletError::UnknownWallet(index));
        }
        if index == self.current {
            return Ok(self.current().state());
        }

        let identity = match &self.phrase {
            Some(phrase) => Some(derive_identity(phrase, index)?),
            None => None,
        };
        if self.current().is_unlocked() {
            self.current_mut().lock();
        }
        self.current = index;

        match identity {
            Some(identity) => self.current_mut().unlock_with(identity).await,
            None => Ok(SessionState::Locked),
        }
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("wallets", &self.wallets)
            .field("current", &self.current)
            .field("next_index", &self.next_index)
            .field("unlocked", &self.is_unlocked())
            .finish_non_exhaustive()
    }
}

fn check_password(password: &str) -> Result<(), WalletError> {
    if is_password_strong(password) {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword.into())
    }
}

fn default_name(index: u32) -> String {
    format!("Wallet {}", index + 1)
}
