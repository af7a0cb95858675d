//! Unlock gate for encrypted notes.
//!
//! The password hash lives on-chain; the password itself lives only in this
//! value while the vault is unlocked and is zeroized on lock or drop.

use zeroize::Zeroizing;

use crate::chain::{ChainCall, ChainConnector, TxHandle};
use crate::crypto;
use crate::error::ArcError;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    /// No password hash recorded for the wallet yet
    NeedsSetup,
    Locked,
    Unlocked,
}

#[derive(Default)]
pub struct Vault {
    password: Option<Zeroizing<String>>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status(&self, chain: &dyn ChainConnector, address: &str) -> Result<VaultStatus, ArcError> {
        if !chain.has_password(address).await? {
            return Ok(VaultStatus::NeedsSetup);
        }
        Ok(if self.is_unlocked() {
            VaultStatus::Unlocked
        } else {
            VaultStatus::Locked
        })
    }

    /// Record the hash of a new password on-chain and unlock with it
    pub async fn establish(
        &mut self,
        chain: &dyn ChainConnector,
        address: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<TxHandle, ArcError> {
        if address.is_empty() {
            return Err(ArcError::WalletNotConnected);
        }
        if password.is_empty() || password != confirmation {
            return Err(ArcError::validation("Passwords do not match"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ArcError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let tx = chain
            .submit(address, ChainCall::SetPasswordHash(crypto::password_hash(password)))
            .await?;
        tracing::info!(tx = %tx.hash, "password hash recorded");
        self.password = Some(Zeroizing::new(password.to_string()));
        Ok(tx)
    }

    pub async fn unlock(&mut self, chain: &dyn ChainConnector, address: &str, password: &str) -> Result<(), ArcError> {
        let Some(recorded) = chain.password_hash(address).await? else {
            return Err(ArcError::validation("No password set for this wallet"));
        };
        if crypto::password_hash(password) != recorded {
            tracing::warn!("vault unlock rejected");
            return Err(ArcError::WrongPassword);
        }
        self.password = Some(Zeroizing::new(password.to_string()));
        Ok(())
    }

    pub fn lock(&mut self) {
        self.password = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.password.is_some()
    }

    pub fn password(&self) -> Result<&str, ArcError> {
        self.password.as_ref().map(|p| p.as_str()).ok_or(ArcError::Locked)
    }
}
