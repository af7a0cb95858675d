use thiserror::Error;

use crate::chain::ChainError;
use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::store::StoreError;

/// Errors surfaced by the task, notes, vault and archive operations
#[derive(Debug, Error)]
pub enum ArcError {
    #[error("Connect a wallet first")]
    WalletNotConnected,
    #[error("{0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Wrong password")]
    WrongPassword,
    #[error("Vault is locked")]
    Locked,
    #[error("Encryption error: {0}")]
    CryptoError(#[from] CryptoError),
    /// Chain messages are shown to the user as-is
    #[error("{0}")]
    ChainError(#[from] ChainError),
    #[error("No completed tasks to archive")]
    NothingToArchive,
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
}

impl ArcError {
    pub fn validation(message: impl Into<String>) -> Self {
        ArcError::Validation(message.into())
    }
}
