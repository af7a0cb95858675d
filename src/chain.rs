//! Chain-archive connector.
//!
//! Archiving completed tasks, anchoring documents and recording a password
//! hash are wallet-signed calls against two journal contracts. The contracts
//! are external; this module fixes the call contract and ships
//! [`LocalLedger`], an offline connector that records calls in SQLite.

use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::ChainConfig;
use crate::crypto;
use crate::database::{Database, DatabaseError, LedgerEntry};

#[derive(Debug, Error)]
pub enum ChainError {
    /// The wallet declined to sign
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Reverted(String),
    #[error("{0}")]
    Rpc(String),
}

impl From<DatabaseError> for ChainError {
    fn from(e: DatabaseError) -> Self {
        ChainError::Rpc(e.to_string())
    }
}

/// The contract calls the application makes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    /// `logTasks(string[])` on the task journal
    LogTasks(Vec<String>),
    /// `setPasswordHash(bytes32)` on the task journal
    SetPasswordHash([u8; 32]),
    /// `anchorDocument(string, string)` on the document journal
    AnchorDocument { doc_id: String, content_hash: String },
}

impl ChainCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            ChainCall::LogTasks(_) => "logTasks",
            ChainCall::SetPasswordHash(_) => "setPasswordHash",
            ChainCall::AnchorDocument { .. } => "anchorDocument",
        }
    }

    /// Call arguments in their ABI-facing JSON form
    pub fn args(&self) -> serde_json::Value {
        match self {
            ChainCall::LogTasks(tasks) => serde_json::json!([tasks]),
            ChainCall::SetPasswordHash(hash) => serde_json::json!([crypto::to_hex(hash)]),
            ChainCall::AnchorDocument { doc_id, content_hash } => {
                serde_json::json!([doc_id, content_hash])
            }
        }
    }

    /// Contract address the call is sent to
    pub fn contract<'a>(&self, chain: &'a ChainConfig) -> &'a str {
        match self {
            ChainCall::LogTasks(_) | ChainCall::SetPasswordHash(_) => &chain.task_journal_address,
            ChainCall::AnchorDocument { .. } => &chain.journal_address,
        }
    }
}

/// Handle of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    pub hash: String,
}

#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Sign and submit `call` from the wallet `from`
    async fn submit(&self, from: &str, call: ChainCall) -> Result<TxHandle, ChainError>;

    /// Password hash recorded for `address`, if any
    async fn password_hash(&self, address: &str) -> Result<Option<[u8; 32]>, ChainError>;

    async fn has_password(&self, address: &str) -> Result<bool, ChainError> {
        Ok(self.password_hash(address).await?.is_some())
    }
}

/// Offline connector: every call succeeds and lands in the local ledger table
pub struct LocalLedger {
    db: Mutex<Database>,
    chain: ChainConfig,
}

impl LocalLedger {
    pub fn new(db: Database, chain: ChainConfig) -> Self {
        Self {
            db: Mutex::new(db),
            chain,
        }
    }

    pub fn open(path: &str, chain: ChainConfig) -> Result<Self, ChainError> {
        Ok(Self::new(Database::new(path)?, chain))
    }

    pub fn open_in_memory(chain: ChainConfig) -> Result<Self, ChainError> {
        Ok(Self::new(Database::open_in_memory()?, chain))
    }

    /// Calls recorded for a sender, oldest first
    pub fn entries(&self, sender: &str) -> Result<Vec<LedgerEntry>, ChainError> {
        Ok(self.db()?.get_ledger_entries(&sender.to_lowercase())?)
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, ChainError> {
        self.db
            .lock()
            .map_err(|_| ChainError::Rpc("ledger lock poisoned".to_string()))
    }

    fn tx_hash(from: &str, call: &ChainCall, args: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(from.as_bytes());
        hasher.update(call.function_name().as_bytes());
        hasher.update(args.as_bytes());
        hasher.update(nanos.to_be_bytes());
        crypto::to_hex(&hasher.finalize())
    }
}

#[async_trait]
impl ChainConnector for LocalLedger {
    async fn submit(&self, from: &str, call: ChainCall) -> Result<TxHandle, ChainError> {
        if let ChainCall::LogTasks(tasks) = &call {
            if tasks.is_empty() {
                return Err(ChainError::Reverted("logTasks: empty task list".to_string()));
            }
        }

        let sender = from.to_lowercase();
        let args = call.args().to_string();
        let hash = Self::tx_hash(&sender, &call, &args);
        let db = self.db()?;

        if let ChainCall::SetPasswordHash(password_hash) = &call {
            db.set_password_hash(&sender, &crypto::to_hex(password_hash))?;
        }

        db.insert_ledger_entry(&LedgerEntry {
            tx_hash: hash.clone(),
            sender,
            contract: call.contract(&self.chain).to_string(),
            function_name: call.function_name().to_string(),
            args,
            created_at: crate::utils::now_rfc3339(),
        })?;

        tracing::info!(
            function = call.function_name(),
            chain_id = self.chain.chain_id,
            tx = %hash,
            "recorded chain call in local ledger"
        );
        Ok(TxHandle { hash })
    }

    async fn password_hash(&self, address: &str) -> Result<Option<[u8; 32]>, ChainError> {
        let Some(stored) = self.db()?.get_password_hash(address)? else {
            return Ok(None);
        };
        let bytes = hex::decode(stored.trim_start_matches("0x"))
            .map_err(|e| ChainError::Rpc(format!("corrupt password hash: {}", e)))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ChainError::Rpc("corrupt password hash: wrong length".to_string()))?;
        Ok(Some(hash))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Connector double that counts calls and can be told to fail.

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub struct RecordingChain {
        pub calls: Mutex<Vec<ChainCall>>,
        pub fail_with: Mutex<Option<String>>,
        pub password: Mutex<Option<[u8; 32]>>,
        pub rejected: AtomicBool,
    }

    impl RecordingChain {
        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Mutex::new(Some(message.to_string())),
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChainConnector for RecordingChain {
        async fn submit(&self, _from: &str, call: ChainCall) -> Result<TxHandle, ChainError> {
            if let Some(message) = self.fail_with.lock().unwrap().clone() {
                return Err(ChainError::Reverted(message));
            }
            if self.rejected.load(Ordering::SeqCst) {
                return Err(ChainError::Rejected("User rejected the request.".to_string()));
            }
            if let ChainCall::SetPasswordHash(hash) = &call {
                *self.password.lock().unwrap() = Some(*hash);
            }
            self.calls.lock().unwrap().push(call);
            Ok(TxHandle {
                hash: format!("0x{:064x}", self.call_count()),
            })
        }

        async fn password_hash(&self, _address: &str) -> Result<Option<[u8; 32]>, ChainError> {
            Ok(*self.password.lock().unwrap())
        }
    }
}
