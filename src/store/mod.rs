//! Persistence adapters.
//!
//! Managers talk to a [`Store`]: a durable, per-identity store of tasks,
//! notes, profiles and archive history. Every query is scoped by the caller's
//! wallet address, and every write is broadcast to subscribers so other
//! sessions of the same identity can refetch.

mod blob;
mod sqlite;

pub use blob::BlobStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::database::DatabaseError;
use crate::models::{HistoryItem, Note, Scope, Task, UserProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Local storage error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Tasks,
    Notes,
}

/// Change notification. Carries no payload: receivers refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub table: Table,
    pub wallet_address: String,
    pub workspace_id: String,
}

impl StoreEvent {
    pub fn new(table: Table, scope: &Scope) -> Self {
        Self {
            table,
            wallet_address: scope.wallet_address.clone(),
            workspace_id: scope.workspace_id.clone(),
        }
    }

    pub fn concerns(&self, table: Table, scope: &Scope) -> bool {
        self.table == table
            && self.wallet_address == scope.wallet_address
            && self.workspace_id == scope.workspace_id
    }
}

/// Aggregate note counts for one wallet, across workspaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteCounts {
    pub encrypted: u64,
    pub anchored: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_tasks(&self, scope: &Scope) -> Result<Vec<Task>, StoreError>;

    /// Insert a batch of new tasks. Either all are stored or none are.
    async fn insert_tasks(&self, scope: &Scope, tasks: &[Task]) -> Result<(), StoreError>;

    async fn update_task(&self, scope: &Scope, task: &Task) -> Result<(), StoreError>;

    async fn delete_task(&self, scope: &Scope, id: &str) -> Result<(), StoreError>;

    async fn list_notes(&self, scope: &Scope, encrypted: bool) -> Result<Vec<Note>, StoreError>;

    /// Insert or replace a note by id
    async fn upsert_note(&self, scope: &Scope, note: &Note) -> Result<(), StoreError>;

    async fn delete_note(&self, scope: &Scope, id: &str) -> Result<(), StoreError>;

    async fn mark_note_anchored(&self, scope: &Scope, id: &str, tx_hash: &str) -> Result<(), StoreError>;

    async fn note_counts(&self, wallet_address: &str) -> Result<NoteCounts, StoreError>;

    async fn load_profile(&self, wallet_address: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn save_profile(&self, wallet_address: &str, profile: &UserProfile) -> Result<(), StoreError>;

    async fn load_history(&self, wallet_address: &str) -> Result<Vec<HistoryItem>, StoreError>;

    async fn append_history(&self, wallet_address: &str, item: &HistoryItem) -> Result<(), StoreError>;

    /// Add completed focus time; returns the new total in minutes
    async fn add_focus_minutes(&self, wallet_address: &str, minutes: u32) -> Result<u64, StoreError>;

    async fn focus_minutes(&self, wallet_address: &str) -> Result<u64, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

pub(crate) const EVENT_CAPACITY: usize = 64;

#[cfg(test)]
pub(crate) mod test_support {
    //! Store double that can be told to fail writes.

    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub struct FlakyStore {
        pub inner: SqliteStore,
        pub fail_writes: AtomicBool,
        pub writes: AtomicUsize,
    }

    impl FlakyStore {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: SqliteStore::open_in_memory().expect("in-memory store"),
                fail_writes: AtomicBool::new(false),
                writes: AtomicUsize::new(0),
            })
        }

        pub fn set_failing(&self, failing: bool) {
            self.fail_writes.store(failing, Ordering::SeqCst);
        }

        fn write(&self) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("network down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn list_tasks(&self, scope: &Scope) -> Result<Vec<Task>, StoreError> {
            self.inner.list_tasks(scope).await
        }

        async fn insert_tasks(&self, scope: &Scope, tasks: &[Task]) -> Result<(), StoreError> {
            self.write()?;
            self.inner.insert_tasks(scope, tasks).await
        }

        async fn update_task(&self, scope: &Scope, task: &Task) -> Result<(), StoreError> {
            self.write()?;
            self.inner.update_task(scope, task).await
        }

        async fn delete_task(&self, scope: &Scope, id: &str) -> Result<(), StoreError> {
            self.write()?;
            self.inner.delete_task(scope, id).await
        }

        async fn list_notes(&self, scope: &Scope, encrypted: bool) -> Result<Vec<Note>, StoreError> {
            self.inner.list_notes(scope, encrypted).await
        }

        async fn upsert_note(&self, scope: &Scope, note: &Note) -> Result<(), StoreError> {
            self.write()?;
            self.inner.upsert_note(scope, note).await
        }

        async fn delete_note(&self, scope: &Scope, id: &str) -> Result<(), StoreError> {
            self.write()?;
            self.inner.delete_note(scope, id).await
        }

        async fn mark_note_anchored(&self, scope: &Scope, id: &str, tx_hash: &str) -> Result<(), StoreError> {
            self.write()?;
            self.inner.mark_note_anchored(scope, id, tx_hash).await
        }

        async fn note_counts(&self, wallet_address: &str) -> Result<NoteCounts, StoreError> {
            self.inner.note_counts(wallet_address).await
        }

        async fn load_profile(&self, wallet_address: &str) -> Result<Option<UserProfile>, StoreError> {
            self.inner.load_profile(wallet_address).await
        }

        async fn save_profile(&self, wallet_address: &str, profile: &UserProfile) -> Result<(), StoreError> {
            self.write()?;
            self.inner.save_profile(wallet_address, profile).await
        }

        async fn load_history(&self, wallet_address: &str) -> Result<Vec<HistoryItem>, StoreError> {
            self.inner.load_history(wallet_address).await
        }

        async fn append_history(&self, wallet_address: &str, item: &HistoryItem) -> Result<(), StoreError> {
            self.write()?;
            self.inner.append_history(wallet_address, item).await
        }

        async fn add_focus_minutes(&self, wallet_address: &str, minutes: u32) -> Result<u64, StoreError> {
            self.write()?;
            self.inner.add_focus_minutes(wallet_address, minutes).await
        }

        async fn focus_minutes(&self, wallet_address: &str) -> Result<u64, StoreError> {
            self.inner.focus_minutes(wallet_address).await
        }

        fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
            self.inner.subscribe()
        }
    }
}
