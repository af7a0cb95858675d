use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{EVENT_CAPACITY, NoteCounts, Store, StoreError, StoreEvent, Table};
use crate::database::Database;
use crate::models::{HistoryItem, Note, Scope, Task, UserProfile};

/// Durable store backed by the SQLite [`Database`]
pub struct SqliteStore {
    db: Mutex<Database>,
    events: broadcast::Sender<StoreEvent>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db: Mutex::new(db),
            events,
        }
    }

    pub fn open(path: &str) -> Result<Self, StoreError> {
        Ok(Self::new(Database::new(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }

    fn notify(&self, table: Table, scope: &Scope) {
        // No subscribers is fine
        let _ = self.events.send(StoreEvent::new(table, scope));
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_tasks(&self, scope: &Scope) -> Result<Vec<Task>, StoreError> {
        Ok(self.db()?.get_tasks(scope)?)
    }

    async fn insert_tasks(&self, scope: &Scope, tasks: &[Task]) -> Result<(), StoreError> {
        self.db()?.insert_tasks(scope, tasks)?;
        tracing::debug!(count = tasks.len(), workspace = %scope.workspace_id, "inserted tasks");
        self.notify(Table::Tasks, scope);
        Ok(())
    }

    async fn update_task(&self, scope: &Scope, task: &Task) -> Result<(), StoreError> {
        if !self.db()?.update_task(scope, task)? {
            tracing::warn!(id = %task.id, "update matched no stored task");
        }
        self.notify(Table::Tasks, scope);
        Ok(())
    }

    async fn delete_task(&self, scope: &Scope, id: &str) -> Result<(), StoreError> {
        self.db()?.delete_task(scope, id)?;
        self.notify(Table::Tasks, scope);
        Ok(())
    }

    async fn list_notes(&self, scope: &Scope, encrypted: bool) -> Result<Vec<Note>, StoreError> {
        Ok(self.db()?.get_notes(scope, encrypted)?)
    }

    async fn upsert_note(&self, scope: &Scope, note: &Note) -> Result<(), StoreError> {
        self.db()?.upsert_note(scope, note)?;
        self.notify(Table::Notes, scope);
        Ok(())
    }

    async fn delete_note(&self, scope: &Scope, id: &str) -> Result<(), StoreError> {
        self.db()?.delete_note(scope, id)?;
        self.notify(Table::Notes, scope);
        Ok(())
    }

    async fn mark_note_anchored(&self, scope: &Scope, id: &str, tx_hash: &str) -> Result<(), StoreError> {
        self.db()?.mark_note_anchored(scope, id, tx_hash)?;
        self.notify(Table::Notes, scope);
        Ok(())
    }

    async fn note_counts(&self, wallet_address: &str) -> Result<NoteCounts, StoreError> {
        let db = self.db()?;
        let (encrypted, anchored_encrypted) = db.count_notes(wallet_address, true)?;
        let (_, anchored_plain) = db.count_notes(wallet_address, false)?;
        Ok(NoteCounts {
            encrypted,
            anchored: anchored_encrypted + anchored_plain,
        })
    }

    async fn load_profile(&self, wallet_address: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.db()?.get_profile(wallet_address)?)
    }

    async fn save_profile(&self, wallet_address: &str, profile: &UserProfile) -> Result<(), StoreError> {
        Ok(self.db()?.save_profile(wallet_address, profile)?)
    }

    async fn load_history(&self, wallet_address: &str) -> Result<Vec<HistoryItem>, StoreError> {
        Ok(self.db()?.get_history(wallet_address)?)
    }

    async fn append_history(&self, wallet_address: &str, item: &HistoryItem) -> Result<(), StoreError> {
        Ok(self.db()?.append_history(wallet_address, item)?)
    }

    async fn add_focus_minutes(&self, wallet_address: &str, minutes: u32) -> Result<u64, StoreError> {
        Ok(self.db()?.add_focus_minutes(wallet_address, minutes)?)
    }

    async fn focus_minutes(&self, wallet_address: &str) -> Result<u64, StoreError> {
        Ok(self.db()?.get_focus_minutes(wallet_address)?)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnId;

    #[tokio::test]
    async fn test_writes_are_broadcast() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut rx = store.subscribe();
        let scope = Scope::new("0xabc", "1");

        store
            .insert_tasks(&scope, &[Task::new("Ship".to_string(), ColumnId::Todo)])
            .await
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert!(event.concerns(Table::Tasks, &scope));
        assert!(!event.concerns(Table::Notes, &scope));
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("arcos.db");
        let path = path.to_str().unwrap();
        let scope = Scope::new("0xabc", "1");

        {
            let store = SqliteStore::open(path).unwrap();
            store
                .insert_tasks(&scope, &[Task::new("Persist me".to_string(), ColumnId::Backlog)])
                .await
                .unwrap();
        }

        let store = SqliteStore::open(path).unwrap();
        let tasks = store.list_tasks(&scope).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].content, "Persist me");
    }
}
