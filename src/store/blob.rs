use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{EVENT_CAPACITY, NoteCounts, Store, StoreError, StoreEvent, Table};
use crate::models::{HistoryItem, Note, Scope, Task, UserProfile};

/// Key holding the full task array
pub const TASKS_KEY: &str = "arc-tasks";
/// Key written by earlier releases; read once and migrated to [`TASKS_KEY`]
pub const LEGACY_TASKS_KEY: &str = "kanban-tasks";
pub const NOTES_KEY: &str = "arc-notes";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scoped<T> {
    wallet_address: String,
    workspace_id: String,
    #[serde(flatten)]
    item: T,
}

impl<T> Scoped<T> {
    fn new(scope: &Scope, item: T) -> Self {
        Self {
            wallet_address: scope.wallet_address.clone(),
            workspace_id: scope.workspace_id.clone(),
            item,
        }
    }

    fn in_scope(&self, scope: &Scope) -> bool {
        self.wallet_address == scope.wallet_address && self.workspace_id == scope.workspace_id
    }
}

/// Offline fallback store: a single JSON file of string keys to serialized
/// blobs, the way browser local storage holds them.
pub struct BlobStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    events: broadcast::Sender<StoreEvent>,
}

impl BlobStore {
    /// Open the blob file, creating an empty one on first write
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            let contents = fs::read_to_string(path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            BTreeMap::new()
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
            events,
        })
    }

    /// Raw value under a key
    pub fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries()?.get(key).cloned())
    }

    /// Store a raw value and flush the file
    pub fn set_item(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries()?;
        let mut staged = entries.clone();
        staged.insert(key.to_string(), value);
        self.commit(&mut entries, staged)
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("local storage lock poisoned".to_string()))
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }

    fn notify(&self, table: Table, scope: &Scope) {
        let _ = self.events.send(StoreEvent::new(table, scope));
    }

    fn read<T: DeserializeOwned>(entries: &BTreeMap<String, String>, key: &str) -> Result<Option<T>, StoreError> {
        match entries.get(key) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` under `key` and flush. The shared map only changes
    /// once the file is written.
    fn put<T: Serialize + ?Sized>(
        &self,
        entries: &mut BTreeMap<String, String>,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let mut staged = entries.clone();
        staged.insert(key.to_string(), serde_json::to_string(value)?);
        self.commit(entries, staged)
    }

    fn commit(
        &self,
        entries: &mut BTreeMap<String, String>,
        staged: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.flush(&staged)?;
        *entries = staged;
        Ok(())
    }

    /// Load the task array, migrating the legacy key into `scope` when the
    /// current key has never been written.
    fn load_tasks(
        &self,
        entries: &mut BTreeMap<String, String>,
        scope: &Scope,
    ) -> Result<Vec<Scoped<Task>>, StoreError> {
        if let Some(tasks) = Self::read(entries, TASKS_KEY)? {
            return Ok(tasks);
        }

        match Self::read::<Vec<Task>>(entries, LEGACY_TASKS_KEY) {
            Ok(Some(legacy)) => {
                tracing::info!(count = legacy.len(), "migrating tasks from legacy storage key");
                let migrated: Vec<Scoped<Task>> =
                    legacy.into_iter().map(|t| Scoped::new(scope, t)).collect();
                self.put(entries, TASKS_KEY, &migrated)?;
                Ok(migrated)
            }
            Ok(None) => Ok(Vec::new()),
            Err(e) => {
                tracing::error!("Failed to parse legacy tasks: {}", e);
                Err(e)
            }
        }
    }

    fn history_key(wallet_address: &str) -> String {
        format!("history_{}", wallet_address)
    }

    fn profile_key(wallet_address: &str) -> String {
        format!("profile_{}", wallet_address)
    }

    fn focus_key(wallet_address: &str) -> String {
        format!("focus_{}", wallet_address)
    }
}

#[async_trait]
impl Store for BlobStore {
    async fn list_tasks(&self, scope: &Scope) -> Result<Vec<Task>, StoreError> {
        let mut entries = self.entries()?;
        let tasks = self.load_tasks(&mut entries, scope)?;
        Ok(tasks
            .into_iter()
            .filter(|t| t.in_scope(scope))
            .map(|t| t.item)
            .collect())
    }

    async fn insert_tasks(&self, scope: &Scope, tasks: &[Task]) -> Result<(), StoreError> {
        {
            let mut entries = self.entries()?;
            let mut stored = self.load_tasks(&mut entries, scope)?;
            if let Some(dup) = tasks
                .iter()
                .find(|t| stored.iter().any(|s| s.in_scope(scope) && s.item.id == t.id))
            {
                return Err(StoreError::Conflict(format!("duplicate task id {}", dup.id)));
            }
            stored.extend(tasks.iter().cloned().map(|t| Scoped::new(scope, t)));
            self.put(&mut entries, TASKS_KEY, &stored)?;
        }
        self.notify(Table::Tasks, scope);
        Ok(())
    }

    async fn update_task(&self, scope: &Scope, task: &Task) -> Result<(), StoreError> {
        {
            let mut entries = self.entries()?;
            let mut stored = self.load_tasks(&mut entries, scope)?;
            match stored.iter_mut().find(|s| s.in_scope(scope) && s.item.id == task.id) {
                Some(slot) => slot.item = task.clone(),
                None => {
                    tracing::warn!(id = %task.id, "update matched no stored task");
                    return Ok(());
                }
            }
            self.put(&mut entries, TASKS_KEY, &stored)?;
        }
        self.notify(Table::Tasks, scope);
        Ok(())
    }

    async fn delete_task(&self, scope: &Scope, id: &str) -> Result<(), StoreError> {
        {
            let mut entries = self.entries()?;
            let mut stored = self.load_tasks(&mut entries, scope)?;
            stored.retain(|s| !(s.in_scope(scope) && s.item.id == id));
            self.put(&mut entries, TASKS_KEY, &stored)?;
        }
        self.notify(Table::Tasks, scope);
        Ok(())
    }

    async fn list_notes(&self, scope: &Scope, encrypted: bool) -> Result<Vec<Note>, StoreError> {
        let entries = self.entries()?;
        let stored: Vec<Scoped<Note>> = Self::read(&entries, NOTES_KEY)?.unwrap_or_default();
        let mut notes: Vec<Note> = stored
            .into_iter()
            .filter(|n| n.in_scope(scope) && n.item.encrypted == encrypted)
            .map(|n| n.item)
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(notes)
    }

    async fn upsert_note(&self, scope: &Scope, note: &Note) -> Result<(), StoreError> {
        if note.encrypted && !note.content.is_encrypted() {
            return Err(StoreError::InvalidData(format!(
                "refusing to store plaintext content for encrypted note {}",
                note.id
            )));
        }
        {
            let mut entries = self.entries()?;
            let mut stored: Vec<Scoped<Note>> = Self::read(&entries, NOTES_KEY)?.unwrap_or_default();
            match stored.iter_mut().find(|n| n.in_scope(scope) && n.item.id == note.id) {
                Some(slot) => slot.item = note.clone(),
                None => stored.push(Scoped::new(scope, note.clone())),
            }
            self.put(&mut entries, NOTES_KEY, &stored)?;
        }
        self.notify(Table::Notes, scope);
        Ok(())
    }

    async fn delete_note(&self, scope: &Scope, id: &str) -> Result<(), StoreError> {
        {
            let mut entries = self.entries()?;
            let mut stored: Vec<Scoped<Note>> = Self::read(&entries, NOTES_KEY)?.unwrap_or_default();
            stored.retain(|n| !(n.in_scope(scope) && n.item.id == id));
            self.put(&mut entries, NOTES_KEY, &stored)?;
        }
        self.notify(Table::Notes, scope);
        Ok(())
    }

    async fn mark_note_anchored(&self, scope: &Scope, id: &str, tx_hash: &str) -> Result<(), StoreError> {
        {
            let mut entries = self.entries()?;
            let mut stored: Vec<Scoped<Note>> = Self::read(&entries, NOTES_KEY)?.unwrap_or_default();
            if let Some(slot) = stored
                .iter_mut()
                .find(|n| n.in_scope(scope) && n.item.id == id)
            {
                slot.item.on_chain = true;
                slot.item.tx_hash = Some(tx_hash.to_string());
            }
            self.put(&mut entries, NOTES_KEY, &stored)?;
        }
        self.notify(Table::Notes, scope);
        Ok(())
    }

    async fn note_counts(&self, wallet_address: &str) -> Result<NoteCounts, StoreError> {
        let entries = self.entries()?;
        let stored: Vec<Scoped<Note>> = Self::read(&entries, NOTES_KEY)?.unwrap_or_default();
        let mine = stored.iter().filter(|n| n.wallet_address == wallet_address);
        let mut counts = NoteCounts::default();
        for note in mine {
            if note.item.encrypted {
                counts.encrypted += 1;
            }
            if note.item.on_chain {
                counts.anchored += 1;
            }
        }
        Ok(counts)
    }

    async fn load_profile(&self, wallet_address: &str) -> Result<Option<UserProfile>, StoreError> {
        Self::read(&*self.entries()?, &Self::profile_key(wallet_address))
    }

    async fn save_profile(&self, wallet_address: &str, profile: &UserProfile) -> Result<(), StoreError> {
        let mut entries = self.entries()?;
        self.put(&mut entries, &Self::profile_key(wallet_address), profile)
    }

    async fn load_history(&self, wallet_address: &str) -> Result<Vec<HistoryItem>, StoreError> {
        Ok(Self::read(&*self.entries()?, &Self::history_key(wallet_address))?.unwrap_or_default())
    }

    async fn append_history(&self, wallet_address: &str, item: &HistoryItem) -> Result<(), StoreError> {
        let mut entries = self.entries()?;
        let key = Self::history_key(wallet_address);
        let mut history: Vec<HistoryItem> = Self::read(&entries, &key)?.unwrap_or_default();
        history.push(item.clone());
        self.put(&mut entries, &key, &history)
    }

    async fn add_focus_minutes(&self, wallet_address: &str, minutes: u32) -> Result<u64, StoreError> {
        let mut entries = self.entries()?;
        let key = Self::focus_key(wallet_address);
        let total = Self::read::<u64>(&entries, &key)?.unwrap_or(0) + u64::from(minutes);
        self.put(&mut entries, &key, &total)?;
        Ok(total)
    }

    async fn focus_minutes(&self, wallet_address: &str) -> Result<u64, StoreError> {
        Ok(Self::read(&*self.entries()?, &Self::focus_key(wallet_address))?.unwrap_or(0))
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
