//! Notes manager, plain and encrypted.
//!
//! Notes follow the same optimistic contract as tasks. Encrypted notes hold
//! ciphertext wrappers until selected with an unlocked [`Vault`]; saving
//! encrypts the document again before it leaves memory.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::chain::{ChainCall, ChainConnector, TxHandle};
use crate::config::FailurePolicy;
use crate::confirm::Confirm;
use crate::context::Context;
use crate::crypto::{self, CryptoError};
use crate::error::ArcError;
use crate::models::{Note, NoteContent, Scope};
use crate::store::{Store, StoreError, StoreEvent, Table};
use crate::vault::Vault;

/// Editor changes held in memory until [`NotesManager::save`]
#[derive(Debug, Clone, Default)]
pub struct NoteEdit {
    pub title: Option<String>,
    pub content: Option<serde_json::Value>,
    pub tags: Option<Vec<String>>,
}

/// Rich-text document with one paragraph per line of `text`
pub fn text_document(text: &str) -> serde_json::Value {
    let paragraphs: Vec<serde_json::Value> = text
        .lines()
        .map(|line| {
            if line.is_empty() {
                serde_json::json!({ "type": "paragraph" })
            } else {
                serde_json::json!({
                    "type": "paragraph",
                    "content": [{ "type": "text", "text": line }]
                })
            }
        })
        .collect();
    serde_json::json!({ "type": "doc", "content": paragraphs })
}

/// Plain text of a document: text nodes joined, one line per block
pub fn document_text(document: &serde_json::Value) -> String {
    fn walk(node: &serde_json::Value, out: &mut String) {
        if let Some(text) = node.get("text").and_then(|t| t.as_str()) {
            out.push_str(text);
        }
        if let Some(children) = node.get("content").and_then(|c| c.as_array()) {
            for child in children {
                walk(child, out);
                if child.get("text").is_none() && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }

    let mut out = String::new();
    walk(document, &mut out);
    out.trim_end().to_string()
}

pub struct NotesManager {
    store: Arc<dyn Store>,
    ctx: Context,
    policy: FailurePolicy,
    encrypted: bool,
    notes: Vec<Note>,
    changes: broadcast::Receiver<StoreEvent>,
}

impl NotesManager {
    pub fn plain(store: Arc<dyn Store>, ctx: Context, policy: FailurePolicy) -> Self {
        Self::new(store, ctx, policy, false)
    }

    pub fn encrypted(store: Arc<dyn Store>, ctx: Context, policy: FailurePolicy) -> Self {
        Self::new(store, ctx, policy, true)
    }

    fn new(store: Arc<dyn Store>, ctx: Context, policy: FailurePolicy, encrypted: bool) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            ctx,
            policy,
            encrypted,
            notes: Vec::new(),
            changes,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub async fn load(&mut self) -> Result<(), ArcError> {
        let Ok(scope) = self.ctx.scope() else {
            self.notes.clear();
            return Ok(());
        };
        self.notes = self.store.list_notes(&scope, self.encrypted).await?;
        Ok(())
    }

    /// Create a note with placeholder content and persist it right away.
    /// Encrypted notes need an unlocked vault.
    pub async fn create(&mut self, title: Option<String>, vault: &Vault) -> Result<String, ArcError> {
        let scope = self.ctx.scope()?;
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.default_title().to_string());

        let mut note = Note::new(title, self.encrypted);
        if self.encrypted {
            let password = vault.password()?;
            note.content = NoteContent::Encrypted(crypto::encrypt(&note.content, password)?);
        }
        let id = note.id.clone();

        self.notes.insert(0, note.clone());
        if let Err(e) = self.store.upsert_note(&scope, &note).await {
            tracing::error!("Failed to create note, rolling back: {}", e);
            self.notes.retain(|n| n.id != id);
            return Err(e.into());
        }
        Ok(id)
    }

    fn default_title(&self) -> &'static str {
        if self.encrypted { "Untitled Page" } else { "Untitled Note" }
    }

    /// Apply editor changes in memory. Nothing is persisted until `save`.
    pub fn edit(&mut self, id: &str, edit: NoteEdit) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if let Some(title) = edit.title {
            note.title = title;
        }
        if let Some(content) = edit.content {
            note.content = NoteContent::Document(content);
        }
        if let Some(tags) = edit.tags {
            note.tags = tags;
        }
        note.updated_at = crate::utils::now_rfc3339();
        true
    }

    /// Persist a note. Encrypted notes are encrypted under the vault password
    /// first; the store only ever sees the wrapper.
    pub async fn save(&mut self, id: &str, vault: &Vault) -> Result<(), ArcError> {
        let scope = self.ctx.scope()?;
        let Some(index) = self.notes.iter().position(|n| n.id == id) else {
            return Err(ArcError::validation(format!("Note not found: {}", id)));
        };

        let mut stored = self.notes[index].clone();
        stored.updated_at = crate::utils::now_rfc3339();
        if self.encrypted {
            if let NoteContent::Document(document) = &stored.content {
                let password = vault.password()?;
                stored.content = NoteContent::Encrypted(crypto::encrypt(document, password)?);
            }
        }
        self.notes[index].updated_at = stored.updated_at.clone();

        if let Err(e) = self.store.upsert_note(&scope, &stored).await {
            return self.write_failed(&scope, "save", e).await;
        }
        tracing::debug!(id, "note saved");
        Ok(())
    }

    /// Open a note for reading. Encrypted notes are decrypted with the vault
    /// password and kept decrypted in memory for editing; a locked vault
    /// shows nothing, even for notes already decrypted.
    pub fn select(&mut self, id: &str, vault: &Vault) -> Result<serde_json::Value, ArcError> {
        let encrypted = self.encrypted;
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return Err(ArcError::validation(format!("Note not found: {}", id)));
        };
        let password = if encrypted || note.encrypted {
            Some(vault.password()?)
        } else {
            None
        };
        let payload = match &note.content {
            NoteContent::Document(document) => return Ok(document.clone()),
            NoteContent::Encrypted(payload) => payload,
        };
        let Some(password) = password else {
            return Err(ArcError::Locked);
        };
        // Any decrypt failure is reported the same way
        let document: serde_json::Value = crypto::decrypt_payload(payload, password).map_err(|e| {
            if !matches!(e, CryptoError::Authentication) {
                tracing::warn!("Failed to decrypt note: {}", e);
            }
            ArcError::WrongPassword
        })?;
        note.content = NoteContent::Document(document.clone());
        Ok(document)
    }

    /// Delete after confirmation. Returns false when the user declined.
    pub async fn delete(&mut self, id: &str, confirm: &dyn Confirm) -> Result<bool, ArcError> {
        let scope = self.ctx.scope()?;
        if self.get(id).is_none() {
            return Ok(false);
        }
        if !confirm.confirm("Are you sure you want to delete this note?") {
            return Ok(false);
        }
        self.notes.retain(|n| n.id != id);
        if let Err(e) = self.store.delete_note(&scope, id).await {
            self.write_failed(&scope, "delete", e).await?;
        }
        Ok(true)
    }

    /// Record the note's content hash on-chain. On failure the note is left
    /// untouched and the chain message is returned as-is.
    pub async fn anchor(&mut self, id: &str, chain: &dyn ChainConnector) -> Result<TxHandle, ArcError> {
        let scope = self.ctx.scope()?;
        let Some(note) = self.get(id) else {
            return Err(ArcError::validation(format!("Note not found: {}", id)));
        };
        let document = serde_json::to_value(&note.content).map_err(StoreError::from)?;
        let call = ChainCall::AnchorDocument {
            doc_id: note.id.clone(),
            content_hash: crypto::content_hash(&document),
        };

        let tx = chain.submit(&scope.wallet_address, call).await?;
        if let Some(note) = self.notes.iter_mut().find(|n| n.id == id) {
            note.on_chain = true;
            note.tx_hash = Some(tx.hash.clone());
        }
        if let Err(e) = self.store.mark_note_anchored(&scope, id, &tx.hash).await {
            self.write_failed(&scope, "anchor", e).await?;
        }
        tracing::info!(id, tx = %tx.hash, "note anchored");
        Ok(tx)
    }

    /// Title and tag search
    pub fn filter(&self, query: &str) -> Vec<&Note> {
        let query = query.trim();
        self.notes.iter().filter(|n| query.is_empty() || n.matches(query)).collect()
    }

    /// Refetch when another session changed this wallet's notes
    pub async fn sync_changes(&mut self) -> Result<bool, ArcError> {
        let Ok(scope) = self.ctx.scope() else {
            return Ok(false);
        };
        let mut stale = false;
        loop {
            match self.changes.try_recv() {
                Ok(event) => stale |= event.concerns(Table::Notes, &scope),
                Err(TryRecvError::Lagged(_)) => stale = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if stale {
            self.notes = self.store.list_notes(&scope, self.encrypted).await?;
        }
        Ok(stale)
    }

    async fn write_failed(&mut self, scope: &Scope, operation: &str, error: StoreError) -> Result<(), ArcError> {
        tracing::error!(operation, "Failed to persist note change: {}", error);
        if self.policy == FailurePolicy::Reconcile {
            match self.store.list_notes(scope, self.encrypted).await {
                Ok(notes) => self.notes = notes,
                Err(e) => tracing::error!("Failed to reconcile notes: {}", e),
            }
        }
        Err(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::test_support::RecordingChain;
    use crate::models::Workspace;
    use crate::store::SqliteStore;
    use crate::store::test_support::FlakyStore;
    use serde_json::json;

    fn ctx() -> Context {
        Context::new(Some("0xabc".to_string()), Workspace::default())
    }

    fn store() -> Arc<dyn Store> {
        Arc::new(SqliteStore::open_in_memory().unwrap())
    }

    async fn unlocked_vault(chain: &RecordingChain) -> Vault {
        let mut vault = Vault::new();
        vault.establish(chain, "0xabc", "correct horse", "correct horse").await.unwrap();
        vault
    }

    fn placeholder_document() -> serde_json::Value {
        match NoteContent::placeholder() {
            NoteContent::Document(doc) => doc,
            NoteContent::Encrypted(_) => unreachable!(),
        }
    }

    #[test]
    fn test_text_document_roundtrip() {
        let doc = text_document("gm\nship it");
        assert_eq!(document_text(&doc), "gm\nship it");

        assert!(document_text(&placeholder_document()).starts_with("Start writing"));
    }

    #[tokio::test]
    async fn test_same_title_notes_get_distinct_ids() {
        let store = store();
        let mut notes = NotesManager::plain(store.clone(), ctx(), FailurePolicy::KeepLocal);
        let vault = Vault::new();

        let a = notes.create(Some("Standup".to_string()), &vault).await.unwrap();
        let b = notes.create(Some("Standup".to_string()), &vault).await.unwrap();
        assert_ne!(a, b);

        let mut reloaded = NotesManager::plain(store, ctx(), FailurePolicy::KeepLocal);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.notes().len(), 2);
        assert!(reloaded.notes().iter().all(|n| n.title == "Standup"));
    }

    #[tokio::test]
    async fn test_plain_note_defaults() {
        let mut notes = NotesManager::plain(store(), ctx(), FailurePolicy::KeepLocal);
        let id = notes.create(None, &Vault::new()).await.unwrap();
        let note = notes.get(&id).unwrap();
        assert_eq!(note.title, "Untitled Note");
        assert_eq!(note.content, NoteContent::placeholder());
        assert!(!note.encrypted);
    }

    #[tokio::test]
    async fn test_edit_is_memory_only_until_save() {
        let store = store();
        let mut notes = NotesManager::plain(store.clone(), ctx(), FailurePolicy::KeepLocal);
        let vault = Vault::new();
        let id = notes.create(None, &vault).await.unwrap();

        notes.edit(
            &id,
            NoteEdit {
                title: Some("Roadmap".to_string()),
                ..NoteEdit::default()
            },
        );
        let mut other = NotesManager::plain(store.clone(), ctx(), FailurePolicy::KeepLocal);
        other.load().await.unwrap();
        assert_eq!(other.notes()[0].title, "Untitled Note");

        notes.save(&id, &vault).await.unwrap();
        other.load().await.unwrap();
        assert_eq!(other.notes()[0].title, "Roadmap");
    }

    #[tokio::test]
    async fn test_encrypted_notes_need_unlocked_vault() {
        let mut notes = NotesManager::encrypted(store(), ctx(), FailurePolicy::KeepLocal);
        let err = notes.create(None, &Vault::new()).await.unwrap_err();
        assert!(matches!(err, ArcError::Locked));
        assert!(notes.notes().is_empty());
    }

    #[tokio::test]
    async fn test_encrypted_save_never_stores_plaintext() {
        let chain = RecordingChain::default();
        let vault = unlocked_vault(&chain).await;
        let store = store();
        let mut notes = NotesManager::encrypted(store.clone(), ctx(), FailurePolicy::KeepLocal);

        let id = notes.create(None, &vault).await.unwrap();
        assert_eq!(notes.get(&id).unwrap().title, "Untitled Page");

        let secret = json!({"type": "doc", "content": [{"type": "text", "text": "seed phrase"}]});
        notes.edit(
            &id,
            NoteEdit {
                content: Some(secret.clone()),
                ..NoteEdit::default()
            },
        );
        notes.save(&id, &vault).await.unwrap();

        let mut reloaded = NotesManager::encrypted(store, ctx(), FailurePolicy::KeepLocal);
        reloaded.load().await.unwrap();
        let stored = reloaded.get(&id).unwrap();
        assert!(stored.content.is_encrypted());
        assert!(!serde_json::to_string(&stored.content).unwrap().contains("seed phrase"));

        assert_eq!(reloaded.select(&id, &vault).unwrap(), secret);
    }

    #[tokio::test]
    async fn test_select_with_wrong_password_reveals_nothing() {
        let chain = RecordingChain::default();
        let vault = unlocked_vault(&chain).await;
        let store = store();
        let mut notes = NotesManager::encrypted(store.clone(), ctx(), FailurePolicy::KeepLocal);
        let id = notes.create(None, &vault).await.unwrap();

        let other_chain = RecordingChain::default();
        let mut wrong = Vault::new();
        wrong.establish(&other_chain, "0xabc", "battery staple", "battery staple").await.unwrap();

        let mut reloaded = NotesManager::encrypted(store, ctx(), FailurePolicy::KeepLocal);
        reloaded.load().await.unwrap();
        let err = reloaded.select(&id, &wrong).unwrap_err();
        assert!(matches!(err, ArcError::WrongPassword));
        assert!(reloaded.get(&id).unwrap().content.is_encrypted());
    }

    #[tokio::test]
    async fn test_locked_vault_hides_selected_note() {
        let chain = RecordingChain::default();
        let mut vault = unlocked_vault(&chain).await;
        let mut notes = NotesManager::encrypted(store(), ctx(), FailurePolicy::KeepLocal);
        let id = notes.create(None, &vault).await.unwrap();
        notes.select(&id, &vault).unwrap();

        vault.lock();
        let err = notes.select(&id, &vault).unwrap_err();
        assert!(matches!(err, ArcError::Locked));

        vault.unlock(&chain, "0xabc", "correct horse").await.unwrap();
        assert_eq!(notes.select(&id, &vault).unwrap(), placeholder_document());
    }

    #[tokio::test]
    async fn test_sync_refetches_notes_changed_elsewhere() {
        let store = store();
        let vault = Vault::new();
        let mut ours = NotesManager::plain(store.clone(), ctx(), FailurePolicy::KeepLocal);
        let mut theirs = NotesManager::plain(store.clone(), ctx(), FailurePolicy::KeepLocal);

        let id = theirs.create(Some("From another tab".to_string()), &vault).await.unwrap();
        assert!(ours.sync_changes().await.unwrap());
        assert_eq!(ours.notes().len(), 1);
        assert!(!ours.sync_changes().await.unwrap());

        theirs.delete(&id, &|_: &str| true).await.unwrap();
        assert!(ours.sync_changes().await.unwrap());
        assert!(ours.notes().is_empty());
    }

    #[tokio::test]
    async fn test_sync_ignores_other_workspaces() {
        let store = store();
        let mut ours = NotesManager::plain(store.clone(), ctx(), FailurePolicy::KeepLocal);
        let side = Context::new(Some("0xabc".to_string()), Workspace::new("Side".to_string()));
        let mut theirs = NotesManager::plain(store.clone(), side, FailurePolicy::KeepLocal);

        theirs.create(Some("Elsewhere".to_string()), &Vault::new()).await.unwrap();
        assert!(!ours.sync_changes().await.unwrap());
        assert!(ours.notes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_asks_first() {
        let mut notes = NotesManager::plain(store(), ctx(), FailurePolicy::KeepLocal);
        let id = notes.create(None, &Vault::new()).await.unwrap();

        assert!(!notes.delete(&id, &|_: &str| false).await.unwrap());
        assert!(notes.get(&id).is_some());

        assert!(notes.delete(&id, &|_: &str| true).await.unwrap());
        assert!(notes.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_create_rolls_back_on_store_failure() {
        let store = FlakyStore::new();
        store.set_failing(true);
        let mut notes = NotesManager::plain(store, ctx(), FailurePolicy::KeepLocal);

        assert!(notes.create(None, &Vault::new()).await.is_err());
        assert!(notes.notes().is_empty());
    }

    #[tokio::test]
    async fn test_anchor_marks_note() {
        let chain = RecordingChain::default();
        let mut notes = NotesManager::plain(store(), ctx(), FailurePolicy::KeepLocal);
        let id = notes.create(None, &Vault::new()).await.unwrap();

        let tx = notes.anchor(&id, &chain).await.unwrap();
        let note = notes.get(&id).unwrap();
        assert!(note.on_chain);
        assert_eq!(note.tx_hash.as_deref(), Some(tx.hash.as_str()));
        assert!(matches!(
            &chain.calls.lock().unwrap()[0],
            ChainCall::AnchorDocument { doc_id, .. } if doc_id == &id
        ));
    }

    #[tokio::test]
    async fn test_failed_anchor_leaves_note_unchanged() {
        let chain = RecordingChain::failing("insufficient funds for gas");
        let mut notes = NotesManager::plain(store(), ctx(), FailurePolicy::KeepLocal);
        let id = notes.create(None, &Vault::new()).await.unwrap();

        let err = notes.anchor(&id, &chain).await.unwrap_err();
        assert_eq!(err.to_string(), "insufficient funds for gas");
        assert!(!notes.get(&id).unwrap().on_chain);
    }
}
