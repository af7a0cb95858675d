use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Board column a task sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnId {
    Backlog,
    Bounty,
    Todo,
    InProgress,
    Review,
    Done,
}

impl ColumnId {
    pub const ALL: [ColumnId; 6] = [
        ColumnId::Backlog,
        ColumnId::Bounty,
        ColumnId::Todo,
        ColumnId::InProgress,
        ColumnId::Review,
        ColumnId::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnId::Backlog => "backlog",
            ColumnId::Bounty => "bounty",
            ColumnId::Todo => "todo",
            ColumnId::InProgress => "inprogress",
            ColumnId::Review => "review",
            ColumnId::Done => "done",
        }
    }

    /// Title shown above the column on the board
    pub fn title(&self) -> &'static str {
        match self {
            ColumnId::Backlog => "Backlog",
            ColumnId::Bounty => "Bounty Board",
            ColumnId::Todo => "To Do",
            ColumnId::InProgress => "In Progress",
            ColumnId::Review => "Community Review",
            ColumnId::Done => "Done",
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backlog" => Ok(ColumnId::Backlog),
            "bounty" => Ok(ColumnId::Bounty),
            "todo" => Ok(ColumnId::Todo),
            "inprogress" | "in-progress" => Ok(ColumnId::InProgress),
            "review" => Ok(ColumnId::Review),
            "done" => Ok(ColumnId::Done),
            other => Err(format!("Unknown column: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub completed: bool,
}

impl Subtask {
    pub fn new(content: String) -> Self {
        Self {
            id: crate::utils::generate_id(),
            content,
            completed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub column_id: ColumnId,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>, // ISO 8601: YYYY-MM-DD
}

impl Task {
    pub fn new(content: String, column_id: ColumnId) -> Self {
        Self {
            id: crate::utils::generate_id(),
            column_id,
            content,
            tags: Vec::new(),
            subtasks: Vec::new(),
            bounty: None,
            assignee: None,
            due_date: None,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Case-insensitive match against content and tags
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.content.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

/// Partial update merged into a task. `None` leaves a field untouched; the
/// nested options on scalar fields allow clearing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub column_id: Option<ColumnId>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub bounty: Option<Option<String>>,
    pub assignee: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
}

impl TaskPatch {
    pub fn column(column_id: ColumnId) -> Self {
        Self {
            column_id: Some(column_id),
            ..Self::default()
        }
    }

    pub fn apply(self, task: &mut Task) {
        if let Some(column_id) = self.column_id {
            task.column_id = column_id;
        }
        if let Some(content) = self.content {
            task.content = content;
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
        if let Some(subtasks) = self.subtasks {
            task.subtasks = subtasks;
        }
        if let Some(bounty) = self.bounty {
            task.bounty = bounty;
        }
        if let Some(assignee) = self.assignee {
            task.assignee = assignee;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Ciphertext wrapper stored in place of an encrypted note's document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub encrypted_data: String,
    pub salt: String,
    pub iv: String,
    pub is_encrypted_wrapper: bool,
}

/// A note's stored content. Only objects flagged `isEncryptedWrapper: true`
/// read back as ciphertext; anything else is a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NoteContent {
    Encrypted(EncryptedPayload),
    Document(serde_json::Value),
}

impl<'de> Deserialize<'de> for NoteContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let is_wrapper = value
            .get("isEncryptedWrapper")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if is_wrapper {
            serde_json::from_value(value)
                .map(NoteContent::Encrypted)
                .map_err(serde::de::Error::custom)
        } else {
            Ok(NoteContent::Document(value))
        }
    }
}

impl NoteContent {
    /// Placeholder document given to every new note
    pub fn placeholder() -> Self {
        NoteContent::Document(serde_json::json!({
            "type": "doc",
            "content": [
                {
                    "type": "paragraph",
                    "content": [
                        { "type": "text", "text": "Start writing with Notion-style blocks. Type / for commands." }
                    ]
                }
            ]
        }))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, NoteContent::Encrypted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: NoteContent,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub encrypted: bool,
    #[serde(default)]
    pub on_chain: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl Note {
    pub fn new(title: String, encrypted: bool) -> Self {
        let now = crate::utils::now_rfc3339();
        Self {
            id: crate::utils::generate_id(),
            title,
            content: NoteContent::placeholder(),
            tags: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
            encrypted,
            on_chain: false,
            tx_hash: None,
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&query))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

impl Workspace {
    pub fn new(name: String) -> Self {
        Self {
            id: crate::utils::short_id(),
            name,
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            id: "1".to_string(),
            name: "My Workspace".to_string(),
        }
    }
}

/// Durable-store partition: one wallet's view of one workspace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub wallet_address: String,
    pub workspace_id: String,
}

impl Scope {
    pub fn new(wallet_address: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            workspace_id: workspace_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub nickname: String,
    pub job_title: String,
    pub age: String,
}

/// One successful archive, appended to the wallet's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub date: String,
    pub timestamp: i64, // milliseconds since the epoch
    pub tasks: Vec<String>,
}

impl HistoryItem {
    pub fn new(tasks: Vec<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            timestamp: now.timestamp_millis(),
            tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_id_serializes_like_board_ids() {
        let json = serde_json::to_string(&ColumnId::InProgress).unwrap();
        assert_eq!(json, "\"inprogress\"");
        for column in ColumnId::ALL {
            assert_eq!(column.as_str().parse::<ColumnId>().unwrap(), column);
        }
        assert!("archived".parse::<ColumnId>().is_err());
    }

    #[test]
    fn test_task_reads_exported_board_json() {
        let json = r#"[{"id":"3","columnId":"todo","content":"Design Profile Page UI","assignee":"Alex","tags":["Design"],"dueDate":"2025-12-02"}]"#;
        let tasks: Vec<Task> = serde_json::from_str(json).unwrap();
        assert_eq!(tasks[0].column_id, ColumnId::Todo);
        assert_eq!(tasks[0].assignee.as_deref(), Some("Alex"));
        assert!(tasks[0].subtasks.is_empty());
    }

    #[test]
    fn test_patch_can_clear_optional_fields() {
        let mut task = Task::new("Audit".to_string(), ColumnId::Review);
        task.bounty = Some("2.0 ETH".to_string());
        TaskPatch {
            bounty: Some(None),
            content: Some("Audit vesting".to_string()),
            ..TaskPatch::default()
        }
        .apply(&mut task);
        assert_eq!(task.bounty, None);
        assert_eq!(task.content, "Audit vesting");
        assert_eq!(task.column_id, ColumnId::Review);
    }

    #[test]
    fn test_note_content_detects_wrapper() {
        let wrapped = serde_json::json!({
            "encryptedData": "AAAA",
            "salt": "BBBB",
            "iv": "CCCC",
            "isEncryptedWrapper": true
        });
        let content: NoteContent = serde_json::from_value(wrapped).unwrap();
        assert!(content.is_encrypted());

        let doc: NoteContent = serde_json::from_value(serde_json::json!({"type": "doc"})).unwrap();
        assert!(!doc.is_encrypted());
    }

    #[test]
    fn test_document_with_wrapper_like_keys_stays_a_document() {
        let lookalike = serde_json::json!({
            "type": "doc",
            "encryptedData": "AAAA",
            "salt": "BBBB",
            "iv": "CCCC"
        });
        let content: NoteContent = serde_json::from_value(lookalike.clone()).unwrap();
        assert_eq!(content, NoteContent::Document(lookalike));

        let flagged_off = serde_json::json!({
            "encryptedData": "AAAA",
            "salt": "BBBB",
            "iv": "CCCC",
            "isEncryptedWrapper": false
        });
        let content: NoteContent = serde_json::from_value(flagged_off).unwrap();
        assert!(!content.is_encrypted());
    }
}
