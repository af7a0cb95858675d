use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{HistoryItem, Note, NoteContent, Scope, Subtask, Task, UserProfile};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Invalid JSON column: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Invalid column value: {0}")]
    InvalidValue(String),
}

/// One recorded chain call from the offline ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub tx_hash: String,
    pub sender: String,
    pub contract: String,
    pub function_name: String,
    pub args: String,
    pub created_at: String,
}

pub struct Database {
    conn: Connection,
}

const TASK_COLUMNS: &str =
    "id, content, column_id, tags, subtasks, bounty, assignee, due_date";
const NOTE_COLUMNS: &str =
    "id, title, content, tags, created_at, updated_at, is_encrypted, on_chain, tx_hash";

const TASK_TABLE_COLUMNS: &str = "id, wallet_address, workspace_id, content, column_id, tags, subtasks, \
     bounty, assignee, due_date, created_at, updated_at";
const NOTE_TABLE_COLUMNS: &str = "id, wallet_address, workspace_id, title, content, tags, is_encrypted, \
     on_chain, tx_hash, created_at, updated_at";

fn tasks_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id              TEXT NOT NULL,
            wallet_address  TEXT NOT NULL,
            workspace_id    TEXT NOT NULL,
            content         TEXT NOT NULL,
            column_id       TEXT NOT NULL DEFAULT 'todo',
            tags            TEXT NOT NULL DEFAULT '[]',
            subtasks        TEXT NOT NULL DEFAULT '[]',
            bounty          TEXT,
            assignee        TEXT,
            due_date        TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (wallet_address, workspace_id, id)
        )"
    )
}

fn notes_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id              TEXT NOT NULL,
            wallet_address  TEXT NOT NULL,
            workspace_id    TEXT NOT NULL,
            title           TEXT NOT NULL,
            content         TEXT NOT NULL,
            tags            TEXT NOT NULL DEFAULT '[]',
            is_encrypted    INTEGER NOT NULL DEFAULT 0,
            on_chain        INTEGER NOT NULL DEFAULT 0,
            tx_hash         TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (wallet_address, workspace_id, id)
        )"
    )
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open a private in-memory database (tests and throwaway sessions)
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(&tasks_table_sql("tasks"), [])?;
        self.conn.execute(&notes_table_sql("notes"), [])?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS profiles (
                wallet_address  TEXT PRIMARY KEY,
                nickname        TEXT NOT NULL DEFAULT '',
                job_title       TEXT NOT NULL DEFAULT '',
                age             TEXT NOT NULL DEFAULT '',
                focus_minutes   INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet_address  TEXT NOT NULL,
                date            TEXT NOT NULL,
                timestamp       INTEGER NOT NULL,
                tasks           TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger (
                tx_hash         TEXT PRIMARY KEY,
                sender          TEXT NOT NULL,
                contract        TEXT NOT NULL,
                function_name   TEXT NOT NULL,
                args            TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS password_hashes (
                wallet_address  TEXT PRIMARY KEY,
                hash            TEXT NOT NULL
            )",
            [],
        )?;

        // Older databases predate anchoring support
        self.migrate_add_note_chain_columns()?;
        // Older databases keyed tasks and notes by id alone
        self.migrate_scoped_primary_keys()?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tasks_scope ON tasks(wallet_address, workspace_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_notes_scope ON notes(wallet_address, workspace_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_wallet ON history(wallet_address)",
            [],
        )?;

        Ok(())
    }

    fn column_exists(&self, table: &str, column: &str) -> Result<bool, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2"
        )?;
        let count: i64 = stmt.query_row(rusqlite::params![table, column], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Migrate the notes table to carry on-chain anchoring state
    fn migrate_add_note_chain_columns(&self) -> Result<(), DatabaseError> {
        if !self.column_exists("notes", "on_chain")? {
            self.conn.execute(
                "ALTER TABLE notes ADD COLUMN on_chain INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }

        if !self.column_exists("notes", "tx_hash")? {
            self.conn.execute("ALTER TABLE notes ADD COLUMN tx_hash TEXT", [])?;
        }

        Ok(())
    }

    /// Rebuild tasks and notes so ids are unique per wallet and workspace
    /// instead of globally
    fn migrate_scoped_primary_keys(&self) -> Result<(), DatabaseError> {
        for (table, create, columns) in [
            ("tasks", tasks_table_sql as fn(&str) -> String, TASK_TABLE_COLUMNS),
            ("notes", notes_table_sql as fn(&str) -> String, NOTE_TABLE_COLUMNS),
        ] {
            let key_columns: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE pk > 0",
                rusqlite::params![table],
                |row| row.get(0),
            )?;
            if key_columns > 1 {
                continue;
            }

            tracing::info!(table, "migrating to per-workspace primary key");
            let legacy = format!("{table}_legacy");
            let tx = self.conn.unchecked_transaction()?;
            tx.execute(&format!("ALTER TABLE {table} RENAME TO {legacy}"), [])?;
            tx.execute(&create(table), [])?;
            tx.execute(
                &format!("INSERT OR IGNORE INTO {table} ({columns}) SELECT {columns} FROM {legacy}"),
                [],
            )?;
            tx.execute(&format!("DROP TABLE {legacy}"), [])?;
            tx.commit()?;
        }
        Ok(())
    }

    fn now() -> String {
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Helper function to map a row to a Task
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        let column: String = row.get(2)?;
        let tags: String = row.get(3)?;
        let subtasks: String = row.get(4)?;
        Ok(Task {
            id: row.get(0)?,
            content: row.get(1)?,
            column_id: column.parse().map_err(|e: String| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
            })?,
            tags: serde_json::from_str(&tags).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?,
            subtasks: serde_json::from_str::<Vec<Subtask>>(&subtasks).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
            bounty: row.get(5)?,
            assignee: row.get(6)?,
            due_date: row.get(7)?,
        })
    }

    /// Get all tasks in a scope, in insertion order
    pub fn get_tasks(&self, scope: &Scope) -> Result<Vec<Task>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE wallet_address = ?1 AND workspace_id = ?2 ORDER BY rowid ASC"
        ))?;
        let tasks = stmt
            .query_map(rusqlite::params![scope.wallet_address, scope.workspace_id], Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Insert a batch of tasks atomically
    pub fn insert_tasks(&self, scope: &Scope, tasks: &[Task]) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let now = Self::now();
        for task in tasks {
            tx.execute(
                "INSERT INTO tasks (id, wallet_address, workspace_id, content, column_id, tags, subtasks,
                                    bounty, assignee, due_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    task.id,
                    scope.wallet_address,
                    scope.workspace_id,
                    task.content,
                    task.column_id.as_str(),
                    serde_json::to_string(&task.tags)?,
                    serde_json::to_string(&task.subtasks)?,
                    task.bounty,
                    task.assignee,
                    task.due_date,
                    now,
                    now
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Update an existing task; returns false when no row in the scope matched
    pub fn update_task(&self, scope: &Scope, task: &Task) -> Result<bool, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE tasks SET content = ?1, column_id = ?2, tags = ?3, subtasks = ?4, bounty = ?5,
             assignee = ?6, due_date = ?7, updated_at = ?8
             WHERE id = ?9 AND wallet_address = ?10 AND workspace_id = ?11",
            rusqlite::params![
                task.content,
                task.column_id.as_str(),
                serde_json::to_string(&task.tags)?,
                serde_json::to_string(&task.subtasks)?,
                task.bounty,
                task.assignee,
                task.due_date,
                Self::now(),
                task.id,
                scope.wallet_address,
                scope.workspace_id
            ],
        )?;
        tx.commit()?;
        Ok(changed > 0)
    }

    /// Delete a task by ID
    pub fn delete_task(&self, scope: &Scope, id: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM tasks WHERE id = ?1 AND wallet_address = ?2 AND workspace_id = ?3",
            rusqlite::params![id, scope.wallet_address, scope.workspace_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Helper function to map a row to a Note
    fn row_to_note(row: &rusqlite::Row) -> Result<Note, rusqlite::Error> {
        let content: String = row.get(2)?;
        let tags: String = row.get(3)?;
        Ok(Note {
            id: row.get(0)?,
            title: row.get(1)?,
            content: serde_json::from_str::<NoteContent>(&content).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?,
            tags: serde_json::from_str(&tags).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            encrypted: row.get::<_, i64>(6)? != 0,
            on_chain: row.get::<_, i64>(7)? != 0,
            tx_hash: row.get(8)?,
        })
    }

    /// Get the notes of one kind (plain or encrypted), most recently updated first
    pub fn get_notes(&self, scope: &Scope, encrypted: bool) -> Result<Vec<Note>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE wallet_address = ?1 AND workspace_id = ?2 AND is_encrypted = ?3
             ORDER BY updated_at DESC"
        ))?;
        let notes = stmt
            .query_map(
                rusqlite::params![scope.wallet_address, scope.workspace_id, encrypted as i64],
                Self::row_to_note,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    /// Insert or replace a note within its scope
    pub fn upsert_note(&self, scope: &Scope, note: &Note) -> Result<(), DatabaseError> {
        if note.encrypted && !note.content.is_encrypted() {
            return Err(DatabaseError::InvalidValue(format!(
                "refusing to store plaintext content for encrypted note {}",
                note.id
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notes (id, wallet_address, workspace_id, title, content, tags, is_encrypted,
                                on_chain, tx_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(wallet_address, workspace_id, id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                tags = excluded.tags,
                is_encrypted = excluded.is_encrypted,
                on_chain = excluded.on_chain,
                tx_hash = excluded.tx_hash,
                updated_at = excluded.updated_at",
            rusqlite::params![
                note.id,
                scope.wallet_address,
                scope.workspace_id,
                note.title,
                serde_json::to_string(&note.content)?,
                serde_json::to_string(&note.tags)?,
                note.encrypted as i64,
                note.on_chain as i64,
                note.tx_hash,
                note.created_at,
                note.updated_at
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Record that a note's content hash was anchored on-chain
    pub fn mark_note_anchored(&self, scope: &Scope, id: &str, tx_hash: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE notes SET on_chain = 1, tx_hash = ?1
             WHERE id = ?2 AND wallet_address = ?3 AND workspace_id = ?4",
            rusqlite::params![tx_hash, id, scope.wallet_address, scope.workspace_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a note by ID
    pub fn delete_note(&self, scope: &Scope, id: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM notes WHERE id = ?1 AND wallet_address = ?2 AND workspace_id = ?3",
            rusqlite::params![id, scope.wallet_address, scope.workspace_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Count the wallet's notes across workspaces, with the anchored subset
    pub fn count_notes(&self, wallet_address: &str, encrypted: bool) -> Result<(u64, u64), DatabaseError> {
        let counts = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(on_chain), 0) FROM notes
             WHERE wallet_address = ?1 AND is_encrypted = ?2",
            rusqlite::params![wallet_address, encrypted as i64],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
        )?;
        Ok(counts)
    }

    /// Get the profile for a wallet, if one was ever saved
    pub fn get_profile(&self, wallet_address: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let profile = self
            .conn
            .query_row(
                "SELECT nickname, job_title, age FROM profiles WHERE wallet_address = ?1",
                rusqlite::params![wallet_address],
                |row| {
                    Ok(UserProfile {
                        nickname: row.get(0)?,
                        job_title: row.get(1)?,
                        age: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn save_profile(&self, wallet_address: &str, profile: &UserProfile) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO profiles (wallet_address, nickname, job_title, age) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(wallet_address) DO UPDATE SET
                nickname = excluded.nickname, job_title = excluded.job_title, age = excluded.age",
            rusqlite::params![wallet_address, profile.nickname, profile.job_title, profile.age],
        )?;
        Ok(())
    }

    pub fn add_focus_minutes(&self, wallet_address: &str, minutes: u32) -> Result<u64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO profiles (wallet_address, focus_minutes) VALUES (?1, ?2)
             ON CONFLICT(wallet_address) DO UPDATE SET focus_minutes = focus_minutes + excluded.focus_minutes",
            rusqlite::params![wallet_address, minutes],
        )?;
        self.get_focus_minutes(wallet_address)
    }

    pub fn get_focus_minutes(&self, wallet_address: &str) -> Result<u64, DatabaseError> {
        let minutes: Option<i64> = self
            .conn
            .query_row(
                "SELECT focus_minutes FROM profiles WHERE wallet_address = ?1",
                rusqlite::params![wallet_address],
                |row| row.get(0),
            )
            .optional()?;
        Ok(minutes.unwrap_or(0) as u64)
    }

    /// Get a wallet's archive history, oldest first
    pub fn get_history(&self, wallet_address: &str) -> Result<Vec<HistoryItem>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, timestamp, tasks FROM history WHERE wallet_address = ?1 ORDER BY id ASC"
        )?;
        let rows = stmt
            .query_map(rusqlite::params![wallet_address], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(date, timestamp, tasks)| {
                Ok(HistoryItem {
                    date,
                    timestamp,
                    tasks: serde_json::from_str(&tasks)?,
                })
            })
            .collect()
    }

    pub fn append_history(&self, wallet_address: &str, item: &HistoryItem) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO history (wallet_address, date, timestamp, tasks) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                wallet_address,
                item.date,
                item.timestamp,
                serde_json::to_string(&item.tasks)?
            ],
        )?;
        Ok(())
    }

    pub fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO ledger (tx_hash, sender, contract, function_name, args, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entry.tx_hash,
                entry.sender,
                entry.contract,
                entry.function_name,
                entry.args,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    pub fn get_ledger_entries(&self, sender: &str) -> Result<Vec<LedgerEntry>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT tx_hash, sender, contract, function_name, args, created_at
             FROM ledger WHERE sender = ?1 ORDER BY rowid ASC"
        )?;
        let entries = stmt
            .query_map(rusqlite::params![sender], |row| {
                Ok(LedgerEntry {
                    tx_hash: row.get(0)?,
                    sender: row.get(1)?,
                    contract: row.get(2)?,
                    function_name: row.get(3)?,
                    args: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn set_password_hash(&self, wallet_address: &str, hash: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO password_hashes (wallet_address, hash) VALUES (?1, ?2)
             ON CONFLICT(wallet_address) DO UPDATE SET hash = excluded.hash",
            rusqlite::params![wallet_address.to_lowercase(), hash],
        )?;
        Ok(())
    }

    pub fn get_password_hash(&self, wallet_address: &str) -> Result<Option<String>, DatabaseError> {
        let hash = self
            .conn
            .query_row(
                "SELECT hash FROM password_hashes WHERE wallet_address = ?1",
                rusqlite::params![wallet_address.to_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnId;

    fn scope() -> Scope {
        Scope::new("0xabc", "1")
    }

    #[test]
    fn test_task_roundtrip_through_rows() {
        let db = Database::open_in_memory().unwrap();
        let mut task = Task::new("Integrate IPFS Storage".to_string(), ColumnId::InProgress);
        task.tags = vec!["Dev".to_string()];
        task.subtasks = vec![Subtask::new("Pin CID".to_string())];
        task.due_date = Some("2025-12-08".to_string());

        db.insert_tasks(&scope(), std::slice::from_ref(&task)).unwrap();
        assert_eq!(db.get_tasks(&scope()).unwrap(), vec![task]);
    }

    #[test]
    fn test_tasks_are_scoped_by_wallet_and_workspace() {
        let db = Database::open_in_memory().unwrap();
        let task = Task::new("Mine".to_string(), ColumnId::Todo);
        db.insert_tasks(&scope(), &[task.clone()]).unwrap();

        assert!(db.get_tasks(&Scope::new("0xdef", "1")).unwrap().is_empty());
        assert!(db.get_tasks(&Scope::new("0xabc", "2")).unwrap().is_empty());

        // Another wallet cannot update or delete the row
        let mut hijack = task.clone();
        hijack.content = "Theirs".to_string();
        assert!(!db.update_task(&Scope::new("0xdef", "1"), &hijack).unwrap());
        db.delete_task(&Scope::new("0xdef", "1"), &task.id).unwrap();
        assert_eq!(db.get_tasks(&scope()).unwrap()[0].content, "Mine");
    }

    #[test]
    fn test_batch_insert_is_atomic() {
        let db = Database::open_in_memory().unwrap();
        let a = Task::new("A".to_string(), ColumnId::Todo);
        db.insert_tasks(&scope(), &[a.clone()]).unwrap();

        let b = Task::new("B".to_string(), ColumnId::Todo);
        // Duplicate id fails the whole batch
        assert!(db.insert_tasks(&scope(), &[b, a]).is_err());
        assert_eq!(db.get_tasks(&scope()).unwrap().len(), 1);
    }

    #[test]
    fn test_same_task_id_may_exist_in_each_workspace() {
        let db = Database::open_in_memory().unwrap();
        let task = Task::new("Copied board".to_string(), ColumnId::Todo);
        db.insert_tasks(&scope(), &[task.clone()]).unwrap();
        db.insert_tasks(&Scope::new("0xabc", "2"), &[task.clone()]).unwrap();
        db.insert_tasks(&Scope::new("0xdef", "1"), &[task.clone()]).unwrap();

        let mut moved = task.clone();
        moved.column_id = ColumnId::Done;
        assert!(db.update_task(&Scope::new("0xabc", "2"), &moved).unwrap());
        assert_eq!(db.get_tasks(&scope()).unwrap()[0].column_id, ColumnId::Todo);

        db.delete_task(&scope(), &task.id).unwrap();
        assert_eq!(db.get_tasks(&Scope::new("0xabc", "2")).unwrap().len(), 1);
    }

    #[test]
    fn test_note_upsert_stays_in_its_workspace() {
        let db = Database::open_in_memory().unwrap();
        let mut note = Note::new("Standup".to_string(), false);
        db.upsert_note(&scope(), &note).unwrap();
        note.title = "Retro".to_string();
        db.upsert_note(&Scope::new("0xabc", "2"), &note).unwrap();

        assert_eq!(db.get_notes(&scope(), false).unwrap()[0].title, "Standup");
        assert_eq!(db.get_notes(&Scope::new("0xabc", "2"), false).unwrap()[0].title, "Retro");

        db.mark_note_anchored(&scope(), &note.id, "0xfeed").unwrap();
        assert!(!db.get_notes(&Scope::new("0xabc", "2"), false).unwrap()[0].on_chain);
    }

    #[test]
    fn test_id_keyed_tables_are_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE tasks (
                    id TEXT PRIMARY KEY, wallet_address TEXT NOT NULL, workspace_id TEXT NOT NULL,
                    content TEXT NOT NULL, column_id TEXT NOT NULL DEFAULT 'todo',
                    tags TEXT NOT NULL DEFAULT '[]', subtasks TEXT NOT NULL DEFAULT '[]',
                    bounty TEXT, assignee TEXT, due_date TEXT,
                    created_at TEXT NOT NULL, updated_at TEXT NOT NULL
                );
                CREATE TABLE notes (
                    id TEXT PRIMARY KEY, wallet_address TEXT NOT NULL, workspace_id TEXT NOT NULL,
                    title TEXT NOT NULL, content TEXT NOT NULL, tags TEXT NOT NULL DEFAULT '[]',
                    is_encrypted INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL, updated_at TEXT NOT NULL
                );
                INSERT INTO tasks (id, wallet_address, workspace_id, content, created_at, updated_at)
                VALUES ('1', '0xabc', '1', 'Legacy task', 'now', 'now');",
            )
            .unwrap();
        }

        let db = Database::new(path.to_str().unwrap()).unwrap();
        assert_eq!(db.get_tasks(&scope()).unwrap()[0].content, "Legacy task");

        let copy = Task {
            id: "1".to_string(),
            ..Task::new("Same id elsewhere".to_string(), ColumnId::Todo)
        };
        db.insert_tasks(&Scope::new("0xabc", "2"), &[copy]).unwrap();
        assert_eq!(db.get_tasks(&Scope::new("0xabc", "2")).unwrap().len(), 1);
    }

    #[test]
    fn test_encrypted_note_refuses_plaintext() {
        let db = Database::open_in_memory().unwrap();
        let note = Note::new("Untitled Page".to_string(), true);
        assert!(matches!(
            db.upsert_note(&scope(), &note),
            Err(DatabaseError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_history_is_append_only_per_wallet() {
        let db = Database::open_in_memory().unwrap();
        db.append_history("0xabc", &HistoryItem::new(vec!["Write spec".to_string()])).unwrap();
        db.append_history("0xabc", &HistoryItem::new(vec!["Ship it".to_string()])).unwrap();
        db.append_history("0xdef", &HistoryItem::new(vec!["Other".to_string()])).unwrap();

        let history = db.get_history("0xabc").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tasks, vec!["Write spec"]);
    }

    #[test]
    fn test_password_hash_lookup_ignores_address_case() {
        let db = Database::open_in_memory().unwrap();
        db.set_password_hash("0xABCdef", "0x01").unwrap();
        assert_eq!(db.get_password_hash("0xabcDEF").unwrap().as_deref(), Some("0x01"));
        assert_eq!(db.get_password_hash("0x999").unwrap(), None);
    }
}
