use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::archive::{self, ArchiveOutcome};
use crate::chain::{ChainError, LocalLedger};
use crate::config::{Config, ConfigError, StorageBackend};
use crate::confirm::Confirm;
use crate::context::Context;
use crate::error::ArcError;
use crate::models::{ColumnId, Task, TaskPatch, UserProfile};
use crate::notes::{self, NoteEdit, NotesManager};
use crate::pomodoro::Pomodoro;
use crate::profile::{self, ProfileManager};
use crate::store::{BlobStore, SqliteStore, Store, StoreError};
use crate::tasks::TaskManager;
use crate::templates::{self, Category};
use crate::utils::{self, parse_date, parse_tags};
use crate::vault::{Vault, VaultStatus};

#[derive(Parser)]
#[command(name = "arcos")]
#[command(about = "Kanban tasks, encrypted notes and focus sessions, archived on-chain")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Act as this wallet address instead of the configured one
    #[arg(long, global = true)]
    pub wallet: Option<String>,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the board (default if no subcommand)
    Board {
        /// Only tasks whose content or tags match
        #[arg(long)]
        filter: Option<String>,
    },
    /// Add a new task
    AddTask {
        /// Task content
        content: String,
        /// Column: backlog, bounty, todo, inprogress, review, done
        #[arg(long, default_value = "todo")]
        column: ColumnId,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        bounty: Option<String>,
    },
    /// Change a task's content or details
    EditTask {
        /// Task id or unique id prefix
        id: String,
        #[arg(long)]
        content: Option<String>,
        /// Due date (YYYY-MM-DD), or "none" to clear
        #[arg(long)]
        due: Option<String>,
        /// Assignee, or "none" to clear
        #[arg(long)]
        assignee: Option<String>,
        /// Bounty, or "none" to clear
        #[arg(long)]
        bounty: Option<String>,
    },
    /// Move a task to another column
    MoveTask {
        id: String,
        column: ColumnId,
    },
    /// Move a task to the position of another task
    Reorder {
        id: String,
        over: String,
    },
    /// Tag a task
    Tag {
        id: String,
        tag: String,
    },
    /// Add a subtask, or toggle one with --toggle
    Subtask {
        id: String,
        /// Subtask text
        content: Option<String>,
        /// Id of the subtask to toggle
        #[arg(long, conflicts_with = "content")]
        toggle: Option<String>,
        /// Id of the subtask to remove
        #[arg(long, conflicts_with_all = ["content", "toggle"])]
        remove: Option<String>,
    },
    /// Delete a task
    DeleteTask {
        id: String,
    },
    /// Archive the Done column on-chain
    Archive,
    /// List task templates
    Templates {
        /// DAO, Engineering or Growth
        #[arg(long)]
        category: Option<Category>,
    },
    /// Add a template's tasks to the board
    ApplyTemplate {
        /// Template title
        title: String,
    },
    /// Write the board to a JSON file (stdout if no path)
    Export {
        path: Option<PathBuf>,
    },
    /// Add tasks from a JSON backup
    Import {
        path: PathBuf,
    },
    /// Create a note
    AddNote {
        /// Note title
        title: Option<String>,
        /// Note text
        #[arg(long)]
        content: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Create an encrypted note
        #[arg(long)]
        encrypted: bool,
    },
    /// List notes
    Notes {
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        encrypted: bool,
    },
    /// Print a note
    ShowNote {
        id: String,
        #[arg(long)]
        encrypted: bool,
    },
    /// Delete a note
    DeleteNote {
        id: String,
        #[arg(long)]
        encrypted: bool,
    },
    /// Anchor a note's content hash on-chain
    Anchor {
        id: String,
        #[arg(long)]
        encrypted: bool,
    },
    /// Set the password that protects encrypted notes
    SetPassword,
    /// List workspaces
    Workspaces,
    /// Create a workspace, optionally seeded from a template
    NewWorkspace {
        name: String,
        #[arg(long)]
        template: Option<String>,
    },
    /// Switch the active workspace
    UseWorkspace {
        /// Workspace id or name
        workspace: String,
    },
    /// Show profile, stats and achievements
    Profile,
    /// Update the profile
    SetProfile {
        #[arg(long)]
        nickname: Option<String>,
        #[arg(long)]
        job_title: Option<String>,
        #[arg(long)]
        age: Option<String>,
    },
    /// Show archive history
    History,
    /// Run a focus session
    Focus {
        /// Session length in minutes
        #[arg(long)]
        minutes: Option<u32>,
        /// What you are focusing on
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    ArcError(#[from] ArcError),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Storage error: {0}")]
    StoreError(#[from] StoreError),
    #[error("{0}")]
    ChainError(#[from] ChainError),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("{0}")]
    NotFound(String),
}

/// Where the config was loaded from, so changes go back to the same file
pub enum ConfigTarget {
    Profile(utils::Profile),
    Path(PathBuf),
}

/// Everything a command needs: config, stores and the chain connector
pub struct Session {
    pub config: Config,
    target: ConfigTarget,
    wallet: Option<String>,
    pub store: Arc<dyn Store>,
    pub chain: Arc<LocalLedger>,
}

impl Session {
    pub fn open(config: Config, target: ConfigTarget, wallet: Option<String>) -> Result<Self, CliError> {
        let db_path = config.get_database_path();
        let db_path = db_path
            .to_str()
            .ok_or_else(|| CliError::NotFound("Database path contains invalid UTF-8".to_string()))?
            .to_string();

        let store: Arc<dyn Store> = match config.storage {
            StorageBackend::Sqlite => Arc::new(SqliteStore::open(&db_path)?),
            StorageBackend::Local => Arc::new(BlobStore::open(&config.get_local_store_path())?),
        };
        let chain = Arc::new(LocalLedger::open(&db_path, config.chain.clone())?);
        let wallet = wallet.or_else(|| config.wallet_address.clone());

        tracing::debug!(storage = ?config.storage, database = %db_path, "session opened");
        Ok(Self {
            config,
            target,
            wallet,
            store,
            chain,
        })
    }

    pub fn context(&self) -> Context {
        Context::new(self.wallet.clone(), self.config.current_workspace())
    }

    pub async fn task_manager(&self) -> Result<TaskManager, CliError> {
        let mut tasks = TaskManager::new(self.store.clone(), self.context(), self.config.failure_policy);
        tasks.load().await?;
        Ok(tasks)
    }

    pub async fn notes_manager(&self, encrypted: bool) -> Result<NotesManager, CliError> {
        let mut notes = if encrypted {
            NotesManager::encrypted(self.store.clone(), self.context(), self.config.failure_policy)
        } else {
            NotesManager::plain(self.store.clone(), self.context(), self.config.failure_policy)
        };
        notes.load().await?;
        Ok(notes)
    }

    pub fn profile_manager(&self) -> ProfileManager {
        ProfileManager::new(self.store.clone(), self.context())
    }

    fn save_config(&mut self) -> Result<(), CliError> {
        match &self.target {
            ConfigTarget::Profile(profile) => self.config.save_with_profile(*profile)?,
            ConfigTarget::Path(path) => {
                let path = path.clone();
                self.config.save_to_path(&path)?
            }
        }
        Ok(())
    }

    /// Unlocked vault for encrypted notes, asking for the password on stdin
    async fn unlock_vault(&self) -> Result<Vault, CliError> {
        let wallet = self.context().wallet()?.to_string();
        let mut vault = Vault::new();
        match vault.status(self.chain.as_ref(), &wallet).await? {
            VaultStatus::NeedsSetup => {
                return Err(CliError::NotFound(
                    "No password set for this wallet. Run `arcos set-password` first.".to_string(),
                ));
            }
            VaultStatus::Locked | VaultStatus::Unlocked => {}
        }
        let password = read_secret("Password: ")?;
        vault.unlock(self.chain.as_ref(), &wallet, &password).await?;
        Ok(vault)
    }
}

fn read_secret(prompt: &str) -> Result<String, CliError> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Resolve a full id from a unique prefix
fn resolve_id<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str, kind: &str) -> Result<String, CliError> {
    let matches: Vec<&str> = ids.filter(|id| id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => Err(CliError::NotFound(format!("No {} matches '{}'", kind, prefix))),
        _ => Err(CliError::NotFound(format!("'{}' matches several {}s", prefix, kind))),
    }
}

fn resolve_task(tasks: &TaskManager, prefix: &str) -> Result<String, CliError> {
    resolve_id(tasks.tasks().iter().map(|t| t.id.as_str()), prefix, "task")
}

fn resolve_note(notes: &NotesManager, prefix: &str) -> Result<String, CliError> {
    resolve_id(notes.notes().iter().map(|n| n.id.as_str()), prefix, "note")
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Validate an optional date argument
fn parse_due(due: Option<String>) -> Result<Option<String>, CliError> {
    match due {
        Some(due_str) => {
            parse_date(&due_str)
                .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", due_str, e)))?;
            Ok(Some(due_str))
        }
        None => Ok(None),
    }
}

/// `Some("none")` clears a field, `Some(value)` sets it
fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| if v.eq_ignore_ascii_case("none") { None } else { Some(v) })
}

fn print_task(task: &Task) {
    let mut line = format!("  [{}] {}", short(&task.id), task.content);
    if !task.tags.is_empty() {
        line.push_str(&format!("  #{}", task.tags.join(" #")));
    }
    if let Some(due) = &task.due_date {
        line.push_str(&format!("  due {}", due));
    }
    if let Some(assignee) = &task.assignee {
        line.push_str(&format!("  @{}", assignee));
    }
    if let Some(bounty) = &task.bounty {
        line.push_str(&format!("  bounty {}", bounty));
    }
    println!("{}", line);
    for subtask in &task.subtasks {
        let mark = if subtask.completed { "x" } else { " " };
        println!("      [{}] {} ({})", mark, subtask.content, short(&subtask.id));
    }
}

/// Handle the board command
pub async fn handle_board(session: &Session, filter: Option<String>) -> Result<(), CliError> {
    let tasks = session.task_manager().await?;
    let workspace = session.config.current_workspace();
    println!("{} - {}% done", workspace.name, tasks.progress());

    let visible = tasks.filter(filter.as_deref().unwrap_or(""));
    for column in ColumnId::ALL {
        let in_column: Vec<&&Task> = visible.iter().filter(|t| t.column_id == column).collect();
        println!("\n{} ({})", column.title(), in_column.len());
        for task in in_column {
            print_task(task);
        }
    }
    Ok(())
}

/// Handle the add-task command
pub async fn handle_add_task(
    session: &Session,
    content: String,
    column: ColumnId,
    due: Option<String>,
    tags: Option<String>,
    assignee: Option<String>,
    bounty: Option<String>,
) -> Result<(), CliError> {
    let mut task = Task::new(content, column);
    task.due_date = parse_due(due)?;
    task.tags = tags.as_deref().map(parse_tags).unwrap_or_default();
    task.assignee = assignee;
    task.bounty = bounty;

    let mut tasks = session.task_manager().await?;
    let id = tasks.create(task).await?;
    println!("Task created successfully (ID: {})", id);
    Ok(())
}

pub async fn handle_edit_task(
    session: &Session,
    id: String,
    content: Option<String>,
    due: Option<String>,
    assignee: Option<String>,
    bounty: Option<String>,
) -> Result<(), CliError> {
    let due_date = match clearable(due) {
        Some(Some(due)) => Some(parse_due(Some(due))?),
        other => other,
    };
    let patch = TaskPatch {
        content,
        due_date,
        assignee: clearable(assignee),
        bounty: clearable(bounty),
        ..TaskPatch::default()
    };
    if patch.is_empty() {
        println!("Nothing to change");
        return Ok(());
    }

    let mut tasks = session.task_manager().await?;
    let id = resolve_task(&tasks, &id)?;
    tasks.update(&id, patch).await?;
    println!("Task updated");
    Ok(())
}

pub async fn handle_move_task(session: &Session, id: String, column: ColumnId) -> Result<(), CliError> {
    let mut tasks = session.task_manager().await?;
    let id = resolve_task(&tasks, &id)?;
    tasks.move_to_column(&id, column).await?;
    println!("Moved to {}", column.title());
    Ok(())
}

/// Reordering is local to a board session, so the new order is printed
/// rather than stored
pub async fn handle_reorder(session: &Session, id: String, over: String) -> Result<(), CliError> {
    let mut tasks = session.task_manager().await?;
    let active = resolve_task(&tasks, &id)?;
    let over = resolve_task(&tasks, &over)?;
    tasks.reorder(&active, &over);
    for task in tasks.tasks() {
        print_task(task);
    }
    Ok(())
}

pub async fn handle_tag(session: &Session, id: String, tag: String) -> Result<(), CliError> {
    let mut tasks = session.task_manager().await?;
    let id = resolve_task(&tasks, &id)?;
    tasks.add_tag(&id, &tag).await?;
    println!("Tagged");
    Ok(())
}

pub async fn handle_subtask(
    session: &Session,
    id: String,
    content: Option<String>,
    toggle: Option<String>,
    remove: Option<String>,
) -> Result<(), CliError> {
    let mut tasks = session.task_manager().await?;
    let id = resolve_task(&tasks, &id)?;
    let subtask_ids = |tasks: &TaskManager| -> Vec<String> {
        tasks
            .get(&id)
            .map(|t| t.subtasks.iter().map(|s| s.id.clone()).collect())
            .unwrap_or_default()
    };

    if let Some(prefix) = toggle {
        let ids = subtask_ids(&tasks);
        let sub = resolve_id(ids.iter().map(String::as_str), &prefix, "subtask")?;
        tasks.toggle_subtask(&id, &sub).await?;
        println!("Subtask toggled");
    } else if let Some(prefix) = remove {
        let ids = subtask_ids(&tasks);
        let sub = resolve_id(ids.iter().map(String::as_str), &prefix, "subtask")?;
        tasks.remove_subtask(&id, &sub).await?;
        println!("Subtask removed");
    } else if let Some(content) = content {
        if let Some(sub) = tasks.add_subtask(&id, &content).await? {
            println!("Subtask added (ID: {})", sub);
        }
    } else {
        return Err(ArcError::validation("Give subtask text, --toggle or --remove").into());
    }
    Ok(())
}

pub async fn handle_delete_task(session: &Session, id: String, confirm: &dyn Confirm) -> Result<(), CliError> {
    let mut tasks = session.task_manager().await?;
    let id = resolve_task(&tasks, &id)?;
    if !confirm.confirm("Delete this task?") {
        return Ok(());
    }
    tasks.delete(&id).await?;
    println!("Task deleted");
    Ok(())
}

pub async fn handle_archive(session: &Session, confirm: &dyn Confirm) -> Result<(), CliError> {
    let tasks = session.task_manager().await?;
    let profiles = session.profile_manager();
    match archive::archive_completed(&tasks, &profiles, session.chain.as_ref(), confirm).await? {
        ArchiveOutcome::Archived { tx, .. } => println!("Archive Successful! Tx: {}", tx.hash),
        ArchiveOutcome::Cancelled => println!("Archive cancelled"),
    }
    Ok(())
}

pub fn handle_templates(category: Option<Category>) {
    for template in templates::list(category) {
        println!("{} [{}]", template.title, template.category);
        println!("  {}", template.description);
        for task in template.tasks {
            println!("    - {} ({})", task.content, task.column_id.title());
        }
    }
}

pub async fn handle_apply_template(session: &Session, title: String) -> Result<(), CliError> {
    let template = templates::find(&title)
        .ok_or_else(|| CliError::NotFound(format!("Template not found: {}", title)))?;
    let mut tasks = session.task_manager().await?;
    let ids = tasks.apply_template(template).await?;
    println!("Template applied successfully! Added {} tasks", ids.len());
    Ok(())
}

pub async fn handle_export(session: &Session, path: Option<PathBuf>) -> Result<(), CliError> {
    let tasks = session.task_manager().await?;
    let json = tasks.export_json()?;
    match path {
        Some(path) => {
            std::fs::write(&path, json)?;
            println!("Exported {} tasks to {}", tasks.tasks().len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub async fn handle_import(session: &Session, path: &Path) -> Result<(), CliError> {
    let json = std::fs::read_to_string(path)?;
    let mut tasks = session.task_manager().await?;
    let ids = tasks.import_json(&json).await?;
    println!("Imported {} tasks", ids.len());
    Ok(())
}

/// Handle the add-note command
pub async fn handle_add_note(
    session: &Session,
    title: Option<String>,
    content: Option<String>,
    tags: Option<String>,
    encrypted: bool,
) -> Result<(), CliError> {
    let vault = if encrypted {
        session.unlock_vault().await?
    } else {
        Vault::new()
    };
    let mut notes = session.notes_manager(encrypted).await?;
    let id = notes.create(title, &vault).await?;

    if content.is_some() || tags.is_some() {
        notes.edit(
            &id,
            NoteEdit {
                content: content.as_deref().map(notes::text_document),
                tags: tags.as_deref().map(parse_tags),
                ..NoteEdit::default()
            },
        );
        notes.save(&id, &vault).await?;
    }
    println!("Note created successfully (ID: {})", id);
    Ok(())
}

pub async fn handle_notes(session: &Session, filter: Option<String>, encrypted: bool) -> Result<(), CliError> {
    let notes = session.notes_manager(encrypted).await?;
    for note in notes.filter(filter.as_deref().unwrap_or("")) {
        let anchored = if note.on_chain { "  [anchored]" } else { "" };
        println!("[{}] {}  ({}){}", short(&note.id), note.title, note.updated_at, anchored);
    }
    Ok(())
}

pub async fn handle_show_note(session: &Session, id: String, encrypted: bool) -> Result<(), CliError> {
    let vault = if encrypted {
        session.unlock_vault().await?
    } else {
        Vault::new()
    };
    let mut notes = session.notes_manager(encrypted).await?;
    let id = resolve_note(&notes, &id)?;
    let document = notes.select(&id, &vault)?;
    if let Some(note) = notes.get(&id) {
        println!("# {}", note.title);
        if !note.tags.is_empty() {
            println!("#{}", note.tags.join(" #"));
        }
        if let Some(tx) = &note.tx_hash {
            println!("Anchored: {}", tx);
        }
    }
    println!("\n{}", notes::document_text(&document));
    Ok(())
}

pub async fn handle_delete_note(
    session: &Session,
    id: String,
    encrypted: bool,
    confirm: &dyn Confirm,
) -> Result<(), CliError> {
    let mut notes = session.notes_manager(encrypted).await?;
    let id = resolve_note(&notes, &id)?;
    if notes.delete(&id, confirm).await? {
        println!("Note deleted");
    }
    Ok(())
}

pub async fn handle_anchor(session: &Session, id: String, encrypted: bool) -> Result<(), CliError> {
    let mut notes = session.notes_manager(encrypted).await?;
    let id = resolve_note(&notes, &id)?;
    let tx = notes.anchor(&id, session.chain.as_ref()).await?;
    println!("Document anchored successfully! Tx: {}", tx.hash);
    Ok(())
}

pub async fn handle_set_password(session: &Session) -> Result<(), CliError> {
    let wallet = session.context().wallet()?.to_string();
    let password = read_secret("New password: ")?;
    let confirmation = read_secret("Confirm password: ")?;
    let mut vault = Vault::new();
    let tx = vault.establish(session.chain.as_ref(), &wallet, &password, &confirmation).await?;
    println!("Password set. Tx: {}", tx.hash);
    Ok(())
}

pub fn handle_workspaces(session: &Session) {
    for workspace in &session.config.workspaces {
        let marker = if workspace.id == session.config.active_workspace { "*" } else { " " };
        println!("{} {} ({})", marker, workspace.name, workspace.id);
    }
}

pub async fn handle_new_workspace(session: &mut Session, name: String, template: Option<String>) -> Result<(), CliError> {
    let template = match template {
        Some(title) => Some(
            templates::find(&title).ok_or_else(|| CliError::NotFound(format!("Template not found: {}", title)))?,
        ),
        None => None,
    };

    let workspace = session.config.create_workspace(&name)?;
    session.config.switch_workspace(&workspace.id)?;
    session.save_config()?;
    println!("Workspace created: {} ({})", workspace.name, workspace.id);

    if let Some(template) = template {
        let mut tasks = session.task_manager().await?;
        let ids = tasks.apply_template(template).await?;
        println!("Added {} tasks from {}", ids.len(), template.title);
    }
    Ok(())
}

pub fn handle_use_workspace(session: &mut Session, workspace: String) -> Result<(), CliError> {
    let workspace = session.config.switch_workspace(&workspace)?;
    session.save_config()?;
    println!("Switched to {}", workspace.name);
    Ok(())
}

pub async fn handle_profile(session: &Session) -> Result<(), CliError> {
    let profiles = session.profile_manager();
    let profile = profiles.load().await?;
    let stats = profiles.stats().await?;

    let or_unset = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    println!("Nickname:  {}", or_unset(&profile.nickname));
    println!("Job title: {}", or_unset(&profile.job_title));
    println!("Age:       {}", or_unset(&profile.age));
    println!(
        "\nArchived tasks: {}  Archives: {}  Anchored notes: {}  Focus: {}h {}m",
        stats.archived_tasks,
        stats.archives,
        stats.anchored_notes,
        stats.focus_minutes / 60,
        stats.focus_minutes % 60
    );

    println!("\nAchievements");
    for achievement in profile::achievements(&stats) {
        let status = if achievement.unlocked() {
            "unlocked".to_string()
        } else {
            format!("{}/{}", achievement.progress, achievement.total)
        };
        println!("  {:<14} {:<28} {}", achievement.title, achievement.description, status);
    }
    Ok(())
}

pub async fn handle_set_profile(
    session: &Session,
    nickname: Option<String>,
    job_title: Option<String>,
    age: Option<String>,
) -> Result<(), CliError> {
    let profiles = session.profile_manager();
    let current = profiles.load().await?;
    let profile = UserProfile {
        nickname: nickname.unwrap_or(current.nickname),
        job_title: job_title.unwrap_or(current.job_title),
        age: age.unwrap_or(current.age),
    };
    profiles.save(&profile).await?;
    println!("Profile saved");
    Ok(())
}

pub async fn handle_history(session: &Session) -> Result<(), CliError> {
    let history = session.profile_manager().history().await?;
    if history.is_empty() {
        println!("No archives yet");
    }
    for item in history.iter().rev() {
        println!("{}  {} tasks", item.date, item.tasks.len());
        for task in &item.tasks {
            println!("  - {}", task);
        }
    }
    Ok(())
}

pub async fn handle_focus(session: &Session, minutes: Option<u32>, reason: Option<String>) -> Result<(), CliError> {
    let mut timer = Pomodoro::new(session.config.pomodoro_minutes);
    if let Some(minutes) = minutes {
        timer.set_duration(minutes)?;
    }
    timer.set_reason(reason);
    match timer.reason() {
        Some(reason) => println!("Focusing on {} for {} minutes", reason, timer.minutes()),
        None => println!("Focusing for {} minutes", timer.minutes()),
    }

    timer
        .run(|t| {
            eprint!("\r{} ({:.0}%)", t.display(), t.progress());
            let _ = io::stderr().flush();
        })
        .await;
    eprintln!();

    if timer.remaining_secs() == 0 {
        println!("Session complete!");
        if session.context().wallet.is_some() {
            let total = session.profile_manager().record_focus(timer.minutes()).await?;
            println!("Total focus time: {}h {}m", total / 60, total % 60);
        }
    }
    Ok(())
}
