//! Kanban task manager.
//!
//! Holds the task list of the active workspace and applies every change
//! locally before mirroring it to the [`Store`]. Creates roll back when the
//! write fails; updates and deletes follow the configured [`FailurePolicy`].
//! Order is local only: a refetch returns tasks in store order.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::config::FailurePolicy;
use crate::context::Context;
use crate::error::ArcError;
use crate::models::{ColumnId, Scope, Subtask, Task, TaskPatch};
use crate::store::{Store, StoreError, StoreEvent, Table};
use crate::templates::Template;

/// Where a dragged task was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Task(String),
    Column(ColumnId),
}

pub struct TaskManager {
    store: Arc<dyn Store>,
    ctx: Context,
    policy: FailurePolicy,
    tasks: Vec<Task>,
    changes: broadcast::Receiver<StoreEvent>,
}

impl TaskManager {
    pub fn new(store: Arc<dyn Store>, ctx: Context, policy: FailurePolicy) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            ctx,
            policy,
            tasks: Vec::new(),
            changes,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks of one column, in board order
    pub fn column(&self, column: ColumnId) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.column_id == column)
    }

    /// Fetch the collection for the current wallet and workspace. Without a
    /// wallet the board is empty.
    pub async fn load(&mut self) -> Result<(), ArcError> {
        let Ok(scope) = self.ctx.scope() else {
            self.tasks.clear();
            return Ok(());
        };
        self.tasks = self.store.list_tasks(&scope).await?;
        tracing::debug!(count = self.tasks.len(), workspace = %scope.workspace_id, "loaded tasks");
        Ok(())
    }

    /// Add a task and persist it. The task is removed again if the write
    /// fails. Returns the id the task was stored under.
    pub async fn create(&mut self, task: Task) -> Result<String, ArcError> {
        let mut ids = self.create_batch(vec![task]).await?;
        Ok(ids.remove(0))
    }

    /// Add several tasks in one write; all of them are rolled back on failure
    pub async fn add_many(&mut self, tasks: Vec<Task>) -> Result<Vec<String>, ArcError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        self.create_batch(tasks).await
    }

    async fn create_batch(&mut self, mut tasks: Vec<Task>) -> Result<Vec<String>, ArcError> {
        let scope = self.ctx.scope()?;
        if tasks.iter().any(|t| t.content.trim().is_empty()) {
            return Err(ArcError::validation("Task content cannot be empty"));
        }

        let mut taken: HashSet<String> = self.tasks.iter().map(|t| t.id.clone()).collect();
        for task in &mut tasks {
            if task.id.is_empty() || taken.contains(&task.id) {
                task.id = crate::utils::generate_id();
            }
            taken.insert(task.id.clone());
        }
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        self.tasks.extend(tasks.iter().cloned());
        if let Err(e) = self.store.insert_tasks(&scope, &tasks).await {
            tracing::error!(count = ids.len(), "Failed to create tasks, rolling back: {}", e);
            self.tasks.retain(|t| !ids.contains(&t.id));
            return Err(e.into());
        }
        Ok(ids)
    }

    /// Merge `patch` into the task. Unknown ids are ignored.
    pub async fn update(&mut self, id: &str, patch: TaskPatch) -> Result<(), ArcError> {
        let scope = self.ctx.scope()?;
        if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ArcError::validation("Task content cannot be empty"));
        }
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(());
        };
        patch.apply(task);
        let task = task.clone();
        self.persist_update(&scope, &task).await
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ArcError> {
        let scope = self.ctx.scope()?;
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Ok(());
        }
        if let Err(e) = self.store.delete_task(&scope, id).await {
            return self.write_failed(&scope, "delete", e).await;
        }
        Ok(())
    }

    /// Move `active_id` to the position of `over_id`. Local only; returns
    /// whether anything moved.
    pub fn reorder(&mut self, active_id: &str, over_id: &str) -> bool {
        if active_id == over_id {
            return false;
        }
        let from = self.tasks.iter().position(|t| t.id == active_id);
        let to = self.tasks.iter().position(|t| t.id == over_id);
        let (Some(from), Some(to)) = (from, to) else {
            return false;
        };
        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);
        true
    }

    /// Append a tag unless the task already carries it
    pub async fn add_tag(&mut self, id: &str, tag: &str) -> Result<(), ArcError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(ArcError::validation("Tag cannot be empty"));
        }
        let Some(task) = self.get(id) else {
            return Ok(());
        };
        if task.has_tag(tag) {
            return Ok(());
        }
        let mut tags = task.tags.clone();
        tags.push(tag.to_string());
        self.update(
            id,
            TaskPatch {
                tags: Some(tags),
                ..TaskPatch::default()
            },
        )
        .await
    }

    pub async fn move_to_column(&mut self, id: &str, column: ColumnId) -> Result<(), ArcError> {
        self.update(id, TaskPatch::column(column)).await
    }

    /// Board drop rules: onto a task in another column takes that column,
    /// onto a task in the same column reorders, onto a column sets it.
    pub async fn drop_task(&mut self, active_id: &str, target: DropTarget) -> Result<(), ArcError> {
        let Some(active_column) = self.get(active_id).map(|t| t.column_id) else {
            return Ok(());
        };
        match target {
            DropTarget::Task(over_id) => {
                let Some(over_column) = self.get(&over_id).map(|t| t.column_id) else {
                    return Ok(());
                };
                if over_column == active_column {
                    self.reorder(active_id, &over_id);
                    Ok(())
                } else {
                    self.move_to_column(active_id, over_column).await
                }
            }
            DropTarget::Column(column) if column != active_column => {
                self.move_to_column(active_id, column).await
            }
            DropTarget::Column(_) => Ok(()),
        }
    }

    /// Returns the new subtask's id, or `None` for an unknown task
    pub async fn add_subtask(&mut self, task_id: &str, content: &str) -> Result<Option<String>, ArcError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ArcError::validation("Subtask cannot be empty"));
        }
        let Some(task) = self.get(task_id) else {
            return Ok(None);
        };
        let subtask = Subtask::new(content.to_string());
        let id = subtask.id.clone();
        let mut subtasks = task.subtasks.clone();
        subtasks.push(subtask);
        self.set_subtasks(task_id, subtasks).await?;
        Ok(Some(id))
    }

    pub async fn toggle_subtask(&mut self, task_id: &str, subtask_id: &str) -> Result<(), ArcError> {
        let Some(task) = self.get(task_id) else {
            return Ok(());
        };
        let mut subtasks = task.subtasks.clone();
        let Some(subtask) = subtasks.iter_mut().find(|s| s.id == subtask_id) else {
            return Ok(());
        };
        subtask.completed = !subtask.completed;
        self.set_subtasks(task_id, subtasks).await
    }

    pub async fn remove_subtask(&mut self, task_id: &str, subtask_id: &str) -> Result<(), ArcError> {
        let Some(task) = self.get(task_id) else {
            return Ok(());
        };
        if !task.subtasks.iter().any(|s| s.id == subtask_id) {
            return Ok(());
        }
        let subtasks = task.subtasks.iter().filter(|s| s.id != subtask_id).cloned().collect();
        self.set_subtasks(task_id, subtasks).await
    }

    async fn set_subtasks(&mut self, task_id: &str, subtasks: Vec<Subtask>) -> Result<(), ArcError> {
        self.update(
            task_id,
            TaskPatch {
                subtasks: Some(subtasks),
                ..TaskPatch::default()
            },
        )
        .await
    }

    /// Case-insensitive search over content and tags
    pub fn filter(&self, query: &str) -> Vec<&Task> {
        let query = query.trim();
        if query.is_empty() {
            return self.tasks.iter().collect();
        }
        self.tasks.iter().filter(|t| t.matches(query)).collect()
    }

    /// Share of tasks in `done`, as a rounded percentage
    pub fn progress(&self) -> u8 {
        if self.tasks.is_empty() {
            return 0;
        }
        let done = self.column(ColumnId::Done).count();
        ((done as f64 / self.tasks.len() as f64) * 100.0).round() as u8
    }

    /// Content of every completed task, in board order
    pub fn done_contents(&self) -> Vec<String> {
        self.column(ColumnId::Done).map(|t| t.content.clone()).collect()
    }

    pub async fn apply_template(&mut self, template: &Template) -> Result<Vec<String>, ArcError> {
        tracing::info!(template = template.title, "applying template");
        self.add_many(template.instantiate()).await
    }

    /// Board backup as a pretty-printed JSON array
    pub fn export_json(&self) -> Result<String, ArcError> {
        serde_json::to_string_pretty(&self.tasks).map_err(|e| ArcError::from(StoreError::from(e)))
    }

    /// Restore tasks from a backup. Tasks whose id is already on the board
    /// get a fresh one.
    pub async fn import_json(&mut self, json: &str) -> Result<Vec<String>, ArcError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ArcError::validation(format!("Invalid backup file: {}", e)))?;
        if !value.is_array() {
            return Err(ArcError::validation("Backup must be a JSON array of tasks"));
        }
        let tasks: Vec<Task> = serde_json::from_value(value)
            .map_err(|e| ArcError::validation(format!("Invalid task in backup: {}", e)))?;
        self.add_many(tasks).await
    }

    /// Drain pending change notifications and refetch if any concern this
    /// board. Returns whether a refetch happened.
    pub async fn sync_changes(&mut self) -> Result<bool, ArcError> {
        let Ok(scope) = self.ctx.scope() else {
            return Ok(false);
        };
        let mut stale = false;
        loop {
            match self.changes.try_recv() {
                Ok(event) => stale |= event.concerns(Table::Tasks, &scope),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "missed task change notifications");
                    stale = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        if stale {
            self.tasks = self.store.list_tasks(&scope).await?;
        }
        Ok(stale)
    }

    async fn persist_update(&mut self, scope: &Scope, task: &Task) -> Result<(), ArcError> {
        if let Err(e) = self.store.update_task(scope, task).await {
            return self.write_failed(scope, "update", e).await;
        }
        Ok(())
    }

    async fn write_failed(&mut self, scope: &Scope, operation: &str, error: StoreError) -> Result<(), ArcError> {
        tracing::error!(operation, "Failed to persist task change: {}", error);
        if self.policy == FailurePolicy::Reconcile {
            match self.store.list_tasks(scope).await {
                Ok(tasks) => self.tasks = tasks,
                Err(e) => tracing::error!("Failed to reconcile tasks: {}", e),
            }
        }
        Err(error.into())
    }
}
