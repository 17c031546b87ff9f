//! Task persistence.
//!
//! The [`TaskStore`] trait is the authoritative record of tasks. The
//! scheduler and the task service only ever reach tasks through it, so the
//! in-memory and JSON-file stores are interchangeable.

use async_trait::async_trait;
use thiserror::Error;

use tickler_core::{Task, TaskId, TaskPatch};

mod json_file;
mod memory;

pub use json_file::JsonFileTaskStore;
pub use memory::InMemoryTaskStore;

/// Task store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A task as written by [`TaskStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub task: Task,
    /// Whether `due_instant` or `completed` actually changed.
    pub timing_changed: bool,
}

/// Authoritative task storage.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks, oldest first.
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    /// Look up a task by id.
    async fn get(&self, id: &TaskId) -> Result<Option<Task>, StoreError>;

    /// Insert a new task and return it as stored.
    async fn create(&self, task: Task) -> Result<Task, StoreError>;

    /// Apply a partial update and return the updated task.
    async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<TaskUpdate, StoreError>;

    /// Remove a task.
    async fn delete(&self, id: &TaskId) -> Result<(), StoreError>;

    /// Persist anything still buffered. Called once on shutdown.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    tasks
}
