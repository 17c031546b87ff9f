//! Task type and partial updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParseResult, TaskId};

/// A Task is a titled to-do item with an optional due instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Non-empty title.
    pub title: String,

    /// When the task is due. `None` means no reminder applies.
    pub due_instant: Option<DateTime<Utc>>,

    /// Whether the task has been completed.
    #[serde(default)]
    pub completed: bool,

    /// Channel-specific address to notify (e.g. an email address).
    #[serde(default)]
    pub notify_target: Option<String>,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// When the task was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new Task.
    pub fn new(title: impl Into<String>, due_instant: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            title: title.into(),
            due_instant,
            completed: false,
            notify_target: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new Task from an extraction result.
    pub fn from_parse(parsed: ParseResult) -> Self {
        Self::new(parsed.title, parsed.due_instant)
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to set the notify target.
    pub fn with_notify_target(mut self, target: impl Into<String>) -> Self {
        self.notify_target = Some(target.into());
        self
    }

    /// Builder method to mark the task completed.
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Check whether a reminder may exist for this task at `now`.
    pub fn is_reminder_eligible(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_instant.is_some_and(|due| due > now)
    }

    /// Apply a partial update.
    ///
    /// Returns true if a field that affects the pending reminder changed
    /// (`due_instant` or `completed`).
    pub fn apply(&mut self, patch: TaskPatch) -> bool {
        let before = (self.due_instant, self.completed);

        if let Some(title) = patch.title {
            self.title = title;
        }
        patch.due_instant.apply_to(&mut self.due_instant);
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        patch.notify_target.apply_to(&mut self.notify_target);

        self.updated_at = Utc::now();

        before != (self.due_instant, self.completed)
    }
}

/// Update instruction for an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the current value alone.
    #[default]
    Keep,
    /// Reset the field to `None`.
    Clear,
    /// Replace the field with a new value.
    Set(T),
}

impl<T> FieldUpdate<T> {
    /// Build an update from a nullable value: `None` clears, `Some` sets.
    pub fn from_nullable(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }

    fn apply_to(self, field: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Clear => *field = None,
            Self::Set(v) => *field = Some(v),
        }
    }
}

/// Partial update to a Task.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due_instant: FieldUpdate<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub notify_target: FieldUpdate<String>,
}

impl TaskPatch {
    /// Patch that only flips the completion flag.
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.due_instant == FieldUpdate::Keep
            && self.completed.is_none()
            && self.notify_target == FieldUpdate::Keep
    }
}
