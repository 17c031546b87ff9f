//! HTTP request and response types.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::error;

use tickler_core::{FieldUpdate, Task, TaskPatch};

use crate::scheduler::PendingReminder;
use crate::service::{NewTask, ServiceError, TaskEdit};

// ============================================================================
// Task types
// ============================================================================

/// Request body for creating a task.
///
/// Either `text` (run through extraction) or `title` must be present.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub text: Option<String>,
    pub title: Option<String>,
    pub due_instant: Option<DateTime<Utc>>,
    pub notify_target: Option<String>,
}

impl CreateTaskRequest {
    pub fn into_new_task(self, title: String) -> NewTask {
        NewTask {
            title,
            due_instant: self.due_instant,
            notify_target: self.notify_target,
        }
    }
}

/// Request body for editing a task.
///
/// Nullable fields distinguish "absent" (leave alone) from `null` (clear).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub text: Option<String>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_instant: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub notify_target: Option<Option<String>>,
}

impl From<UpdateTaskRequest> for TaskEdit {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskEdit {
            text: req.text,
            patch: TaskPatch {
                title: req.title,
                due_instant: req.due_instant.map_or(FieldUpdate::Keep, FieldUpdate::from_nullable),
                completed: req.completed,
                notify_target: req
                    .notify_target
                    .map_or(FieldUpdate::Keep, FieldUpdate::from_nullable),
            },
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A task plus its pending reminder, if any.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: Task,
    pub reminder: Option<ReminderResponse>,
}

/// Pending reminder information.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderResponse {
    pub fire_at: DateTime<Utc>,
    pub generation: u64,
}

impl From<PendingReminder> for ReminderResponse {
    fn from(reminder: PendingReminder) -> Self {
        Self {
            fire_at: reminder.fire_at,
            generation: reminder.generation,
        }
    }
}

// ============================================================================
// Subscription types
// ============================================================================

/// Response body for the subscription endpoint.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub created: bool,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Build an error response with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Store(e) => {
                error!(error = %e, "Task store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.to_string())
    }
}
