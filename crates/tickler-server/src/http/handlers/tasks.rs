//! Task handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use tickler_core::{Task, TaskId};

use crate::http::responses::{error_response, CreateTaskRequest, TaskResponse, UpdateTaskRequest};
use crate::state::AppState;

fn to_response(state: &AppState, task: Task) -> TaskResponse {
    let reminder = state.scheduler().pending(&task.id).map(Into::into);
    TaskResponse { task, reminder }
}

/// List all tasks.
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Response {
    match state.tasks.list().await {
        Ok(tasks) => {
            let response: Vec<TaskResponse> =
                tasks.into_iter().map(|t| to_response(&state, t)).collect();
            Json(response).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Create a task from free text or structured fields.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(mut req): Json<CreateTaskRequest>,
) -> Response {
    let result = if let Some(text) = req.text.take() {
        state.tasks.create_from_text(&text, req.notify_target.take()).await
    } else if let Some(title) = req.title.take() {
        state.tasks.create(req.into_new_task(title)).await
    } else {
        return error_response(StatusCode::BAD_REQUEST, "either text or title is required");
    };

    match result {
        Ok(task) => (StatusCode::CREATED, Json(to_response(&state, task))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a single task.
pub async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.tasks.get(&TaskId::new(id)).await {
        Ok(task) => Json(to_response(&state, task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Edit a task.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Response {
    match state.tasks.update(&TaskId::new(id), req.into()).await {
        Ok(task) => Json(to_response(&state, task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Flip a task's completion flag.
pub async fn toggle_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.tasks.toggle(&TaskId::new(id)).await {
        Ok(task) => Json(to_response(&state, task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Delete a task.
pub async fn delete_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.tasks.delete(&TaskId::new(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
