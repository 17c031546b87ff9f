//! Push subscription handler.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::warn;

use crate::http::responses::{error_response, SubscriptionResponse};
use crate::state::AppState;

/// Register a push subscription.
///
/// Returns 201 for a new endpoint, 200 for one already registered, and 400
/// when the descriptor has no endpoint.
pub async fn register_subscription(
    State(state): State<Arc<AppState>>,
    Json(descriptor): Json<Value>,
) -> Response {
    match state.subscriptions.register(&descriptor) {
        Ok(true) => (
            StatusCode::CREATED,
            Json(SubscriptionResponse { created: true }),
        )
            .into_response(),
        Ok(false) => (StatusCode::OK, Json(SubscriptionResponse { created: false })).into_response(),
        Err(e) => {
            warn!(error = %e, "Rejected subscription");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}
