use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::bot::api::Update;
use crate::engine::dispatch::{self, JobKind};
use crate::error::AppError;
use crate::state::AppState;

/// Inbound provider events. Decode failures are rejected before anything
/// reaches the dispatch loop; internal failures never leak detail into the
/// response body.
pub async fn telegram_webhook(State(state): State<Arc<AppState>>, body: String) -> Response {
    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(err) => {
            warn!(error = %err, "malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "ok": false, "error": "malformed update payload" })),
            )
                .into_response();
        }
    };

    debug!(update_id = update.update_id, "webhook update received");

    let result = dispatch::submit(
        &state,
        JobKind::ProcessUpdate(Box::new(update)),
        state.config.webhook_timeout(),
    )
    .await;

    match result {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(AppError::Timeout) => {
            error!("webhook processing timed out");
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({ "ok": false, "error": "timeout" })),
            )
                .into_response()
        }
        Err(err) => {
            error!(error = %err, "webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": "internal error" })),
            )
                .into_response()
        }
    }
}
