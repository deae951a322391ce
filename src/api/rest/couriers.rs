use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{Courier, CourierStatus};
use crate::models::token::RegistrationToken;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/couriers", get(list_couriers))
        .route("/api/couriers/:id/status", patch(update_courier_status))
        .route("/api/tokens", post(create_token))
}

#[derive(Deserialize)]
pub struct CourierFilter {
    pub status: Option<String>,
    pub region: Option<String>,
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<CourierFilter>,
) -> Result<Json<Vec<Courier>>, AppError> {
    let status = match &filter.status {
        Some(raw) => Some(
            CourierStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown status: {raw}")))?,
        ),
        None => None,
    };

    let mut couriers: Vec<Courier> = state
        .couriers
        .iter()
        .filter(|entry| {
            let courier = entry.value();
            status.map_or(true, |wanted| courier.status == wanted)
                && filter
                    .region
                    .as_deref()
                    .map_or(true, |region| courier.region == region)
        })
        .map(|entry| entry.value().clone())
        .collect();
    couriers.sort_by_key(|courier| courier.created_at);

    Ok(Json(couriers))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

async fn update_courier_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Courier>, AppError> {
    let status = CourierStatus::parse(&payload.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status: {}", payload.status)))?;

    let mut courier = state
        .couriers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("courier {id}")))?;

    courier.status = status;
    courier.updated_at = Utc::now();

    Ok(Json(courier.clone()))
}

#[derive(Deserialize, Default)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Mints a one-time registration token and the deep link an administrator
/// hands to a new courier.
async fn create_token(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<CreateTokenRequest>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let created_by = payload.and_then(|Json(body)| body.created_by);
    let token = RegistrationToken::generate(created_by);

    let url = format!(
        "https://t.me/{}?start={}",
        state.config.bot_username, token.token
    );
    let body = json!({
        "success": true,
        "token": token.token,
        "url": url,
        "expires_at": token.expires_at,
    });

    state.tokens.insert(token.token.clone(), token);

    (StatusCode::CREATED, Json(body))
}
