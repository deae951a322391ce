use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::product::Product;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/products", post(create_product))
        .route("/api/products/:id/price", get(get_product_price))
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub old_price: Option<Decimal>,
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if payload.price <= Decimal::ZERO {
        return Err(AppError::Validation("price must be > 0".to_string()));
    }

    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        price: payload.price,
        old_price: payload.old_price,
        is_active: true,
        created_at: Utc::now(),
    };

    state.products.insert(product.id, product.clone());
    Ok((StatusCode::CREATED, Json(product)))
}

async fn get_product_price(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let product = state
        .products
        .get(&id)
        .filter(|entry| entry.value().is_active)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": product.id,
            "name": product.name,
            "price": product.price,
            "original_price": product.old_price.unwrap_or(product.price),
            "discount": product.discount_percent(),
        }
    })))
}
