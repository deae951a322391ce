use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::engine::dispatch::{self, JobKind};
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::order::{Order, OrderItem, OrderStatus, PaymentMethod};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/cancel", patch(cancel_order))
}

/// Storefront order submission. Every field is optional at the serde level
/// so a missing one yields the storefront's 400 envelope instead of a
/// generic extractor rejection.
#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub payment: Option<String>,
    pub items: Option<Vec<ItemRequest>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct ItemRequest {
    pub id: Uuid,
    pub quantity: u32,
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{field} field is missing")))
}

fn require_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    let value = require(value, field)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} field is missing")));
    }
    Ok(value.trim().to_string())
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let name = require_text(payload.name, "name")?;
    let phone = require_text(payload.phone, "phone")?;
    let region = require_text(payload.region, "region")?;
    let district = require_text(payload.district, "district")?;
    let address = require_text(payload.address, "address")?;
    let payment = require_text(payload.payment, "payment")?;
    let items = require(payload.items, "items")?;

    if items.is_empty() {
        return Err(AppError::Validation("cart is empty".to_string()));
    }

    let mut total = Decimal::ZERO;
    let mut order_items = Vec::with_capacity(items.len());

    for item in &items {
        if item.quantity == 0 {
            return Err(AppError::Validation("item quantity must be > 0".to_string()));
        }

        let product = state
            .products
            .get(&item.id)
            .filter(|entry| entry.value().is_active)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("product {}", item.id)))?;

        total += product.price * Decimal::from(item.quantity);
        order_items.push(OrderItem {
            product_id: product.id,
            quantity: item.quantity,
        });
    }

    let phone: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '+' | '-'))
        .collect();

    let order = Order {
        order_id: Order::generate_id(),
        customer_name: name,
        phone,
        region,
        district,
        address,
        items: order_items,
        total_price: total,
        payment_method: PaymentMethod::from_storefront(&payment),
        comments: payload.notes.filter(|notes| !notes.trim().is_empty()),
        status: OrderStatus::Pending,
        courier: None,
        created_at: Utc::now(),
        accepted_at: None,
        delivering_at: None,
        delivered_at: None,
        cancelled_at: None,
    };

    let order_id = order.order_id.clone();
    state.orders.insert(order_id.clone(), order.clone());
    state.publish_event(&order);

    // fan-out is best effort: a timeout or send failure never fails the sale
    if let Err(err) = dispatch::submit(
        &state,
        JobKind::BroadcastOrder(order_id.clone()),
        state.config.notify_timeout(),
    )
    .await
    {
        warn!(order_id = %order_id, error = %err, "courier notification incomplete");
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order received",
            "data": {
                "order_id": order_id,
                "total": total,
                "items_count": items.len(),
            }
        })),
    ))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    Ok(Json(order.value().clone()))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = lifecycle::cancel(&state, &id)?;
    Ok(Json(order))
}
