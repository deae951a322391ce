use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Delivering => "delivering",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "accepted" => Some(OrderStatus::Accepted),
            "delivering" => Some(OrderStatus::Delivering),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Click,
    Bank,
}

impl PaymentMethod {
    /// Storefront payment identifiers; anything unrecognized falls back to
    /// cash on delivery.
    pub fn from_storefront(s: &str) -> Self {
        match s {
            "card" => PaymentMethod::Card,
            "click" | "payme" => PaymentMethod::Click,
            "bank" => PaymentMethod::Bank,
            _ => PaymentMethod::Cash,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Click => "Click / Payme",
            PaymentMethod::Bank => "bank transfer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_name: String,
    pub phone: String,
    pub region: String,
    pub district: String,
    pub address: String,
    pub items: Vec<OrderItem>,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub comments: Option<String>,
    pub status: OrderStatus,
    pub courier: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub delivering_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Opaque short id: 8 uppercase hex chars, unique for practical volumes.
    pub fn generate_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        hex[..8].to_uppercase()
    }
}

/// Broadcast on every lifecycle transition; consumed by the /ws stream.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: String,
    pub status: OrderStatus,
    pub courier: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}
