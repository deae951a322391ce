use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Discount relative to `old_price`, rounded to two decimals; zero when
    /// there is no markdown.
    pub fn discount_percent(&self) -> Decimal {
        match self.old_price {
            Some(old) if old > self.price => {
                ((old - self.price) / old * Decimal::from(100)).round_dp(2)
            }
            _ => Decimal::ZERO,
        }
    }
}
