use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourierStatus {
    Pending,
    Active,
    Inactive,
    Blocked,
}

impl CourierStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CourierStatus::Pending),
            "active" => Some(CourierStatus::Active),
            "inactive" => Some(CourierStatus::Inactive),
            "blocked" => Some(CourierStatus::Blocked),
            _ => None,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            CourierStatus::Pending => "pending review",
            CourierStatus::Active => "active",
            CourierStatus::Inactive => "inactive",
            CourierStatus::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub telegram_id: Option<i64>,
    pub telegram_username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub region: String,
    pub status: CourierStatus,
    pub total_orders: u32,
    pub completed_orders: u32,
    pub cancelled_orders: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
