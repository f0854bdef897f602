use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery destination. Latitude/longitude feed the courier geo-query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub phone: String,
    pub full_address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "out of delivery")]
    OutOfDelivery,
    #[serde(rename = "delivered")]
    Delivered,
    #[serde(rename = "cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user: Uuid,
    pub address: Address,
    pub status: OrderStatus,
    pub delivery_otp: Option<String>,
    pub delivery_otp_verified: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub assignment: Option<Uuid>,
    pub assigned_delivery_boy: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(user: Uuid, address: Address) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            address,
            status: OrderStatus::Pending,
            delivery_otp: None,
            delivery_otp_verified: false,
            delivered_at: None,
            assignment: None,
            assigned_delivery_boy: None,
            created_at: Utc::now(),
        }
    }
}
