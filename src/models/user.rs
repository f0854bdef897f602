use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
    Courier,
}

/// A registered account. Couriers additionally carry a live-updated
/// location and a relay connection handle while online.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: Role,
    pub location: GeoPoint,
    pub socket_id: Option<Uuid>,
    pub is_online: bool,
    pub updated_at: DateTime<Utc>,
}
