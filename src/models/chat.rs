use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One room per order, created lazily on first acceptance or first message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub courier_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Immutable once written; ordered by `sent_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}
