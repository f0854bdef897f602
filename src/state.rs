use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::mailer::Mailer;
use crate::models::assignment::Assignment;
use crate::models::chat::{ChatRoom, Message};
use crate::models::order::Order;
use crate::models::user::User;
use crate::notify::Notify;
use crate::observability::metrics::Metrics;

/// Shared document collections plus the outbound ports. Everything behind
/// `Arc`; handlers stay stateless.
pub struct AppState {
    pub users: DashMap<Uuid, User>,
    pub orders: DashMap<Uuid, Order>,
    pub assignments: DashMap<Uuid, Assignment>,
    /// One room per order, keyed by order id.
    pub chat_rooms: DashMap<Uuid, ChatRoom>,
    /// Messages per room, append-only and time-ordered.
    pub messages: DashMap<Uuid, Vec<Message>>,
    pub notifier: Arc<dyn Notify>,
    pub mailer: Arc<dyn Mailer>,
    pub delivery_radius_km: f64,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        delivery_radius_km: f64,
        notifier: Arc<dyn Notify>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users: DashMap::new(),
            orders: DashMap::new(),
            assignments: DashMap::new(),
            chat_rooms: DashMap::new(),
            messages: DashMap::new(),
            notifier,
            mailer,
            delivery_radius_km,
            metrics: Metrics::new(),
        }
    }

    /// Lazily creates the chat room for an order; idempotent.
    pub fn ensure_chat_room(&self, order_id: Uuid, user_id: Uuid, courier_id: Uuid) -> ChatRoom {
        self.chat_rooms
            .entry(order_id)
            .or_insert_with(|| ChatRoom {
                id: Uuid::new_v4(),
                order_id,
                user_id,
                courier_id,
                created_at: Utc::now(),
            })
            .clone()
    }

    pub fn append_message(&self, room_id: Uuid, message: Message) {
        self.messages.entry(room_id).or_default().push(message);
    }

    pub fn user_by_socket(&self, socket_id: Uuid) -> Option<User> {
        self.users
            .iter()
            .find(|entry| entry.value().socket_id == Some(socket_id))
            .map(|entry| entry.value().clone())
    }
}
