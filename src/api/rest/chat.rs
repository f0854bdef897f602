use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::chat::Message;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/create", post(create_room))
        .route("/chat/save", post(save_message))
        .route("/chat/messages/:order_id", get(list_messages))
}

#[derive(Deserialize)]
pub struct CreateRoomRequest {
    #[serde(rename = "orderId")]
    pub order_id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "deliveryBoyId")]
    pub delivery_boy_id: Uuid,
}

/// Room ids on the wire are order ids; the relay scopes rooms the same way.
#[derive(Deserialize)]
pub struct SaveMessageRequest {
    pub sender: Uuid,
    pub message: String,
    #[serde(rename = "roomId")]
    pub room_id: Uuid,
    pub time: Option<DateTime<Utc>>,
}

async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRoomRequest>,
) -> Json<Value> {
    let room = state.ensure_chat_room(payload.order_id, payload.user_id, payload.delivery_boy_id);
    Json(json!({ "success": true, "room": room }))
}

async fn save_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SaveMessageRequest>,
) -> Json<Value> {
    let Some(room) = state
        .chat_rooms
        .get(&payload.room_id)
        .map(|entry| entry.value().clone())
    else {
        return Json(json!({ "success": false, "error": "room not found" }));
    };

    let message = Message {
        id: Uuid::new_v4(),
        room_id: room.id,
        sender_id: payload.sender,
        text: payload.message,
        sent_at: payload.time.unwrap_or_else(Utc::now),
    };
    state.append_message(room.id, message);

    Json(json!({ "success": true }))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Json<Value> {
    let Some(room) = state
        .chat_rooms
        .get(&order_id)
        .map(|entry| entry.value().clone())
    else {
        return Json(json!({ "messages": [] }));
    };

    let messages: Vec<Value> = state
        .messages
        .get(&room.id)
        .map(|entry| {
            entry
                .value()
                .iter()
                .map(|message| {
                    json!({
                        "id": message.id,
                        "sender": message.sender_id,
                        "message": message.text,
                        "time": message.sent_at,
                        "roomId": order_id,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Json(json!({ "messages": messages }))
}
