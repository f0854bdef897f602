use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use futures::SinkExt;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notify;
use crate::observability::metrics::RelayMetrics;
use crate::relay::callbacks::ServiceClient;
use crate::relay::registry::ConnectionRegistry;

pub struct RelayState {
    pub registry: ConnectionRegistry,
    pub callbacks: ServiceClient,
    pub metrics: RelayMetrics,
}

impl RelayState {
    pub fn new(service_url: &str) -> Self {
        let metrics = RelayMetrics::new();
        Self {
            registry: ConnectionRegistry::new(),
            callbacks: ServiceClient::new(service_url, metrics.clone()),
            metrics,
        }
    }
}

pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/notify", post(notify_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    connections: usize,
}

async fn health(State(state): State<Arc<RelayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connections: state.registry.len(),
    })
}

async fn metrics(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

#[derive(Deserialize)]
pub struct NotifyRequest {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "socketId", default)]
    pub socket_id: Option<Uuid>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<Uuid>,
}

/// The main service's only path to the UIs. Targets a connection directly, a
/// user through the presence index, or everyone when neither is given. A
/// stale or missing target is not an error; the push is simply dropped.
async fn notify_handler(
    State(state): State<Arc<RelayState>>,
    Json(payload): Json<NotifyRequest>,
) -> Json<Value> {
    let target = payload.socket_id.or_else(|| {
        payload
            .user_id
            .and_then(|user_id| state.registry.connection_for(user_id))
    });

    match target {
        Some(socket_id) => {
            if state
                .registry
                .send_to(socket_id, &payload.event, &payload.data)
            {
                state
                    .metrics
                    .pushes_total
                    .with_label_values(&["targeted"])
                    .inc();
            } else {
                info!(event = %payload.event, socket_id = %socket_id, "push target gone; dropped");
            }
        }
        None if payload.user_id.is_some() => {
            info!(event = %payload.event, "push target offline; dropped");
        }
        None => {
            let delivered = state.registry.broadcast(&payload.event, &payload.data);
            state
                .metrics
                .pushes_total
                .with_label_values(&["broadcast"])
                .inc_by(delivered as u64);
        }
    }

    Json(json!({ "success": true }))
}

#[derive(Deserialize)]
struct ClientEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct IdentityPayload {
    #[serde(rename = "userId")]
    user_id: Uuid,
}

#[derive(Deserialize)]
struct LocationPayload {
    #[serde(rename = "userId")]
    user_id: Uuid,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RoomPayload {
    #[serde(rename = "roomId")]
    room_id: String,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, rx) = mpsc::unbounded_channel();
    let conn_id = state.registry.register(tx);
    state.metrics.connected_clients.inc();
    info!(conn_id = %conn_id, "socket connected");

    let mut outbound = UnboundedReceiverStream::new(rx);
    let send_task = tokio::spawn(async move {
        while let Some(message) = outbound.next().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };

        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => handle_event(&state, conn_id, event).await,
            Err(err) => warn!(conn_id = %conn_id, error = %err, "unparseable client event"),
        }
    }

    send_task.abort();
    state.registry.unregister(conn_id);
    state.metrics.connected_clients.dec();
    state.callbacks.disconnect(conn_id).await;
    info!(conn_id = %conn_id, "socket disconnected");
}

async fn handle_event(state: &RelayState, conn_id: Uuid, event: ClientEvent) {
    match event.event.as_str() {
        "identity" => {
            let Ok(payload) = serde_json::from_value::<IdentityPayload>(event.data) else {
                warn!(conn_id = %conn_id, "identity event without userId");
                return;
            };
            state.registry.bind_user(conn_id, payload.user_id);
            state.callbacks.connect(payload.user_id, conn_id).await;
        }
        "updateLocation" => {
            let Ok(payload) = serde_json::from_value::<LocationPayload>(event.data) else {
                warn!(conn_id = %conn_id, "malformed updateLocation event");
                return;
            };

            let location = json!({
                "type": "Point",
                "coordinates": [payload.longitude, payload.latitude],
            });
            state
                .callbacks
                .update_location(payload.user_id, location.clone())
                .await;

            // fan-out to everyone; interested UIs filter by userId
            let delivered = state.registry.broadcast(
                notify::UPDATE_DELIVERY_LOCATION,
                &json!({ "userId": payload.user_id, "location": location }),
            );
            state
                .metrics
                .pushes_total
                .with_label_values(&["broadcast"])
                .inc_by(delivered as u64);
        }
        "join-room" => {
            if let Ok(payload) = serde_json::from_value::<RoomPayload>(event.data) {
                state.registry.join_room(&payload.room_id, conn_id);
            }
        }
        "leave-room" => {
            if let Ok(payload) = serde_json::from_value::<RoomPayload>(event.data) {
                state.registry.leave_room(&payload.room_id, conn_id);
            }
        }
        "chat-message" => {
            let Some(room_id) = event.data.get("roomId").and_then(Value::as_str).map(String::from)
            else {
                warn!(conn_id = %conn_id, "chat-message event without roomId");
                return;
            };

            state.callbacks.save_message(event.data.clone()).await;

            let delivered = state
                .registry
                .send_room(&room_id, notify::CHAT_MESSAGE, &event.data);
            state
                .metrics
                .pushes_total
                .with_label_values(&["room"])
                .inc_by(delivered as u64);
        }
        other => {
            warn!(conn_id = %conn_id, event = other, "unknown client event");
        }
    }
}
