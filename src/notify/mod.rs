use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

pub const DELIVERY_ASSIGNMENT: &str = "delivery-assignment";
pub const ORDER_ASSIGNED: &str = "order-assigned";
pub const ORDER_STATUS_UPDATED: &str = "order-status-updated";
pub const UPDATE_DELIVERY_LOCATION: &str = "update-delivery-location";
pub const NEW_ORDER: &str = "new-order";
pub const CHAT_MESSAGE: &str = "chat-message";

/// Best-effort push port to the realtime relay.
///
/// A push may be dropped: delivery failures are logged and swallowed, and the
/// caller's state mutation is authoritative whether or not the push lands.
/// `socket_id = None` means broadcast to every live connection.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, event: &str, data: Value, socket_id: Option<Uuid>);
}

/// Fire-and-forget HTTP client for the relay's `POST /notify` endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    notify_url: String,
}

impl HttpNotifier {
    pub fn new(relay_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            notify_url: format!("{}/notify", relay_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Notify for HttpNotifier {
    async fn notify(&self, event: &str, data: Value, socket_id: Option<Uuid>) {
        let body = json!({
            "event": event,
            "data": data,
            "socketId": socket_id,
        });

        if let Err(err) = self.client.post(&self.notify_url).json(&body).send().await {
            warn!(event, error = %err, "relay push dropped");
        }
    }
}

/// Discards every push. Used when no relay is configured and in tests.
pub struct NullNotifier;

#[async_trait]
impl Notify for NullNotifier {
    async fn notify(&self, _event: &str, _data: Value, _socket_id: Option<Uuid>) {}
}
