use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::observability::metrics::RelayMetrics;

/// Persistence callbacks into the main service. Best-effort: a failed
/// callback is counted and logged, never surfaced to the socket client.
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    metrics: RelayMetrics,
}

impl ServiceClient {
    pub fn new(service_url: &str, metrics: RelayMetrics) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: service_url.trim_end_matches('/').to_string(),
            metrics,
        }
    }

    pub async fn connect(&self, user_id: Uuid, socket_id: Uuid) {
        self.post(
            "/socket/connect",
            json!({ "userId": user_id, "socketId": socket_id }),
        )
        .await;
    }

    pub async fn disconnect(&self, socket_id: Uuid) {
        self.post("/socket/disconnect", json!({ "socketId": socket_id }))
            .await;
    }

    pub async fn update_location(&self, user_id: Uuid, location: Value) {
        self.post(
            "/update-location",
            json!({ "userId": user_id, "location": location }),
        )
        .await;
    }

    pub async fn save_message(&self, message: Value) {
        self.post("/chat/save", message).await;
    }

    async fn post(&self, path: &str, body: Value) {
        let url = format!("{}{path}", self.base_url);
        if let Err(err) = self.client.post(&url).json(&body).send().await {
            self.metrics.callback_failures_total.inc();
            warn!(path, error = %err, "service callback failed");
        }
    }
}
