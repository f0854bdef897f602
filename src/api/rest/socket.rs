use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::GeoPoint;
use crate::state::AppState;

/// Persistence callbacks the relay fires on connection lifecycle and
/// courier movement.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/socket/connect", post(connect))
        .route("/socket/disconnect", post(disconnect))
        .route("/update-location", post(update_location))
}

#[derive(Deserialize)]
pub struct ConnectRequest {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "socketId")]
    pub socket_id: Uuid,
}

#[derive(Deserialize)]
pub struct DisconnectRequest {
    #[serde(rename = "socketId")]
    pub socket_id: Uuid,
}

/// GeoJSON Point as the relay sends it: `[longitude, latitude]`.
#[derive(Deserialize)]
pub struct GeoJsonPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub location: GeoJsonPoint,
}

async fn connect(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConnectRequest>,
) -> Result<Json<Value>, AppError> {
    let mut user = state
        .users
        .get_mut(&payload.user_id)
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", payload.user_id)))?;

    user.socket_id = Some(payload.socket_id);
    user.is_online = true;
    user.updated_at = Utc::now();

    Ok(Json(json!({ "success": true })))
}

/// Clears the connection handle for whichever user held it. A handle that
/// matches nobody is a stale disconnect and not an error.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DisconnectRequest>,
) -> Json<Value> {
    if let Some(user) = state.user_by_socket(payload.socket_id) {
        if let Some(mut entry) = state.users.get_mut(&user.id) {
            entry.socket_id = None;
            entry.is_online = false;
            entry.updated_at = Utc::now();
        }
    }

    Json(json!({ "success": true }))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Value>, AppError> {
    if payload.location.kind != "Point" {
        return Err(AppError::BadRequest(format!(
            "unsupported geometry {}",
            payload.location.kind
        )));
    }

    let [lng, lat] = payload.location.coordinates;
    let mut user = state
        .users
        .get_mut(&payload.user_id)
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", payload.user_id)))?;

    user.location = GeoPoint { lat, lng };
    user.updated_at = Utc::now();

    Ok(Json(json!({
        "success": true,
        "location": user.location,
    })))
}
