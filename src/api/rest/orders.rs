use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::engine::handshake::{self, OtpOutcome};
use crate::error::AppError;
use crate::models::assignment::AssignmentStatus;
use crate::models::order::{Address, Order};
use crate::notify;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/order/:id/send-otp", post(send_otp))
        .route("/order/:id/verify-otp", post(verify_otp))
        .route("/order/:id/deliveryBoy-location", get(delivery_boy_location))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub address: Address,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if !state.users.contains_key(&payload.user_id) {
        return Err(AppError::BadRequest(format!(
            "user {} not found",
            payload.user_id
        )));
    }

    let order = Order::new(payload.user_id, payload.address);
    state.orders.insert(order.id, order.clone());

    // live admin dashboards refresh off this broadcast
    state
        .notifier
        .notify(
            notify::NEW_ORDER,
            json!({ "orderId": order.id, "userId": order.user }),
            None,
        )
        .await;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order.value().clone()))
}

async fn send_otp(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<OtpOutcome> {
    Json(handshake::send_otp(&state, id).await)
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Json<OtpOutcome> {
    Json(handshake::verify_otp(&state, id, &payload.otp).await)
}

/// Live coordinate of the courier currently delivering this order.
async fn delivery_boy_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Value> {
    let courier_id = state.assignments.iter().find_map(|entry| {
        let assignment = entry.value();
        if assignment.order == id && assignment.status == AssignmentStatus::Assigned {
            assignment.assigned_to
        } else {
            None
        }
    });

    let location = courier_id
        .and_then(|courier_id| state.users.get(&courier_id).map(|u| u.value().location));

    match location {
        Some(point) => Json(json!({
            "location": { "latitude": point.lat, "longitude": point.lng }
        })),
        None => Json(json!({ "location": null })),
    }
}
