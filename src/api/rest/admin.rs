use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch::{self, DispatchOutcome};
use crate::error::AppError;
use crate::models::order::OrderStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/admin/order/:id/update-order-status",
        post(update_order_status),
    )
}

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<DispatchOutcome>, AppError> {
    let outcome = dispatch::update_order_status(&state, id, payload.status).await?;
    Ok(Json(outcome))
}
