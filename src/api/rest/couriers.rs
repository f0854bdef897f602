use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::engine::acceptance;
use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/delivery-boy/assignment", get(list_broadcasts))
        .route("/delivery-boy/current-order", post(current_order))
        .route("/delivery-boy/:id/accept-order", get(accept_order))
        .route("/delivery-boy/:id/reject-order", get(reject_order))
}

/// Session issuance is external; the courier identity arrives as a query
/// parameter the gateway fills in.
#[derive(Deserialize)]
pub struct CourierQuery {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct CurrentOrderRequest {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<CourierQuery>,
) -> Result<Json<Value>, AppError> {
    acceptance::accept(&state, id, query.user_id).await?;
    Ok(Json(json!({ "message": "order accepted successfully" })))
}

async fn reject_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<CourierQuery>,
) -> Result<Json<Value>, AppError> {
    acceptance::reject(&state, id, query.user_id).await?;
    Ok(Json(json!({ "message": "assignment rejected successfully" })))
}

/// Live broadcasts offered to this courier, each populated with its order.
async fn list_broadcasts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CourierQuery>,
) -> Json<Value> {
    let assignments: Vec<Value> = state
        .assignments
        .iter()
        .filter(|entry| {
            let assignment = entry.value();
            assignment.status == AssignmentStatus::Broadcasted
                && assignment.broadcasted_to.contains(&query.user_id)
        })
        .map(|entry| populate_order(&state, entry.value()))
        .collect();

    Json(json!({ "assignments": assignments }))
}

/// The courier's single in-flight delivery, or `{active:false}`.
async fn current_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CurrentOrderRequest>,
) -> Json<Value> {
    let active = state.assignments.iter().find_map(|entry| {
        let assignment = entry.value();
        if assignment.status == AssignmentStatus::Assigned
            && assignment.assigned_to == Some(payload.user_id)
        {
            Some(assignment.clone())
        } else {
            None
        }
    });

    match active {
        Some(assignment) => Json(json!({
            "active": true,
            "assignment": populate_order(&state, &assignment),
        })),
        None => Json(json!({ "active": false })),
    }
}

/// Replaces the assignment's order id with the full order document, the way
/// the UI expects it.
fn populate_order(state: &AppState, assignment: &Assignment) -> Value {
    let mut value = serde_json::to_value(assignment).unwrap_or(Value::Null);
    if let Some(order) = state.orders.get(&assignment.order) {
        if let Ok(order) = serde_json::to_value(order.value()) {
            value["order"] = order;
        }
    }
    value
}
