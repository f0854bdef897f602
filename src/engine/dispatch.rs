use std::collections::HashSet;

use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::nearby_couriers;
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::models::order::{Order, OrderStatus};
use crate::models::user::{GeoPoint, User};
use crate::notify;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct CandidateCourier {
    pub id: Uuid,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub mobile: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DispatchOutcome {
    #[serde(rename = "assignedDeliveryBoy")]
    pub assigned_delivery_boy: Option<Uuid>,
    #[serde(rename = "availableBoys")]
    pub available_boys: Vec<CandidateCourier>,
    pub assignment: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Applies an admin status change. Setting `out of delivery` on an order
/// with no live broadcast additionally runs the courier dispatch: geo-query
/// within the configured radius, drop busy couriers, and broadcast the
/// assignment to whoever remains.
pub async fn update_order_status(
    state: &AppState,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<DispatchOutcome, AppError> {
    let order = state
        .orders
        .get(&order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let needs_dispatch =
        status == OrderStatus::OutOfDelivery && !has_live_broadcast(state, &order);

    if !needs_dispatch {
        if let Some(mut entry) = state.orders.get_mut(&order_id) {
            entry.status = status;
        }
        state
            .metrics
            .dispatches_total
            .with_label_values(&["status_only"])
            .inc();

        notify_customer_status(state, &order, status).await;

        return Ok(DispatchOutcome {
            assigned_delivery_boy: order.assigned_delivery_boy,
            available_boys: Vec::new(),
            assignment: order.assignment,
            message: None,
        });
    }

    let center = GeoPoint {
        lat: order.address.latitude,
        lng: order.address.longitude,
    };
    let nearby = nearby_couriers(&state.users, center, state.delivery_radius_km);

    let busy: HashSet<Uuid> = state
        .assignments
        .iter()
        .filter(|entry| entry.value().status == AssignmentStatus::Assigned)
        .filter_map(|entry| entry.value().assigned_to)
        .collect();

    let available: Vec<User> = nearby
        .into_iter()
        .filter(|courier| !busy.contains(&courier.id))
        .collect();

    if available.is_empty() {
        if let Some(mut entry) = state.orders.get_mut(&order_id) {
            entry.status = status;
        }
        state
            .metrics
            .dispatches_total
            .with_label_values(&["no_couriers"])
            .inc();
        info!(order_id = %order_id, "no couriers in range; status updated without broadcast");

        notify_customer_status(state, &order, status).await;

        return Ok(DispatchOutcome {
            assigned_delivery_boy: None,
            available_boys: Vec::new(),
            assignment: None,
            message: Some("order updated but no delivery boys available".to_string()),
        });
    }

    // An emptied-out stale broadcast is replaced, not kept alongside.
    if let Some(stale_id) = order.assignment {
        state.assignments.remove(&stale_id);
    }

    let assignment =
        Assignment::broadcast(order_id, available.iter().map(|courier| courier.id).collect());
    state.assignments.insert(assignment.id, assignment.clone());

    if let Some(mut entry) = state.orders.get_mut(&order_id) {
        entry.status = status;
        entry.assignment = Some(assignment.id);
    }

    state.metrics.broadcast_pool_size.observe(available.len() as f64);
    state
        .metrics
        .dispatches_total
        .with_label_values(&["broadcasted"])
        .inc();

    for courier in &available {
        if let Some(socket) = courier.socket_id {
            state
                .notifier
                .notify(
                    notify::DELIVERY_ASSIGNMENT,
                    json!({
                        "assignmentId": assignment.id,
                        "order": assignment.order,
                    }),
                    Some(socket),
                )
                .await;
        }
    }

    notify_customer_status(state, &order, status).await;

    info!(
        order_id = %order_id,
        assignment_id = %assignment.id,
        candidates = available.len(),
        "order broadcasted to couriers"
    );

    Ok(DispatchOutcome {
        assigned_delivery_boy: None,
        available_boys: available.iter().map(candidate_payload).collect(),
        assignment: Some(assignment.id),
        message: None,
    })
}

/// A broadcast whose candidate pool has been emptied by rejections no longer
/// blocks a re-dispatch; the admin retry path replaces it.
fn has_live_broadcast(state: &AppState, order: &Order) -> bool {
    let Some(assignment_id) = order.assignment else {
        return false;
    };

    match state.assignments.get(&assignment_id) {
        Some(entry) => {
            let assignment = entry.value();
            !(assignment.status == AssignmentStatus::Broadcasted
                && assignment.broadcasted_to.is_empty())
        }
        None => false,
    }
}

async fn notify_customer_status(state: &AppState, order: &Order, status: OrderStatus) {
    let Some(socket) = state
        .users
        .get(&order.user)
        .and_then(|entry| entry.value().socket_id)
    else {
        return;
    };

    let assigned = order.assigned_delivery_boy.and_then(|id| {
        state.users.get(&id).map(|entry| {
            let user = entry.value();
            json!({
                "id": user.id,
                "name": user.name,
                "mobile": user.mobile,
            })
        })
    });

    state
        .notifier
        .notify(
            notify::ORDER_STATUS_UPDATED,
            json!({
                "orderId": order.id,
                "status": status,
                "assignedDeliveryBoy": assigned,
            }),
            Some(socket),
        )
        .await;
}

fn candidate_payload(courier: &User) -> CandidateCourier {
    CandidateCourier {
        id: courier.id,
        name: courier.name.clone(),
        longitude: courier.location.lng,
        latitude: courier.location.lat,
        mobile: courier.mobile.clone(),
    }
}
