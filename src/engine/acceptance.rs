use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::notify;
use crate::state::AppState;

/// Courier accepts a broadcast. Exactly one caller can win: the status check
/// and the `assigned_to` write happen under the assignment's entry lock, so a
/// concurrent accept observes `Assigned` and fails as expired.
pub async fn accept(
    state: &AppState,
    assignment_id: Uuid,
    courier_id: Uuid,
) -> Result<Assignment, AppError> {
    // Pre-flight reads: missing assignment, expired broadcast and missing
    // order surface in that documented order, and nothing is mutated until
    // the order document is confirmed. The entry-guard check further down
    // stays authoritative under concurrency.
    let order_id = {
        let entry = state.assignments.get(&assignment_id).ok_or_else(|| {
            state
                .metrics
                .accepts_total
                .with_label_values(&["not_found"])
                .inc();
            AppError::NotFound(format!("assignment {assignment_id} not found"))
        })?;

        if entry.status != AssignmentStatus::Broadcasted {
            state
                .metrics
                .accepts_total
                .with_label_values(&["expired"])
                .inc();
            return Err(AppError::Conflict("assignment is expired".to_string()));
        }

        entry.order
    };

    if !state.orders.contains_key(&order_id) {
        state
            .metrics
            .accepts_total
            .with_label_values(&["not_found"])
            .inc();
        return Err(AppError::NotFound(format!("order {order_id} not found")));
    }

    // Busy check runs before taking the entry guard; iterating the map while
    // holding a guard on it can deadlock on a shard.
    let already_assigned = state.assignments.iter().any(|entry| {
        *entry.key() != assignment_id
            && entry.value().status == AssignmentStatus::Assigned
            && entry.value().assigned_to == Some(courier_id)
    });

    if already_assigned {
        state
            .metrics
            .accepts_total
            .with_label_values(&["already_assigned"])
            .inc();
        return Err(AppError::Conflict(
            "you are already assigned to another order".to_string(),
        ));
    }

    let accepted = {
        let mut entry = state.assignments.get_mut(&assignment_id).ok_or_else(|| {
            state
                .metrics
                .accepts_total
                .with_label_values(&["not_found"])
                .inc();
            AppError::NotFound(format!("assignment {assignment_id} not found"))
        })?;

        if entry.status != AssignmentStatus::Broadcasted {
            state
                .metrics
                .accepts_total
                .with_label_values(&["expired"])
                .inc();
            return Err(AppError::Conflict("assignment is expired".to_string()));
        }

        entry.assigned_to = Some(courier_id);
        entry.status = AssignmentStatus::Assigned;
        entry.accepted_at = Some(Utc::now());
        entry.clone()
    };

    let order = {
        let mut entry = state
            .orders
            .get_mut(&accepted.order)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", accepted.order)))?;
        entry.assigned_delivery_boy = Some(courier_id);
        entry.clone()
    };

    // A courier who just took a job must not linger in other live broadcasts.
    for mut entry in state.assignments.iter_mut() {
        if entry.id != accepted.id && entry.status == AssignmentStatus::Broadcasted {
            entry.broadcasted_to.retain(|id| *id != courier_id);
        }
    }

    state.ensure_chat_room(order.id, order.user, courier_id);

    let courier_info = state.users.get(&courier_id).map(|entry| {
        let user = entry.value();
        json!({
            "id": user.id,
            "name": user.name,
            "mobile": user.mobile,
        })
    });

    state
        .notifier
        .notify(
            notify::ORDER_ASSIGNED,
            json!({
                "orderId": order.id,
                "assignedDeliveryBoy": courier_info,
            }),
            None,
        )
        .await;

    state
        .metrics
        .accepts_total
        .with_label_values(&["accepted"])
        .inc();
    info!(
        assignment_id = %assignment_id,
        courier_id = %courier_id,
        order_id = %order.id,
        "assignment accepted"
    );

    Ok(accepted)
}

/// Courier declines a broadcast: pulled from the candidate pool only. An
/// emptied pool stays `Broadcasted` for admin follow-up; there is no
/// automatic expiry.
pub async fn reject(
    state: &AppState,
    assignment_id: Uuid,
    courier_id: Uuid,
) -> Result<(), AppError> {
    {
        let mut entry = state
            .assignments
            .get_mut(&assignment_id)
            .ok_or_else(|| AppError::NotFound(format!("assignment {assignment_id} not found")))?;

        if entry.status != AssignmentStatus::Broadcasted {
            return Err(AppError::Conflict(
                "assignment is no longer available to reject".to_string(),
            ));
        }

        entry.broadcasted_to.retain(|id| *id != courier_id);
    }

    state.metrics.rejects_total.inc();
    info!(assignment_id = %assignment_id, courier_id = %courier_id, "assignment rejected");
    Ok(())
}
