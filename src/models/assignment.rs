use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    /// Offered to a pool of candidate couriers, none committed yet.
    Broadcasted,
    /// Exactly one courier accepted and is delivering.
    Assigned,
    /// Delivery verified; terminal.
    Completed,
}

/// A broadcast offer of one order to a set of candidate couriers.
///
/// Invariants: `assigned_to` is non-null only when status is `Assigned` or
/// `Completed`; a courier holds at most one `Assigned` record at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub order: Uuid,
    pub broadcasted_to: Vec<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub status: AssignmentStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn broadcast(order: Uuid, candidates: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            broadcasted_to: candidates,
            assigned_to: None,
            status: AssignmentStatus::Broadcasted,
            accepted_at: None,
            created_at: Utc::now(),
        }
    }
}
