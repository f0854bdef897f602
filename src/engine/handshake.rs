use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::assignment::AssignmentStatus;
use crate::models::order::OrderStatus;
use crate::state::AppState;

/// Soft outcome for the OTP endpoints: lookup and code mismatches answer
/// `success:false` rather than a 4xx, matching the customer-facing flow.
#[derive(Debug, Serialize)]
pub struct OtpOutcome {
    pub success: bool,
    pub message: String,
}

impl OtpOutcome {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    fn fail(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
        }
    }
}

/// Generates a fresh 4-digit code, stores it on the order and mails it to the
/// customer. Always overwrites any earlier code.
pub async fn send_otp(state: &AppState, order_id: Uuid) -> OtpOutcome {
    let otp = rand::thread_rng().gen_range(1000..=9999).to_string();

    let customer_id = {
        let Some(mut entry) = state.orders.get_mut(&order_id) else {
            return OtpOutcome::fail("order not found");
        };
        entry.delivery_otp = Some(otp.clone());
        entry.user
    };

    let email = state
        .users
        .get(&customer_id)
        .map(|entry| entry.value().email.clone());

    if let Some(email) = email {
        state
            .mailer
            .send(
                &email,
                "Your Delivery OTP",
                &format!("<h2>Your Delivery OTP is <strong>{otp}</strong></h2>"),
            )
            .await;
    }

    info!(order_id = %order_id, "delivery otp issued");
    OtpOutcome::ok("OTP sent to email")
}

/// Verifies the code the courier collected at the door. On match the order is
/// delivered and the linked assignment completes with its courier released.
pub async fn verify_otp(state: &AppState, order_id: Uuid, otp: &str) -> OtpOutcome {
    let assignment_id = {
        let Some(mut entry) = state.orders.get_mut(&order_id) else {
            return OtpOutcome::fail("order not found");
        };

        if entry.status == OrderStatus::Delivered || entry.delivery_otp.as_deref() != Some(otp) {
            state
                .metrics
                .otp_verifications_total
                .with_label_values(&["mismatch"])
                .inc();
            return OtpOutcome::fail("invalid OTP");
        }

        entry.status = OrderStatus::Delivered;
        entry.delivery_otp_verified = true;
        entry.delivered_at = Some(Utc::now());
        entry.assignment
    };

    if let Some(assignment_id) = assignment_id {
        if let Some(mut entry) = state.assignments.get_mut(&assignment_id) {
            entry.assigned_to = None;
            entry.status = AssignmentStatus::Completed;
        }
    }

    state
        .metrics
        .otp_verifications_total
        .with_label_values(&["verified"])
        .inc();
    info!(order_id = %order_id, "delivery completed");
    OtpOutcome::ok("Delivery Completed Successfully")
}
