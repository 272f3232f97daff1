//! Workflow metrics.
//!
//! # Exported Metrics
//!
//! - `rx_order_transitions_total{to}`: accepted order status changes
//! - `rx_workflow_rejections_total{code}`: refused workflow operations
//! - `rx_prescriptions_verified_total`: prescriptions verified by a pharmacist
//! - `rx_prescriptions_rejected_total`: prescriptions rejected at review
//! - `rx_orders_placed_total`: orders placed by patients
//! - `rx_prescriptions_created_total`: prescriptions written by providers

use crate::types::OrderStatus;
use metrics::describe_counter;

/// Register metric descriptions. Call once at start-up.
pub fn register_workflow_metrics() {
    describe_counter!(
        "rx_order_transitions_total",
        "Accepted order status transitions by target status"
    );
    describe_counter!(
        "rx_workflow_rejections_total",
        "Workflow operations refused, by error code"
    );
    describe_counter!(
        "rx_prescriptions_verified_total",
        "Prescriptions verified by a pharmacist"
    );
    describe_counter!(
        "rx_prescriptions_rejected_total",
        "Prescriptions rejected at review"
    );
    describe_counter!("rx_orders_placed_total", "Orders placed by patients");
    describe_counter!(
        "rx_prescriptions_created_total",
        "Prescriptions written by providers"
    );

    tracing::info!("Workflow metrics registered");
}

/// Record an accepted order transition.
pub fn record_transition(to: OrderStatus) {
    metrics::counter!("rx_order_transitions_total", "to" => to.as_str()).increment(1);
}

/// Record a refused operation.
pub fn record_rejection(code: &'static str) {
    metrics::counter!("rx_workflow_rejections_total", "code" => code).increment(1);
}

/// Record a verification.
pub fn record_verified() {
    metrics::counter!("rx_prescriptions_verified_total").increment(1);
}

/// Record a rejection at review.
pub fn record_rejected() {
    metrics::counter!("rx_prescriptions_rejected_total").increment(1);
}

/// Record a placed order.
pub fn record_order_placed() {
    metrics::counter!("rx_orders_placed_total").increment(1);
}

/// Record a new prescription.
pub fn record_prescription_created() {
    metrics::counter!("rx_prescriptions_created_total").increment(1);
}
