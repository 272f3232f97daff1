//! Writes produced by the workflow reducers.
//!
//! A reducer never touches storage; it returns `Effect::Persist(Write)` values
//! and the service hands the whole batch to [`PharmacyStore::commit`](super::PharmacyStore::commit).

use crate::types::{
    OrderId, OrderRecord, OrderStatus, PrescriptionId, PrescriptionRecord, PrescriptionStatus,
    ShippingAddress, StatusLogEntry, UserId,
};
use chrono::{DateTime, Utc};

/// Column changes for one order. `None` leaves the column alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderPatch {
    /// New status
    pub status: Option<OrderStatus>,
    /// Shipping milestone
    pub shipped_at: Option<DateTime<Utc>>,
    /// Delivery milestone
    pub delivered_at: Option<DateTime<Utc>>,
    /// Tracking number
    pub tracking_number: Option<String>,
    /// Carrier
    pub carrier: Option<String>,
}

impl OrderPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply to an in-memory record.
    pub fn apply_to(&self, order: &mut OrderRecord) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(at) = self.shipped_at {
            order.shipped_at = Some(at);
        }
        if let Some(at) = self.delivered_at {
            order.delivered_at = Some(at);
        }
        if let Some(tracking) = &self.tracking_number {
            order.tracking_number = Some(tracking.clone());
        }
        if let Some(carrier) = &self.carrier {
            order.carrier = Some(carrier.clone());
        }
    }
}

/// Column changes for one prescription. `None` leaves the column alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrescriptionPatch {
    /// New status
    pub status: Option<PrescriptionStatus>,
    /// Verification time
    pub verified_at: Option<DateTime<Utc>>,
    /// Verifying pharmacist
    pub verified_by: Option<UserId>,
    /// Amended quantity
    pub quantity: Option<i32>,
    /// Amended directions
    pub directions: Option<String>,
}

impl PrescriptionPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply to an in-memory record.
    pub fn apply_to(&self, prescription: &mut PrescriptionRecord) {
        if let Some(status) = self.status {
            prescription.status = status;
        }
        if let Some(at) = self.verified_at {
            prescription.verified_at = Some(at);
        }
        if let Some(by) = &self.verified_by {
            prescription.verified_by = Some(by.clone());
        }
        if let Some(quantity) = self.quantity {
            prescription.quantity = quantity;
        }
        if let Some(directions) = &self.directions {
            prescription.directions.clone_from(directions);
        }
    }
}

/// One persistence operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Write {
    /// Update columns on an existing order
    UpdateOrder {
        /// Target
        id: OrderId,
        /// Changes
        patch: OrderPatch,
    },
    /// Append an audit entry
    AppendOrderLog(StatusLogEntry),
    /// Update columns on an existing prescription
    UpdatePrescription {
        /// Target
        id: PrescriptionId,
        /// Changes
        patch: PrescriptionPatch,
    },
    /// Increment `refills_used` by one
    ConsumeRefill {
        /// Target
        id: PrescriptionId,
    },
    /// Create an order with its shipping address
    InsertOrder {
        /// New row
        order: OrderRecord,
        /// Destination
        address: ShippingAddress,
    },
    /// Create a prescription
    InsertPrescription(PrescriptionRecord),
}

impl Write {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UpdateOrder { .. } => "update_order",
            Self::AppendOrderLog(_) => "append_order_log",
            Self::UpdatePrescription { .. } => "update_prescription",
            Self::ConsumeRefill { .. } => "consume_refill",
            Self::InsertOrder { .. } => "insert_order",
            Self::InsertPrescription(_) => "insert_prescription",
        }
    }
}
