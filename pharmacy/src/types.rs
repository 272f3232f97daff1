//! Core domain types for the pharmacy workflows.
//!
//! Orders progress through
//! pending → processing → compounding ⇄ quality_check ⇄ packaging → shipped → delivered,
//! with cancellation possible until compounding is finished. Prescriptions are
//! verified (or rejected) exactly once before anything is dispensed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "` from a string")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the inner string value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier for an order
    OrderId
);
string_id!(
    /// Unique identifier for a prescription
    PrescriptionId
);
string_id!(
    /// Unique identifier for a patient
    PatientId
);
string_id!(
    /// Unique identifier for a prescribing provider
    ProviderId
);
string_id!(
    /// Unique identifier for a compound
    CompoundId
);
string_id!(
    /// Unique identifier for a user account (the actor behind a request)
    UserId
);

/// Money amount in cents (to avoid floating point issues)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a new money amount from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the value in cents
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

/// A status string that names no known state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} status '{value}'")]
pub struct UnknownStatus {
    kind: &'static str,
    value: String,
}

/// Status of an order in its lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed by the patient, not yet picked up by staff
    Pending,
    /// Accepted by staff
    Processing,
    /// Being prepared in the lab
    Compounding,
    /// Awaiting or undergoing quality review
    QualityCheck,
    /// Passed QC, being packed
    Packaging,
    /// Handed to the carrier
    Shipped,
    /// Received by the patient
    Delivered,
    /// Abandoned before compounding finished
    Cancelled,
}

impl OrderStatus {
    /// Every order status, in lifecycle order.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Processing,
        Self::Compounding,
        Self::QualityCheck,
        Self::Packaging,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire and database name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Compounding => "compounding",
            Self::QualityCheck => "quality_check",
            Self::Packaging => "packaging",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the order is on the lab floor (compounding or awaiting QC).
    #[must_use]
    pub const fn in_compounding_stage(self) -> bool {
        matches!(self, Self::Compounding | Self::QualityCheck)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "order",
                value: s.to_string(),
            })
    }
}

/// Status of a prescription.
///
/// Only `pending`, `verified` and `cancelled` are driven by the verification
/// workflow; the remaining values mirror fulfilment progress.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    /// Written by the provider, awaiting pharmacist review
    Pending,
    /// Approved by a pharmacist
    Verified,
    /// Being compounded
    Compounding,
    /// In quality review
    QualityCheck,
    /// Ready for dispatch
    Ready,
    /// Shipped
    Shipped,
    /// Delivered
    Delivered,
    /// Rejected or withdrawn
    Cancelled,
}

impl PrescriptionStatus {
    /// Every prescription status.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Verified,
        Self::Compounding,
        Self::QualityCheck,
        Self::Ready,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire and database name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Compounding => "compounding",
            Self::QualityCheck => "quality_check",
            Self::Ready => "ready",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrescriptionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "prescription",
                value: s.to_string(),
            })
    }
}

/// Persisted order row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRecord {
    /// Order id
    pub id: OrderId,
    /// Human-readable number, `ORD-…`
    pub order_number: String,
    /// Owning patient
    pub patient_id: PatientId,
    /// Prescription the order dispenses against
    pub prescription_id: PrescriptionId,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Amount charged
    pub total_amount: Money,
    /// Placement time
    pub created_at: DateTime<Utc>,
    /// Payment time
    pub paid_at: Option<DateTime<Utc>>,
    /// Stamped on the transition to `shipped`
    pub shipped_at: Option<DateTime<Utc>>,
    /// Stamped on the transition to `delivered`
    pub delivered_at: Option<DateTime<Utc>>,
    /// Carrier tracking number
    pub tracking_number: Option<String>,
    /// Carrier name
    pub carrier: Option<String>,
}

/// Persisted prescription row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrescriptionRecord {
    /// Prescription id
    pub id: PrescriptionId,
    /// Patient the prescription is written for
    pub patient_id: PatientId,
    /// Prescribing provider
    pub provider_id: ProviderId,
    /// Compound to dispense
    pub compound_id: CompoundId,
    /// Units per dispense
    pub quantity: i32,
    /// Directions for use
    pub directions: String,
    /// Status
    pub status: PrescriptionStatus,
    /// Authorized refills
    pub refills: i32,
    /// Refills consumed by orders
    pub refills_used: i32,
    /// When the provider wrote it
    pub prescribed_at: DateTime<Utc>,
    /// Set by verification
    pub verified_at: Option<DateTime<Utc>>,
    /// Set by verification
    pub verified_by: Option<UserId>,
}

impl PrescriptionRecord {
    /// Refills still available for new orders.
    #[must_use]
    pub const fn refills_remaining(&self) -> i32 {
        self.refills - self.refills_used
    }
}

/// Audit entry for one accepted order transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusLogEntry {
    /// Entry id
    pub id: String,
    /// Order the entry belongs to
    pub order_id: OrderId,
    /// The status the order moved to
    pub status: OrderStatus,
    /// Optional free-text note
    pub note: Option<String>,
    /// Acting user; absent for system-created entries
    pub created_by: Option<UserId>,
    /// When the transition happened
    pub created_at: DateTime<Utc>,
}

/// Shipping destination attached to an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Street line 1
    pub street1: String,
    /// Street line 2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    /// City
    pub city: String,
    /// Two-letter state code
    pub state: String,
    /// `12345` or `12345-6789`
    pub zip_code: String,
    /// Country code
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "US".to_string()
}

/// A formulated medication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compound {
    /// Compound id
    pub id: CompoundId,
    /// Display name
    pub name: String,
    /// Dosage form, e.g. capsule, cream
    pub dosage_form: String,
    /// Default strength
    pub strength: Option<String>,
    /// Cash price per dispense
    pub cash_price: Option<Money>,
    /// Whether providers may prescribe it
    pub is_active: bool,
}

/// Patient as seen by the workflows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patient {
    /// Patient id
    pub id: PatientId,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Date of birth
    pub date_of_birth: Option<NaiveDate>,
    /// State of residence from the patient's address, if on file
    pub state: Option<String>,
}

impl Patient {
    /// "First Last"
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A provider's license to prescribe in one state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderLicense {
    /// License holder
    pub provider_id: ProviderId,
    /// Two-letter state code
    pub state: String,
    /// Whether the licensing board lists it as active
    pub is_active: bool,
    /// Expiry, if any
    pub expires_at: Option<DateTime<Utc>>,
}

impl ProviderLicense {
    /// Whether the license authorizes prescribing in `state` at `at`.
    #[must_use]
    pub fn covers(&self, state: &str, at: DateTime<Utc>) -> bool {
        self.is_active
            && self.state.eq_ignore_ascii_case(state)
            && self.expires_at.is_none_or(|expiry| expiry > at)
    }
}

/// A person reference embedded in views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PersonRef {
    /// Entity id
    pub id: String,
    /// Display name
    pub name: String,
}

/// Compact compound description embedded in views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundSummary {
    /// Compound id
    pub id: CompoundId,
    /// Display name
    pub name: String,
    /// Dosage form
    pub dosage_form: String,
    /// Strength
    pub strength: Option<String>,
}

impl From<&Compound> for CompoundSummary {
    fn from(compound: &Compound) -> Self {
        Self {
            id: compound.id.clone(),
            name: compound.name.clone(),
            dosage_form: compound.dosage_form.clone(),
            strength: compound.strength.clone(),
        }
    }
}

/// What a workflow returns after touching an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    /// Order id
    pub id: OrderId,
    /// Human-readable number
    pub order_number: String,
    /// Current status
    pub status: OrderStatus,
    /// Amount charged
    pub total_amount: Money,
    /// Placement time
    pub created_at: DateTime<Utc>,
    /// Carrier tracking number
    pub tracking_number: Option<String>,
    /// Carrier
    pub carrier: Option<String>,
    /// Patient id and display name
    pub patient: PersonRef,
    /// Compound name
    pub medication: String,
}

/// Prescription fields shown alongside an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionSummary {
    /// Prescription id
    pub id: PrescriptionId,
    /// Units per dispense
    pub quantity: i32,
    /// Directions for use
    pub directions: String,
    /// Authorized refills
    pub refills: i32,
    /// Refills consumed
    pub refills_used: i32,
    /// When written
    pub prescribed_at: DateTime<Utc>,
}

/// Full order read model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    /// Headline fields
    #[serde(flatten)]
    pub order: OrderView,
    /// Payment time
    pub paid_at: Option<DateTime<Utc>>,
    /// Shipping time
    pub shipped_at: Option<DateTime<Utc>>,
    /// Delivery time
    pub delivered_at: Option<DateTime<Utc>>,
    /// Prescription dispensed against
    pub prescription: PrescriptionSummary,
    /// Compound dispensed
    pub compound: CompoundSummary,
    /// Destination
    pub ship_address: Option<ShippingAddress>,
    /// Most recent audit entries, newest first (at most [`RECENT_LOG_ENTRIES`])
    pub status_logs: Vec<StatusLogEntry>,
}

/// How many audit entries an order detail carries.
pub const RECENT_LOG_ENTRIES: usize = 10;

/// What the prescription workflows return.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionView {
    /// Prescription id
    pub id: PrescriptionId,
    /// Units per dispense
    pub quantity: i32,
    /// Directions for use
    pub directions: String,
    /// Status
    pub status: PrescriptionStatus,
    /// Authorized refills
    pub refills: i32,
    /// Refills consumed
    pub refills_used: i32,
    /// When written
    pub prescribed_at: DateTime<Utc>,
    /// Verification time
    pub verified_at: Option<DateTime<Utc>>,
    /// Verifying pharmacist
    pub verified_by: Option<UserId>,
    /// Patient id and display name
    pub patient: PersonRef,
    /// Prescribing provider
    pub provider_id: ProviderId,
    /// Compound prescribed
    pub compound: CompoundSummary,
    /// Echoed back by a rejection, never stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Sort direction for list queries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

/// One page of a list query plus the unpaged total.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// Rows across all pages
    pub total: u64,
}

/// Paging window shared by list queries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page
    pub page: u32,
    /// Rows per page
    pub page_size: u32,
}

impl PageRequest {
    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }
}

/// Filters for order lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderQuery {
    /// Only this status
    pub status: Option<OrderStatus>,
    /// Only this patient's orders
    pub patient: Option<PatientId>,
    /// Sort on `created_at`
    pub sort: SortOrder,
    /// Window
    pub page: PageRequest,
}

/// Filters for prescription lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrescriptionQuery {
    /// Only this status
    pub status: Option<PrescriptionStatus>,
    /// Only this provider's prescriptions
    pub provider: Option<ProviderId>,
    /// Only this patient's prescriptions
    pub patient: Option<PatientId>,
    /// Sort on `prescribed_at`
    pub sort: SortOrder,
    /// Window
    pub page: PageRequest,
}
