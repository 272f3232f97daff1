//! Compounding lab workflow.
//!
//! Lab staff only see the slice of the order graph between compounding and
//! packaging. Shipping and everything before compounding go through
//! [`super::order`].

use super::WorkflowEnvironment;
use crate::error::WorkflowError;
use crate::identity::Actor;
use crate::role::Role;
use crate::store::{OrderPatch, Write};
use crate::types::{CompoundId, CompoundSummary, OrderId, OrderRecord, OrderStatus, StatusLogEntry};
use chrono::{DateTime, Utc};
use rx_dispatch_core::effect::Effect;
use rx_dispatch_core::machine::{Edge, GuardedMachine, MachineError};
use rx_dispatch_core::reducer::Reducer;
use serde::Serialize;
use smallvec::{SmallVec, smallvec};
use std::collections::HashMap;
use std::fmt;

/// The order statuses visible to the lab.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompoundingStage {
    /// Being prepared
    Compounding,
    /// Under quality review
    QualityCheck,
    /// Passed QC; leaves the lab from here
    Packaging,
}

impl CompoundingStage {
    /// Map an order status into the lab slice.
    #[must_use]
    pub const fn from_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Compounding => Some(Self::Compounding),
            OrderStatus::QualityCheck => Some(Self::QualityCheck),
            OrderStatus::Packaging => Some(Self::Packaging),
            _ => None,
        }
    }

    /// Parse a requested stage by its order-status name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok().and_then(Self::from_status)
    }

    /// The order status this stage corresponds to.
    #[must_use]
    pub const fn status(self) -> OrderStatus {
        match self {
            Self::Compounding => OrderStatus::Compounding,
            Self::QualityCheck => OrderStatus::QualityCheck,
            Self::Packaging => OrderStatus::Packaging,
        }
    }
}

impl fmt::Display for CompoundingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

use CompoundingStage::{Compounding, Packaging, QualityCheck};

/// Lab transition table, a sub-graph of [`super::order::ORDER_MACHINE`].
pub static COMPOUNDING_MACHINE: GuardedMachine<CompoundingStage, Role> = GuardedMachine::new(
    "compounding",
    &[
        Edge::open(Compounding, QualityCheck),
        Edge::open(QualityCheck, Packaging),
        Edge::open(QualityCheck, Compounding),
    ],
);

/// Compounding actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompoundingAction {
    /// Move the order to `to`.
    Advance {
        /// Lab staff member
        actor: Actor,
        /// Requested stage
        to: CompoundingStage,
        /// Note for the audit entry
        note: Option<String>,
    },
}

/// Reducer for lab stage changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompoundingReducer;

impl Reducer for CompoundingReducer {
    type State = OrderRecord;
    type Action = CompoundingAction;
    type Environment = WorkflowEnvironment;
    type Write = Write;
    type Error = WorkflowError;

    fn reduce(
        &self,
        order: &mut OrderRecord,
        action: CompoundingAction,
        env: &WorkflowEnvironment,
    ) -> Result<SmallVec<[Effect<Write>; 4]>, WorkflowError> {
        let CompoundingAction::Advance { actor, to, note } = action;

        let from = CompoundingStage::from_status(order.status)
            .filter(|stage| *stage != Packaging)
            .ok_or_else(|| WorkflowError::invalid_state("Order is not in compounding stage"))?;

        COMPOUNDING_MACHINE
            .check(from, to, actor.role)
            .map_err(|err| match err {
                MachineError::InvalidTransition { from, to, .. }
                | MachineError::Forbidden { from, to, .. } => WorkflowError::InvalidTransition {
                    from: from.status(),
                    to: to.status(),
                },
            })?;

        let now = env.now();
        let patch = OrderPatch {
            status: Some(to.status()),
            ..OrderPatch::default()
        };
        patch.apply_to(order);

        Ok(smallvec![
            Effect::Persist(Write::UpdateOrder {
                id: order.id.clone(),
                patch,
            }),
            Effect::Persist(Write::AppendOrderLog(StatusLogEntry {
                id: env.next_id(),
                order_id: order.id.clone(),
                status: to.status(),
                note,
                created_by: Some(actor.user_id),
                created_at: now,
            })),
        ])
    }
}

/// An in-flight order as the batch view needs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchMember {
    /// Order id
    pub order_id: OrderId,
    /// Human-readable number
    pub order_number: String,
    /// Current status
    pub status: OrderStatus,
    /// Placement time
    pub created_at: DateTime<Utc>,
    /// Compound being prepared
    pub compound: CompoundSummary,
}

/// Order line inside a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOrder {
    /// Order id
    pub id: OrderId,
    /// Human-readable number
    pub order_number: String,
    /// Current status
    pub status: OrderStatus,
    /// Placement time
    pub created_at: DateTime<Utc>,
}

/// Member counts per lab status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Orders still compounding
    pub compounding: u32,
    /// Orders in QC
    pub quality_check: u32,
}

/// In-flight orders sharing one compound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Compound id
    pub compound_id: CompoundId,
    /// Compound name
    pub compound_name: String,
    /// Dosage form
    pub dosage_form: String,
    /// Strength
    pub strength: Option<String>,
    /// Number of member orders
    pub order_count: u32,
    /// Members, oldest first
    pub orders: Vec<BatchOrder>,
    /// "Compounding" until every member has reached QC
    pub current_step: &'static str,
    /// Share of members in QC, as a rounded percentage
    pub progress: u32,
    /// Counts per status
    pub statuses: StatusCounts,
}

/// The lab-floor view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Batches in order of their oldest member
    pub batches: Vec<Batch>,
    /// `batches.len()`
    pub total_batches: usize,
    /// Orders across all batches
    pub total_orders: usize,
}

/// Round-half-up percentage of `part` in `whole`.
const fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        0
    } else {
        (part * 200 + whole) / (whole * 2)
    }
}

/// Group in-flight orders by compound.
///
/// Members outside compounding/QC are ignored. The result is derived fresh
/// from the members given; nothing is cached.
#[must_use]
pub fn build_batches(members: impl IntoIterator<Item = BatchMember>) -> BatchReport {
    let mut members: Vec<_> = members
        .into_iter()
        .filter(|m| m.status.in_compounding_stage())
        .collect();
    members.sort_by_key(|m| m.created_at);

    let mut batches: Vec<Batch> = Vec::new();
    let mut index: HashMap<CompoundId, usize> = HashMap::new();

    for member in &members {
        let slot = *index.entry(member.compound.id.clone()).or_insert_with(|| {
            batches.push(Batch {
                compound_id: member.compound.id.clone(),
                compound_name: member.compound.name.clone(),
                dosage_form: member.compound.dosage_form.clone(),
                strength: member.compound.strength.clone(),
                order_count: 0,
                orders: Vec::new(),
                current_step: "Compounding",
                progress: 0,
                statuses: StatusCounts::default(),
            });
            batches.len() - 1
        });

        let batch = &mut batches[slot];
        batch.order_count += 1;
        match member.status {
            OrderStatus::Compounding => batch.statuses.compounding += 1,
            _ => batch.statuses.quality_check += 1,
        }
        batch.orders.push(BatchOrder {
            id: member.order_id.clone(),
            order_number: member.order_number.clone(),
            status: member.status,
            created_at: member.created_at,
        });
    }

    for batch in &mut batches {
        batch.progress = percent(batch.statuses.quality_check, batch.order_count);
        if batch.statuses.compounding == 0 && batch.statuses.quality_check > 0 {
            batch.current_step = "Quality Check";
        }
    }

    BatchReport {
        total_batches: batches.len(),
        total_orders: members.len(),
        batches,
    }
}
