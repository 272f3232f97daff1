//! Order lifecycle.
//!
//! The transition table is the single source of truth for which status
//! changes staff may make. Shipping milestones are stamped here, and every
//! accepted status change carries exactly one audit entry in the same batch
//! of writes.

use super::WorkflowEnvironment;
use crate::error::WorkflowError;
use crate::identity::Actor;
use crate::role::Role;
use crate::store::{OrderPatch, Write};
use crate::types::{OrderRecord, OrderStatus, StatusLogEntry};
use rx_dispatch_core::effect::Effect;
use rx_dispatch_core::machine::{Edge, GuardedMachine};
use rx_dispatch_core::reducer::Reducer;
use smallvec::SmallVec;

use OrderStatus::{
    Cancelled, Compounding, Delivered, Packaging, Pending, Processing, QualityCheck, Shipped,
};

/// Order status transition table.
///
/// `quality_check → compounding` (failed QC) and `packaging → quality_check`
/// (packaging defect) are the only backward edges. `delivered` and
/// `cancelled` are terminal.
pub static ORDER_MACHINE: GuardedMachine<OrderStatus, Role> = GuardedMachine::new(
    "order",
    &[
        Edge::open(Pending, Processing),
        Edge::open(Pending, Cancelled),
        Edge::open(Processing, Compounding),
        Edge::open(Processing, Cancelled),
        Edge::open(Compounding, QualityCheck),
        Edge::open(Compounding, Cancelled),
        Edge::open(QualityCheck, Packaging),
        Edge::open(QualityCheck, Compounding),
        Edge::open(Packaging, Shipped),
        Edge::open(Packaging, QualityCheck),
        Edge::open(Shipped, Delivered),
    ],
);

/// Staff-submitted changes to an order. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    /// Requested status
    pub status: Option<OrderStatus>,
    /// Note for the audit entry
    pub note: Option<String>,
    /// Tracking number, written regardless of status
    pub tracking_number: Option<String>,
    /// Carrier, written regardless of status
    pub carrier: Option<String>,
}

impl OrderUpdate {
    /// A pure status change.
    #[must_use]
    pub fn transition(to: OrderStatus) -> Self {
        Self {
            status: Some(to),
            ..Self::default()
        }
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Order actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderAction {
    /// Apply an [`OrderUpdate`] on behalf of `actor`.
    Update {
        /// Pharmacy staff member
        actor: Actor,
        /// Requested changes
        update: OrderUpdate,
    },
}

/// Reducer for staff order updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderReducer;

impl Reducer for OrderReducer {
    type State = OrderRecord;
    type Action = OrderAction;
    type Environment = WorkflowEnvironment;
    type Write = Write;
    type Error = WorkflowError;

    fn reduce(
        &self,
        order: &mut OrderRecord,
        action: OrderAction,
        env: &WorkflowEnvironment,
    ) -> Result<SmallVec<[Effect<Write>; 4]>, WorkflowError> {
        let OrderAction::Update { actor, update } = action;

        if let Some(to) = update.status {
            ORDER_MACHINE.check(order.status, to, actor.role)?;
        }

        let now = env.now();
        let mut patch = OrderPatch {
            status: update.status,
            tracking_number: update.tracking_number.filter(|t| !t.is_empty()),
            carrier: update.carrier.filter(|c| !c.is_empty()),
            ..OrderPatch::default()
        };
        match update.status {
            Some(Shipped) => patch.shipped_at = Some(now),
            Some(Delivered) => patch.delivered_at = Some(now),
            _ => {},
        }

        let mut effects = SmallVec::new();
        if patch.is_empty() {
            return Ok(effects);
        }

        patch.apply_to(order);
        effects.push(Effect::Persist(Write::UpdateOrder {
            id: order.id.clone(),
            patch,
        }));

        if let Some(to) = update.status {
            effects.push(Effect::Persist(Write::AppendOrderLog(StatusLogEntry {
                id: env.next_id(),
                order_id: order.id.clone(),
                status: to,
                note: update.note,
                created_by: Some(actor.user_id),
                created_at: now,
            })));
        }

        Ok(effects)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::types::{Money, OrderId, PatientId, PrescriptionId};
    use rx_dispatch_testing::{ReducerTest, SequentialIds, test_clock, test_epoch};
    use std::sync::Arc;

    fn env() -> WorkflowEnvironment {
        WorkflowEnvironment::new(Arc::new(test_clock()), Arc::new(SequentialIds::new("log")))
    }

    fn order_in(status: OrderStatus) -> OrderRecord {
        OrderRecord {
            id: OrderId::new("ord-1"),
            order_number: "ORD-TEST".into(),
            patient_id: PatientId::new("pat-1"),
            prescription_id: PrescriptionId::new("rx-1"),
            status,
            total_amount: Money::from_cents(4_500),
            created_at: test_epoch(),
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            tracking_number: None,
            carrier: None,
        }
    }

    fn staff() -> Actor {
        Actor::new("staff-1", Role::Technician)
    }

    fn update(update: OrderUpdate) -> OrderAction {
        OrderAction::Update {
            actor: staff(),
            update,
        }
    }

    #[test]
    fn table_has_expected_shape() {
        assert_eq!(ORDER_MACHINE.edges().len(), 11);
        assert!(ORDER_MACHINE.is_terminal(Delivered));
        assert!(ORDER_MACHINE.is_terminal(Cancelled));
        let from_qc: Vec<_> = ORDER_MACHINE.successors(QualityCheck).collect();
        assert_eq!(from_qc, vec![Packaging, Compounding]);
    }

    #[test]
    fn shipping_stamps_shipped_at_and_logs() {
        ReducerTest::new(OrderReducer)
            .with_env(env())
            .given_state(order_in(Packaging))
            .when_action(update(OrderUpdate::transition(Shipped).with_note("UPS pickup")))
            .then_state(|order| {
                assert_eq!(order.status, Shipped);
                assert_eq!(order.shipped_at, Some(test_epoch()));
                assert_eq!(order.delivered_at, None);
            })
            .then_effects(|effects| {
                let writes = Effect::flatten(effects.iter().cloned());
                assert_eq!(writes.len(), 2);
                let Write::AppendOrderLog(entry) = &writes[1] else {
                    panic!("expected audit entry, got {:?}", writes[1]);
                };
                assert_eq!(entry.status, Shipped);
                assert_eq!(entry.note.as_deref(), Some("UPS pickup"));
                assert_eq!(entry.created_by.as_ref().map(|u| u.as_str()), Some("staff-1"));
            })
            .run();
    }

    #[test]
    fn delivery_stamps_delivered_at() {
        ReducerTest::new(OrderReducer)
            .with_env(env())
            .given_state(order_in(Shipped))
            .when_action(update(OrderUpdate::transition(Delivered)))
            .then_state(|order| assert_eq!(order.delivered_at, Some(test_epoch())))
            .run();
    }

    #[test]
    fn skipping_ahead_is_refused_without_writes() {
        ReducerTest::new(OrderReducer)
            .with_env(env())
            .given_state(order_in(Pending))
            .when_action(update(OrderUpdate::transition(Shipped)))
            .then_error(|err| {
                assert_eq!(err.code(), "INVALID_TRANSITION");
                assert_eq!(err.to_string(), "Cannot transition from pending to shipped");
            })
            .then_state(|order| assert_eq!(order, &order_in(Pending)))
            .run();
    }

    #[test]
    fn tracking_without_status_writes_no_audit_entry() {
        ReducerTest::new(OrderReducer)
            .with_env(env())
            .given_state(order_in(Delivered))
            .when_action(update(OrderUpdate {
                tracking_number: Some("1Z999".into()),
                carrier: Some("UPS".into()),
                ..OrderUpdate::default()
            }))
            .then_state(|order| {
                assert_eq!(order.status, Delivered);
                assert_eq!(order.tracking_number.as_deref(), Some("1Z999"));
            })
            .then_effects(|effects| {
                let writes = Effect::flatten(effects.iter().cloned());
                assert_eq!(writes.len(), 1);
                assert!(matches!(writes[0], Write::UpdateOrder { .. }));
            })
            .run();
    }

    #[test]
    fn empty_update_is_a_no_op() {
        ReducerTest::new(OrderReducer)
            .with_env(env())
            .given_state(order_in(Processing))
            .when_action(update(OrderUpdate {
                tracking_number: Some(String::new()),
                ..OrderUpdate::default()
            }))
            .then_effects(|effects| assert!(effects.is_empty()))
            .run();
    }
}
