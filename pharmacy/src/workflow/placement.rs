//! Patient order placement.
//!
//! Placing an order consumes one refill of the prescription, creates the
//! order in `pending` and records the first audit entry. All three writes
//! commit together.

use super::WorkflowEnvironment;
use crate::error::{FieldErrors, WorkflowError};
use crate::store::Write;
use crate::types::{
    Money, OrderId, OrderRecord, OrderStatus, PatientId, PrescriptionRecord, PrescriptionStatus,
    ShippingAddress, StatusLogEntry,
};
use crate::validate;
use chrono::{DateTime, Utc};
use rx_dispatch_core::effect::Effect;
use rx_dispatch_core::reducer::Reducer;
use smallvec::{SmallVec, smallvec};

/// Note on the audit entry written at placement.
pub const PLACEMENT_NOTE: &str = "Order created";

/// What placement needs loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlacementState {
    /// The prescription ordered against, if it exists
    pub prescription: Option<PrescriptionRecord>,
    /// Cash price of the prescribed compound
    pub cash_price: Option<Money>,
    /// Set once the order is accepted
    pub placed: Option<OrderRecord>,
}

/// Placement actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacementAction {
    /// Place an order for `patient`.
    Place {
        /// Ordering patient
        patient: PatientId,
        /// Destination
        address: ShippingAddress,
    },
}

/// Field checks for a placement request.
///
/// # Errors
///
/// [`WorkflowError::Validation`] listing every bad address field.
pub fn validate_address(address: &ShippingAddress) -> Result<(), WorkflowError> {
    let mut errors = FieldErrors::new();
    validate::shipping_address(&mut errors, address);
    validate::finish(errors)
}

/// `ORD-` followed by the placement time in epoch millis, base 36, upper case.
#[must_use]
pub fn order_number(at: DateTime<Utc>) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    let mut millis = u64::try_from(at.timestamp_millis()).unwrap_or_default();
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(millis % 36) as usize]);
        millis /= 36;
        if millis == 0 {
            break;
        }
    }
    digits.reverse();
    format!("ORD-{}", String::from_utf8_lossy(&digits))
}

/// Reducer for order placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementReducer;

impl Reducer for PlacementReducer {
    type State = PlacementState;
    type Action = PlacementAction;
    type Environment = WorkflowEnvironment;
    type Write = Write;
    type Error = WorkflowError;

    fn reduce(
        &self,
        state: &mut PlacementState,
        action: PlacementAction,
        env: &WorkflowEnvironment,
    ) -> Result<SmallVec<[Effect<Write>; 4]>, WorkflowError> {
        let PlacementAction::Place { patient, address } = action;

        // Someone else's prescription is reported exactly like a missing one.
        let prescription = state
            .prescription
            .as_mut()
            .filter(|rx| rx.patient_id == patient)
            .ok_or_else(|| WorkflowError::bad_request("Prescription not found"))?;

        if prescription.status == PrescriptionStatus::Cancelled {
            return Err(WorkflowError::bad_request(
                "Cannot order from a cancelled prescription",
            ));
        }
        if prescription.refills_remaining() <= 0 {
            return Err(WorkflowError::bad_request(
                "No refills remaining on this prescription",
            ));
        }

        let now = env.now();
        let order = OrderRecord {
            id: OrderId::new(env.next_id()),
            order_number: order_number(now),
            patient_id: patient,
            prescription_id: prescription.id.clone(),
            status: OrderStatus::Pending,
            total_amount: state.cash_price.unwrap_or(Money::ZERO),
            created_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            tracking_number: None,
            carrier: None,
        };
        let entry = StatusLogEntry {
            id: env.next_id(),
            order_id: order.id.clone(),
            status: OrderStatus::Pending,
            note: Some(PLACEMENT_NOTE.to_string()),
            created_by: None,
            created_at: now,
        };

        prescription.refills_used += 1;
        state.placed = Some(order.clone());

        Ok(smallvec![
            Effect::Persist(Write::ConsumeRefill {
                id: prescription.id.clone(),
            }),
            Effect::Persist(Write::InsertOrder { order, address }),
            Effect::Persist(Write::AppendOrderLog(entry)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompoundId, PrescriptionId, ProviderId};
    use rx_dispatch_testing::reducer_test::assertions::assert_write_count;
    use rx_dispatch_testing::{ReducerTest, SequentialIds, test_clock, test_epoch};
    use std::sync::Arc;

    fn env() -> WorkflowEnvironment {
        WorkflowEnvironment::new(Arc::new(test_clock()), Arc::new(SequentialIds::new("id")))
    }

    fn prescription(status: PrescriptionStatus, refills: i32, used: i32) -> PrescriptionRecord {
        PrescriptionRecord {
            id: PrescriptionId::new("rx-1"),
            patient_id: PatientId::new("pat-1"),
            provider_id: ProviderId::new("prov-1"),
            compound_id: CompoundId::new("cmp-1"),
            quantity: 30,
            directions: "Take one capsule daily".into(),
            status,
            refills,
            refills_used: used,
            prescribed_at: test_epoch(),
            verified_at: None,
            verified_by: None,
        }
    }

    fn state(rx: PrescriptionRecord) -> PlacementState {
        PlacementState {
            prescription: Some(rx),
            cash_price: Some(Money::from_cents(8_900)),
            placed: None,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            street1: "1 Main St".into(),
            street2: None,
            city: "Denver".into(),
            state: "CO".into(),
            zip_code: "80202".into(),
            country: "US".into(),
        }
    }

    fn place(patient: &str) -> PlacementAction {
        PlacementAction::Place {
            patient: PatientId::new(patient),
            address: address(),
        }
    }

    #[test]
    fn order_number_is_base36_millis() {
        // 1_735_689_600_000 ms
        assert_eq!(order_number(test_epoch()), "ORD-M5D4RUO0");
        assert_eq!(order_number(DateTime::<Utc>::UNIX_EPOCH), "ORD-0");
    }

    #[test]
    fn accepted_placement_consumes_refill_and_logs() {
        ReducerTest::new(PlacementReducer)
            .with_env(env())
            .given_state(state(prescription(PrescriptionStatus::Verified, 2, 1)))
            .when_action(place("pat-1"))
            .then_state(|state| {
                let order = state.placed.as_ref();
                assert_eq!(order.map(|o| o.status), Some(OrderStatus::Pending));
                assert_eq!(order.map(|o| o.total_amount), Some(Money::from_cents(8_900)));
                assert_eq!(state.prescription.as_ref().map(|rx| rx.refills_used), Some(2));
            })
            .then_effects(|effects| {
                assert_write_count(effects, 3);
                let writes = Effect::flatten(effects.iter().cloned());
                assert!(matches!(writes[0], Write::ConsumeRefill { .. }));
                assert!(matches!(
                    &writes[2],
                    Write::AppendOrderLog(entry)
                        if entry.note.as_deref() == Some(PLACEMENT_NOTE) && entry.created_by.is_none()
                ));
            })
            .run();
    }

    #[test]
    fn missing_price_totals_zero() {
        let mut given = state(prescription(PrescriptionStatus::Pending, 1, 0));
        given.cash_price = None;
        ReducerTest::new(PlacementReducer)
            .with_env(env())
            .given_state(given)
            .when_action(place("pat-1"))
            .then_state(|state| {
                assert_eq!(state.placed.as_ref().map(|o| o.total_amount), Some(Money::ZERO));
            })
            .run();
    }

    #[test]
    fn refusals() {
        let cases = [
            (state(prescription(PrescriptionStatus::Pending, 1, 0)), "pat-2", "Prescription not found"),
            (PlacementState::default(), "pat-1", "Prescription not found"),
            (
                state(prescription(PrescriptionStatus::Cancelled, 3, 0)),
                "pat-1",
                "Cannot order from a cancelled prescription",
            ),
            (
                state(prescription(PrescriptionStatus::Verified, 1, 1)),
                "pat-1",
                "No refills remaining on this prescription",
            ),
        ];

        for (given, patient, message) in cases {
            let before = given.clone();
            ReducerTest::new(PlacementReducer)
                .with_env(env())
                .given_state(given)
                .when_action(place(patient))
                .then_error(move |err| {
                    assert_eq!(err.code(), "BAD_REQUEST");
                    assert_eq!(err.to_string(), message);
                })
                .then_state(move |state| assert_eq!(state, &before))
                .run();
        }
    }

    #[test]
    fn address_validation_reports_fields() {
        let mut bad = address();
        bad.zip_code = "802".into();
        let Err(WorkflowError::Validation(errors)) = validate_address(&bad) else {
            unreachable!("zip should fail");
        };
        assert!(errors.contains_key("shippingAddress.zipCode"));
        assert!(validate_address(&address()).is_ok());
    }
}
