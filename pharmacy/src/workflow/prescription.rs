//! Prescription verification and amendment.
//!
//! Verification is one-shot: a prescription leaves `pending` exactly once,
//! either to `verified` (pharmacists only) or to `cancelled` (rejection, which
//! any pharmacy staff member may record with a reason). Providers may amend
//! their own prescriptions until the pharmacy starts working on them.

use super::WorkflowEnvironment;
use crate::error::{FieldErrors, WorkflowError};
use crate::identity::Actor;
use crate::role::Role;
use crate::store::{PrescriptionPatch, Write};
use crate::types::{PrescriptionRecord, PrescriptionStatus, ProviderId};
use crate::validate;
use rx_dispatch_core::effect::Effect;
use rx_dispatch_core::machine::{Edge, GuardedMachine, MachineError};
use rx_dispatch_core::reducer::Reducer;
use smallvec::{SmallVec, smallvec};

use PrescriptionStatus::{Cancelled, Pending, Verified};

/// Verification table: `pending → verified` is reserved for pharmacists.
pub static VERIFICATION_MACHINE: GuardedMachine<PrescriptionStatus, Role> = GuardedMachine::new(
    "prescription_verification",
    &[
        Edge::guarded(Pending, Verified, &[Role::Pharmacist]),
        Edge::open(Pending, Cancelled),
    ],
);

/// Statuses in which the prescribing provider may still amend.
pub const AMENDABLE: [PrescriptionStatus; 2] = [Pending, Verified];

/// Prescription actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrescriptionAction {
    /// Approve for dispensing.
    Verify {
        /// Reviewer
        actor: Actor,
    },
    /// Refuse; the prescription is cancelled.
    Reject {
        /// Reviewer
        actor: Actor,
        /// Required explanation, returned to the caller only
        reason: Option<String>,
    },
    /// Provider edits quantity or directions.
    Amend {
        /// Provider making the change
        provider: ProviderId,
        /// New quantity
        quantity: Option<i32>,
        /// New directions
        directions: Option<String>,
    },
}

/// Reducer for prescription review and amendment.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrescriptionReducer;

fn require_pending(prescription: &PrescriptionRecord) -> Result<(), WorkflowError> {
    if prescription.status == Pending {
        Ok(())
    } else {
        Err(WorkflowError::invalid_state(
            "Only pending prescriptions can be verified or rejected",
        ))
    }
}

fn review_error(err: MachineError<PrescriptionStatus>) -> WorkflowError {
    match err {
        MachineError::Forbidden { to: Verified, .. } => {
            WorkflowError::forbidden("Only pharmacists can verify prescriptions")
        },
        MachineError::Forbidden { .. } => WorkflowError::forbidden(err.to_string()),
        MachineError::InvalidTransition { .. } => WorkflowError::invalid_state(err.to_string()),
    }
}

impl Reducer for PrescriptionReducer {
    type State = PrescriptionRecord;
    type Action = PrescriptionAction;
    type Environment = WorkflowEnvironment;
    type Write = Write;
    type Error = WorkflowError;

    fn reduce(
        &self,
        prescription: &mut PrescriptionRecord,
        action: PrescriptionAction,
        env: &WorkflowEnvironment,
    ) -> Result<SmallVec<[Effect<Write>; 4]>, WorkflowError> {
        let patch = match action {
            PrescriptionAction::Verify { actor } => {
                require_pending(prescription)?;
                VERIFICATION_MACHINE
                    .check(prescription.status, Verified, actor.role)
                    .map_err(review_error)?;
                PrescriptionPatch {
                    status: Some(Verified),
                    verified_at: Some(env.now()),
                    verified_by: Some(actor.user_id),
                    ..PrescriptionPatch::default()
                }
            },
            PrescriptionAction::Reject { actor, reason } => {
                require_pending(prescription)?;
                if reason.as_deref().is_none_or(str::is_empty) {
                    return Err(WorkflowError::bad_request("Rejection reason is required"));
                }
                VERIFICATION_MACHINE
                    .check(prescription.status, Cancelled, actor.role)
                    .map_err(review_error)?;
                PrescriptionPatch {
                    status: Some(Cancelled),
                    ..PrescriptionPatch::default()
                }
            },
            PrescriptionAction::Amend {
                provider,
                quantity,
                directions,
            } => {
                if provider != prescription.provider_id {
                    return Err(WorkflowError::forbidden(
                        "You do not have access to this prescription",
                    ));
                }
                if !AMENDABLE.contains(&prescription.status) {
                    return Err(WorkflowError::forbidden(
                        "Cannot modify a prescription that is already being processed",
                    ));
                }
                let mut errors = FieldErrors::new();
                if let Some(quantity) = quantity {
                    validate::positive(&mut errors, "quantity", quantity);
                }
                if let Some(directions) = &directions {
                    validate::length(&mut errors, "directions", directions, 1, 500);
                }
                validate::finish(errors)?;
                PrescriptionPatch {
                    quantity,
                    directions,
                    ..PrescriptionPatch::default()
                }
            },
        };

        if patch.is_empty() {
            return Ok(SmallVec::new());
        }

        patch.apply_to(prescription);
        Ok(smallvec![Effect::Persist(Write::UpdatePrescription {
            id: prescription.id.clone(),
            patch,
        })])
    }
}
