//! Provider prescription creation.
//!
//! A provider may only prescribe into a state they hold an active license
//! for, and only compounds the pharmacy currently offers.

use super::WorkflowEnvironment;
use crate::error::{FieldErrors, WorkflowError};
use crate::store::Write;
use crate::types::{
    Compound, Patient, PrescriptionId, PrescriptionRecord, PrescriptionStatus, ProviderId,
};
use crate::validate;
use rx_dispatch_core::effect::Effect;
use rx_dispatch_core::reducer::Reducer;
use smallvec::{SmallVec, smallvec};

/// Upper bound on authorized refills.
pub const MAX_REFILLS: i32 = 12;

/// Longest accepted directions text, in characters.
pub const MAX_DIRECTIONS: usize = 500;

/// Provider-submitted prescription fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrescriptionDraft {
    /// Units per dispense
    pub quantity: i32,
    /// Authorized refills
    pub refills: i32,
    /// Directions for use
    pub directions: String,
}

impl PrescriptionDraft {
    /// Field checks, run before anything is loaded.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::Validation`] listing every bad field.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut errors = FieldErrors::new();
        validate::positive(&mut errors, "quantity", self.quantity);
        validate::range(&mut errors, "refills", self.refills, 0, MAX_REFILLS);
        validate::length(&mut errors, "directions", &self.directions, 1, MAX_DIRECTIONS);
        validate::finish(errors)
    }
}

/// What prescribing needs loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrescribingState {
    /// The patient prescribed for
    pub patient: Patient,
    /// License check result for the patient's state; `None` when the patient
    /// has no state on file and no check applies
    pub licensed: Option<bool>,
    /// The compound prescribed, if it exists
    pub compound: Option<Compound>,
    /// Set once the prescription is accepted
    pub created: Option<PrescriptionRecord>,
}

/// Prescribing actions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrescribingAction {
    /// Write a new prescription.
    Prescribe {
        /// Prescribing provider
        provider: ProviderId,
        /// Fields
        draft: PrescriptionDraft,
    },
}

/// Reducer for new prescriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrescribingReducer;

impl Reducer for PrescribingReducer {
    type State = PrescribingState;
    type Action = PrescribingAction;
    type Environment = WorkflowEnvironment;
    type Write = Write;
    type Error = WorkflowError;

    fn reduce(
        &self,
        state: &mut PrescribingState,
        action: PrescribingAction,
        env: &WorkflowEnvironment,
    ) -> Result<SmallVec<[Effect<Write>; 4]>, WorkflowError> {
        let PrescribingAction::Prescribe { provider, draft } = action;

        if let (Some(false), Some(region)) = (state.licensed, state.patient.state.as_deref()) {
            return Err(WorkflowError::forbidden(format!(
                "You do not have an active license to prescribe in {region}"
            )));
        }

        let compound = state
            .compound
            .as_ref()
            .ok_or(WorkflowError::NotFound("Compound"))?;
        if !compound.is_active {
            return Err(WorkflowError::forbidden(
                "This compound is not currently available for prescribing",
            ));
        }

        let record = PrescriptionRecord {
            id: PrescriptionId::new(env.next_id()),
            patient_id: state.patient.id.clone(),
            provider_id: provider,
            compound_id: compound.id.clone(),
            quantity: draft.quantity,
            directions: draft.directions,
            status: PrescriptionStatus::Pending,
            refills: draft.refills,
            refills_used: 0,
            prescribed_at: env.now(),
            verified_at: None,
            verified_by: None,
        };
        state.created = Some(record.clone());

        Ok(smallvec![Effect::Persist(Write::InsertPrescription(record))])
    }
}
