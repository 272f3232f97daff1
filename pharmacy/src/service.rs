//! Imperative shell for the pharmacy workflows.
//!
//! Every write operation follows the same shape:
//!
//! 1. check the caller and the input (no I/O beyond identity)
//! 2. load the records the reducer needs
//! 3. run the reducer, which either refuses or returns a batch of writes
//! 4. commit the batch atomically
//! 5. re-read the view the caller gets back
//!
//! A refusal at any step returns before step 4, so nothing is written.

use crate::error::WorkflowError;
use crate::identity::Actor;
use crate::metrics;
use crate::role::Role;
use crate::store::{PharmacyStore, Write};
use crate::types::{
    CompoundId, OrderDetail, OrderId, OrderQuery, OrderStatus, OrderView, Page, PatientId,
    PrescriptionId, PrescriptionQuery, PrescriptionView, ProviderId, ShippingAddress,
};
use crate::workflow::WorkflowEnvironment;
use crate::workflow::compounding::{
    BatchReport, CompoundingAction, CompoundingReducer, CompoundingStage, build_batches,
};
use crate::workflow::order::{OrderAction, OrderReducer, OrderUpdate};
use crate::workflow::placement::{self, PlacementAction, PlacementReducer, PlacementState};
use crate::workflow::prescribing::{
    PrescribingAction, PrescribingReducer, PrescribingState, PrescriptionDraft,
};
use crate::workflow::prescription::{PrescriptionAction, PrescriptionReducer};
use rx_dispatch_core::effect::Effect;
use rx_dispatch_core::reducer::Reducer;
use std::sync::Arc;

/// Message when a pharmacy route is called by someone who is not staff.
pub const NOT_STAFF: &str = "Pharmacy staff profile not found";
/// Message when a patient route is called without a patient profile.
pub const NOT_PATIENT: &str = "Patient profile not found";
/// Message when a provider route is called without a provider profile.
pub const NOT_PROVIDER: &str = "Provider profile not found";

fn require_staff(actor: &Actor) -> Result<(), WorkflowError> {
    if actor.role.is_pharmacy_staff() {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized(NOT_STAFF.into()))
    }
}

fn require_patient<'a>(actor: &'a Actor, action: &str) -> Result<&'a PatientId, WorkflowError> {
    actor
        .patient_id
        .as_ref()
        .filter(|_| actor.role == Role::Patient && actor.role.can(action, "own_orders"))
        .ok_or_else(|| WorkflowError::Unauthorized(NOT_PATIENT.into()))
}

fn require_provider<'a>(actor: &'a Actor, action: &str) -> Result<&'a ProviderId, WorkflowError> {
    actor
        .provider_id
        .as_ref()
        .filter(|_| actor.role.can(action, "prescriptions"))
        .ok_or_else(|| WorkflowError::Unauthorized(NOT_PROVIDER.into()))
}

/// Count a refusal and pass it through.
fn refused(err: WorkflowError) -> WorkflowError {
    metrics::record_rejection(err.code());
    match &err {
        WorkflowError::Store(store) => tracing::error!(error = %store, "workflow storage failure"),
        other => tracing::info!(code = other.code(), reason = %other, "workflow refused"),
    }
    err
}

/// Workflow entry points shared by every surface.
#[derive(Clone)]
pub struct PharmacyService {
    store: Arc<dyn PharmacyStore>,
    env: WorkflowEnvironment,
}

impl std::fmt::Debug for PharmacyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PharmacyService")
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl PharmacyService {
    /// Build over a store and an environment.
    #[must_use]
    pub fn new(store: Arc<dyn PharmacyStore>, env: WorkflowEnvironment) -> Self {
        Self { store, env }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn PharmacyStore> {
        &self.store
    }

    /// Reduce and commit. Returns the writes that were committed.
    async fn execute<R>(
        &self,
        reducer: &R,
        state: &mut R::State,
        action: R::Action,
    ) -> Result<Vec<Write>, WorkflowError>
    where
        R: Reducer<Environment = WorkflowEnvironment, Write = Write, Error = WorkflowError>,
    {
        let effects = reducer.reduce(state, action, &self.env)?;
        let writes = Effect::flatten(effects);
        if !writes.is_empty() {
            tracing::debug!(
                writes = writes.len(),
                first = writes.first().map_or("", Write::kind),
                "committing batch"
            );
            self.store.commit(writes.clone()).await?;
        }
        Ok(writes)
    }

    fn record_transitions(writes: &[Write]) {
        for write in writes {
            if let Write::AppendOrderLog(entry) = write {
                metrics::record_transition(entry.status);
            }
        }
    }

    async fn reread_order(&self, id: OrderId) -> Result<OrderView, WorkflowError> {
        self.store
            .order_view(id)
            .await?
            .ok_or(WorkflowError::NotFound("Order"))
    }

    async fn reread_prescription(&self, id: PrescriptionId) -> Result<PrescriptionView, WorkflowError> {
        self.store
            .prescription_view(id)
            .await?
            .ok_or(WorkflowError::NotFound("Prescription"))
    }

    // ─── Orders ─────────────────────────────────────────────────────────────

    /// Apply a staff update (status change, shipment fields, or both).
    ///
    /// An update that changes nothing succeeds without writing.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` for non-staff, `NOT_FOUND` for an unknown order,
    /// `INVALID_TRANSITION` for a status change outside the table.
    #[tracing::instrument(skip_all, fields(order_id = %id, user = %actor.user_id))]
    pub async fn update_order(
        &self,
        actor: &Actor,
        id: OrderId,
        update: OrderUpdate,
    ) -> Result<OrderView, WorkflowError> {
        self.try_update_order(actor, id, update).await.map_err(refused)
    }

    async fn try_update_order(
        &self,
        actor: &Actor,
        id: OrderId,
        update: OrderUpdate,
    ) -> Result<OrderView, WorkflowError> {
        require_staff(actor)?;
        let mut order = self
            .store
            .find_order(id.clone())
            .await?
            .ok_or(WorkflowError::NotFound("Order"))?;
        let from = order.status;

        let action = OrderAction::Update {
            actor: actor.clone(),
            update,
        };
        let writes = self.execute(&OrderReducer, &mut order, action).await?;
        if from != order.status {
            tracing::info!(from = %from, to = %order.status, "order status changed");
        }
        Self::record_transitions(&writes);

        self.reread_order(id).await
    }

    /// Move an order to `to`, attaching `note` to the audit entry.
    ///
    /// # Errors
    ///
    /// As [`update_order`](Self::update_order).
    pub async fn apply_transition(
        &self,
        actor: &Actor,
        id: OrderId,
        to: OrderStatus,
        note: Option<String>,
    ) -> Result<OrderView, WorkflowError> {
        let update = OrderUpdate {
            note,
            ..OrderUpdate::transition(to)
        };
        self.update_order(actor, id, update).await
    }

    /// Staff order list.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` for non-staff.
    pub async fn list_orders(
        &self,
        actor: &Actor,
        query: OrderQuery,
    ) -> Result<Page<OrderView>, WorkflowError> {
        require_staff(actor)?;
        Ok(self.store.list_orders(query).await?)
    }

    /// Staff order detail.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` for non-staff, `NOT_FOUND` for an unknown order.
    pub async fn order_detail(&self, actor: &Actor, id: OrderId) -> Result<OrderDetail, WorkflowError> {
        require_staff(actor)?;
        self.store
            .order_detail(id)
            .await?
            .ok_or(WorkflowError::NotFound("Order"))
    }

    // ─── Prescription review ────────────────────────────────────────────────

    /// Verify a pending prescription.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND`, `INVALID_STATE` when not pending, `FORBIDDEN` unless the
    /// actor is a pharmacist.
    #[tracing::instrument(skip_all, fields(prescription_id = %id, user = %actor.user_id))]
    pub async fn verify(&self, actor: &Actor, id: PrescriptionId) -> Result<PrescriptionView, WorkflowError> {
        let result = self
            .review(actor, id, PrescriptionAction::Verify { actor: actor.clone() })
            .await;
        if result.is_ok() {
            metrics::record_verified();
            tracing::info!("prescription verified");
        }
        result
    }

    /// Reject a pending prescription. The reason is echoed back and logged,
    /// not stored.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND`, `INVALID_STATE` when not pending, `BAD_REQUEST` without a
    /// reason.
    #[tracing::instrument(skip_all, fields(prescription_id = %id, user = %actor.user_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        id: PrescriptionId,
        reason: Option<String>,
    ) -> Result<PrescriptionView, WorkflowError> {
        let action = PrescriptionAction::Reject {
            actor: actor.clone(),
            reason: reason.clone(),
        };
        let mut view = self.review(actor, id, action).await?;
        metrics::record_rejected();
        tracing::info!(reason = reason.as_deref().unwrap_or_default(), "prescription rejected");
        view.rejection_reason = reason;
        Ok(view)
    }

    async fn review(
        &self,
        actor: &Actor,
        id: PrescriptionId,
        action: PrescriptionAction,
    ) -> Result<PrescriptionView, WorkflowError> {
        async {
            require_staff(actor)?;
            let mut prescription = self
                .store
                .find_prescription(id.clone())
                .await?
                .ok_or(WorkflowError::NotFound("Prescription"))?;
            self.execute(&PrescriptionReducer, &mut prescription, action).await?;
            self.reread_prescription(id).await
        }
        .await
        .map_err(refused)
    }

    /// Staff prescription queue.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` for non-staff.
    pub async fn list_prescriptions(
        &self,
        actor: &Actor,
        query: PrescriptionQuery,
    ) -> Result<Page<PrescriptionView>, WorkflowError> {
        require_staff(actor)?;
        Ok(self.store.list_prescriptions(query).await?)
    }

    /// Staff prescription detail.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` for non-staff, `NOT_FOUND` for an unknown prescription.
    pub async fn prescription_detail(
        &self,
        actor: &Actor,
        id: PrescriptionId,
    ) -> Result<PrescriptionView, WorkflowError> {
        require_staff(actor)?;
        self.reread_prescription(id).await
    }

    // ─── Compounding lab ────────────────────────────────────────────────────

    /// Move an order between lab stages. `requested` is the raw status name.
    ///
    /// # Errors
    ///
    /// `BAD_REQUEST` ("Invalid status") for anything outside the lab stages,
    /// then `NOT_FOUND`, `INVALID_STATE`, `INVALID_TRANSITION`.
    #[tracing::instrument(skip_all, fields(order_id = %id, user = %actor.user_id))]
    pub async fn advance_compounding(
        &self,
        actor: &Actor,
        id: OrderId,
        requested: &str,
        note: Option<String>,
    ) -> Result<OrderView, WorkflowError> {
        async {
            require_staff(actor)?;
            let to = CompoundingStage::parse(requested)
                .ok_or_else(|| WorkflowError::BadRequest("Invalid status".into()))?;
            let mut order = self
                .store
                .find_order(id.clone())
                .await?
                .ok_or(WorkflowError::NotFound("Order"))?;

            let action = CompoundingAction::Advance {
                actor: actor.clone(),
                to,
                note,
            };
            let writes = self.execute(&CompoundingReducer, &mut order, action).await?;
            tracing::info!(to = %to, "lab stage changed");
            Self::record_transitions(&writes);
            self.reread_order(id).await
        }
        .await
        .map_err(refused)
    }

    /// Current lab batches, derived fresh from the store.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` for non-staff.
    pub async fn batches(&self, actor: &Actor) -> Result<BatchReport, WorkflowError> {
        require_staff(actor)?;
        let members = self.store.compounding_members().await?;
        Ok(build_batches(members))
    }

    /// Order detail for the lab; only orders in compounding or QC.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED`, `NOT_FOUND`, or `INVALID_STATE` outside the lab.
    pub async fn compounding_detail(
        &self,
        actor: &Actor,
        id: OrderId,
    ) -> Result<OrderDetail, WorkflowError> {
        let detail = self.order_detail(actor, id).await?;
        if detail.order.status.in_compounding_stage() {
            Ok(detail)
        } else {
            Err(WorkflowError::InvalidState("Order is not in compounding stage".into()))
        }
    }

    // ─── Patients ───────────────────────────────────────────────────────────

    /// Place an order against one of the patient's prescriptions.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` without a patient profile, `VALIDATION_ERROR` for a bad
    /// address, `BAD_REQUEST` for an unusable prescription.
    #[tracing::instrument(skip_all, fields(prescription_id = %prescription_id, user = %actor.user_id))]
    pub async fn place_order(
        &self,
        actor: &Actor,
        prescription_id: PrescriptionId,
        address: ShippingAddress,
    ) -> Result<OrderDetail, WorkflowError> {
        async {
            let patient = require_patient(actor, "create")?.clone();
            placement::validate_address(&address)?;

            let prescription = self.store.find_prescription(prescription_id).await?;
            let cash_price = match &prescription {
                Some(rx) => self
                    .store
                    .find_compound(rx.compound_id.clone())
                    .await?
                    .and_then(|c| c.cash_price),
                None => None,
            };
            let mut state = PlacementState {
                prescription,
                cash_price,
                placed: None,
            };

            let action = PlacementAction::Place { patient, address };
            let writes = self.execute(&PlacementReducer, &mut state, action).await?;
            Self::record_transitions(&writes);

            let order = state.placed.ok_or(WorkflowError::NotFound("Order"))?;
            metrics::record_order_placed();
            tracing::info!(order_id = %order.id, order_number = %order.order_number, "order placed");
            self.store
                .order_detail(order.id)
                .await?
                .ok_or(WorkflowError::NotFound("Order"))
        }
        .await
        .map_err(refused)
    }

    /// The patient's own orders.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` without a patient profile.
    pub async fn patient_orders(
        &self,
        actor: &Actor,
        mut query: OrderQuery,
    ) -> Result<Page<OrderView>, WorkflowError> {
        query.patient = Some(require_patient(actor, "read")?.clone());
        Ok(self.store.list_orders(query).await?)
    }

    /// One of the patient's own orders; anyone else's is reported missing.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` without a patient profile, `NOT_FOUND` otherwise.
    pub async fn patient_order(&self, actor: &Actor, id: OrderId) -> Result<OrderDetail, WorkflowError> {
        let patient = require_patient(actor, "read")?;
        self.store
            .order_detail(id)
            .await?
            .filter(|detail| detail.order.patient.id == patient.as_str())
            .ok_or(WorkflowError::NotFound("Order"))
    }

    // ─── Providers ──────────────────────────────────────────────────────────

    /// Write a new prescription.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` without a provider profile, `VALIDATION_ERROR`,
    /// `NOT_FOUND` for an unknown patient or compound, `FORBIDDEN` when
    /// unlicensed in the patient's state or the compound is inactive.
    #[tracing::instrument(skip_all, fields(patient_id = %patient_id, compound_id = %compound_id, user = %actor.user_id))]
    pub async fn create_prescription(
        &self,
        actor: &Actor,
        patient_id: PatientId,
        compound_id: CompoundId,
        draft: PrescriptionDraft,
    ) -> Result<PrescriptionView, WorkflowError> {
        async {
            let provider = require_provider(actor, "create")?.clone();
            draft.validate()?;

            let patient = self
                .store
                .find_patient(patient_id)
                .await?
                .ok_or(WorkflowError::NotFound("Patient"))?;
            let licensed = match &patient.state {
                Some(state) => Some(
                    self.store
                        .provider_licensed_in(provider.clone(), state.clone(), self.env.now())
                        .await?,
                ),
                None => None,
            };
            let compound = self.store.find_compound(compound_id).await?;

            let mut state = PrescribingState {
                patient,
                licensed,
                compound,
                created: None,
            };
            let action = PrescribingAction::Prescribe { provider, draft };
            self.execute(&PrescribingReducer, &mut state, action).await?;

            let created = state.created.ok_or(WorkflowError::NotFound("Prescription"))?;
            metrics::record_prescription_created();
            tracing::info!(prescription_id = %created.id, "prescription created");
            self.reread_prescription(created.id).await
        }
        .await
        .map_err(refused)
    }

    /// Amend quantity or directions before the pharmacy starts work.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED`, `NOT_FOUND`, `FORBIDDEN` for another provider's
    /// prescription or one already being processed, `VALIDATION_ERROR`.
    #[tracing::instrument(skip_all, fields(prescription_id = %id, user = %actor.user_id))]
    pub async fn amend_prescription(
        &self,
        actor: &Actor,
        id: PrescriptionId,
        quantity: Option<i32>,
        directions: Option<String>,
    ) -> Result<PrescriptionView, WorkflowError> {
        async {
            let provider = require_provider(actor, "update")?.clone();
            let mut prescription = self
                .store
                .find_prescription(id.clone())
                .await?
                .ok_or(WorkflowError::NotFound("Prescription"))?;
            let action = PrescriptionAction::Amend {
                provider,
                quantity,
                directions,
            };
            self.execute(&PrescriptionReducer, &mut prescription, action).await?;
            self.reread_prescription(id).await
        }
        .await
        .map_err(refused)
    }

    /// The provider's own prescriptions.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED` without a provider profile.
    pub async fn provider_prescriptions(
        &self,
        actor: &Actor,
        mut query: PrescriptionQuery,
    ) -> Result<Page<PrescriptionView>, WorkflowError> {
        query.provider = Some(require_provider(actor, "read")?.clone());
        Ok(self.store.list_prescriptions(query).await?)
    }

    /// One of the provider's own prescriptions.
    ///
    /// # Errors
    ///
    /// `UNAUTHORIZED`, `NOT_FOUND`, or `FORBIDDEN` for another provider's.
    pub async fn provider_prescription(
        &self,
        actor: &Actor,
        id: PrescriptionId,
    ) -> Result<PrescriptionView, WorkflowError> {
        let provider = require_provider(actor, "read")?;
        let view = self.reread_prescription(id).await?;
        if &view.provider_id == provider {
            Ok(view)
        } else {
            Err(WorkflowError::Forbidden(
                "You do not have access to this prescription".into(),
            ))
        }
    }
}
