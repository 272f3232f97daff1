//! Provider portal endpoints.

use super::{CurrentActor, PageParams, paginated};
use crate::server::state::AppState;
use crate::types::{
    CompoundId, PatientId, PrescriptionId, PrescriptionQuery, PrescriptionStatus,
    PrescriptionView, SortOrder,
};
use crate::workflow::prescribing::PrescriptionDraft;
use axum::extract::{Path, State};
use rx_dispatch_web::{ApiJson, ApiQuery, ApiResponse, AppError, Paginated};
use serde::Deserialize;

/// Filters for `GET /provider/prescriptions`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPrescriptionFilter {
    /// Only this status
    pub status: Option<PrescriptionStatus>,
    /// Only this patient
    pub patient_id: Option<PatientId>,
}

/// Body of `POST /provider/prescriptions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrescriptionRequest {
    /// Patient the prescription is for
    pub patient_id: PatientId,
    /// Compound prescribed
    pub compound_id: CompoundId,
    /// Units per dispense
    pub quantity: i32,
    /// Authorized refills
    #[serde(default)]
    pub refills: i32,
    /// Directions for use
    pub directions: String,
}

/// Body of `PATCH /provider/prescriptions/:id`.
#[derive(Debug, Default, Deserialize)]
pub struct AmendPrescriptionRequest {
    /// New quantity
    pub quantity: Option<i32>,
    /// New directions
    pub directions: Option<String>,
}

/// The caller's prescriptions, most recently written first by default.
///
/// # Errors
///
/// `UNAUTHORIZED` without a provider profile.
pub async fn list_my_prescriptions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(paging): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<ProviderPrescriptionFilter>,
) -> Result<Paginated<PrescriptionView>, AppError> {
    let page = paging.window()?;
    let query = PrescriptionQuery {
        status: filter.status,
        provider: None,
        patient: filter.patient_id,
        sort: paging.sort_order.unwrap_or(SortOrder::Desc),
        page,
    };
    let result = state.service.provider_prescriptions(&actor, query).await?;
    Ok(paginated(page, result))
}

/// One of the caller's prescriptions.
///
/// # Errors
///
/// `FORBIDDEN` for another provider's prescription.
pub async fn get_my_prescription(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<ApiResponse<PrescriptionView>, AppError> {
    let view = state
        .service
        .provider_prescription(&actor, PrescriptionId::new(id))
        .await?;
    Ok(ApiResponse::ok(view))
}

/// Write a new prescription.
///
/// # Errors
///
/// `VALIDATION_ERROR` for bad fields, `FORBIDDEN` without a license in the
/// patient's state or for an inactive compound.
pub async fn create_prescription(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(body): ApiJson<CreatePrescriptionRequest>,
) -> Result<ApiResponse<PrescriptionView>, AppError> {
    let draft = PrescriptionDraft {
        quantity: body.quantity,
        refills: body.refills,
        directions: body.directions,
    };
    let view = state
        .service
        .create_prescription(&actor, body.patient_id, body.compound_id, draft)
        .await?;
    Ok(ApiResponse::created(view))
}

/// Change quantity or directions before dispensing starts.
///
/// # Errors
///
/// `FORBIDDEN` for another provider's prescription or once it is locked.
pub async fn amend_prescription(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AmendPrescriptionRequest>,
) -> Result<ApiResponse<PrescriptionView>, AppError> {
    let view = state
        .service
        .amend_prescription(&actor, PrescriptionId::new(id), body.quantity, body.directions)
        .await?;
    Ok(ApiResponse::ok(view))
}
