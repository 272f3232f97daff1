//! Prescription review endpoints for pharmacy staff.

use super::{CurrentActor, PageParams, paginated};
use crate::server::state::AppState;
use crate::types::{
    PrescriptionId, PrescriptionQuery, PrescriptionStatus, PrescriptionView, SortOrder,
};
use axum::extract::{Path, State};
use rx_dispatch_web::{ApiJson, ApiQuery, ApiResponse, AppError, Paginated};
use serde::Deserialize;

/// Returned for any `action` other than `verify` or `reject`.
pub const INVALID_ACTION: &str = "Invalid action. Must be 'verify' or 'reject'";

/// Filters for `GET /prescriptions`.
#[derive(Debug, Deserialize)]
pub struct PrescriptionFilter {
    /// Status to list; the review queue by default
    #[serde(default = "pending")]
    pub status: PrescriptionStatus,
}

const fn pending() -> PrescriptionStatus {
    PrescriptionStatus::Pending
}

/// Body of `PATCH /prescriptions/:id`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// `verify` or `reject`
    pub action: String,
    /// Echoed back on rejection
    pub rejection_reason: Option<String>,
}

/// The review queue.
///
/// # Errors
///
/// `UNAUTHORIZED` for non-staff, `VALIDATION_ERROR` for bad paging.
pub async fn list_prescriptions(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(paging): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<PrescriptionFilter>,
) -> Result<Paginated<PrescriptionView>, AppError> {
    let page = paging.window()?;
    let query = PrescriptionQuery {
        status: Some(filter.status),
        provider: None,
        patient: None,
        sort: paging.sort_order.unwrap_or(SortOrder::Asc),
        page,
    };
    let result = state.service.list_prescriptions(&actor, query).await?;
    Ok(paginated(page, result))
}

/// One prescription.
///
/// # Errors
///
/// `UNAUTHORIZED` for non-staff, `NOT_FOUND` for an unknown id.
pub async fn get_prescription(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<ApiResponse<PrescriptionView>, AppError> {
    let view = state
        .service
        .prescription_detail(&actor, PrescriptionId::new(id))
        .await?;
    Ok(ApiResponse::ok(view))
}

/// Verify or reject a pending prescription.
///
/// # Errors
///
/// `BAD_REQUEST` for an unknown action, `INVALID_STATE` when the
/// prescription was already reviewed.
pub async fn review_prescription(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReviewRequest>,
) -> Result<ApiResponse<PrescriptionView>, AppError> {
    let id = PrescriptionId::new(id);
    let view = match body.action.as_str() {
        "verify" => state.service.verify(&actor, id).await?,
        "reject" => state.service.reject(&actor, id, body.rejection_reason).await?,
        _ => return Err(AppError::bad_request(INVALID_ACTION)),
    };
    Ok(ApiResponse::ok(view))
}
