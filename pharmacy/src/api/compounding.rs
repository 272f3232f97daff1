//! Compounding lab endpoints.

use super::CurrentActor;
use crate::server::state::AppState;
use crate::types::{OrderDetail, OrderId, OrderView};
use crate::workflow::compounding::BatchReport;
use axum::extract::{Path, State};
use rx_dispatch_web::{ApiJson, ApiResponse, AppError};
use serde::Deserialize;

/// Body of `PATCH /compounding/:id`.
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    /// Target lab stage: `compounding`, `quality_check` or `packaging`
    pub status: String,
    /// Audit note
    pub note: Option<String>,
}

/// Orders in the lab, grouped by compound.
///
/// # Errors
///
/// `UNAUTHORIZED` for non-staff.
pub async fn list_batches(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<ApiResponse<BatchReport>, AppError> {
    Ok(ApiResponse::ok(state.service.batches(&actor).await?))
}

/// Detail of an order currently in the lab.
///
/// # Errors
///
/// `INVALID_STATE` for orders outside compounding and quality check.
pub async fn get_compounding_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<ApiResponse<OrderDetail>, AppError> {
    let detail = state
        .service
        .compounding_detail(&actor, OrderId::new(id))
        .await?;
    Ok(ApiResponse::ok(detail))
}

/// Move an order between lab stages.
///
/// # Errors
///
/// `BAD_REQUEST` for a status outside the lab, `INVALID_TRANSITION` for a
/// move the lab graph does not allow.
pub async fn advance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AdvanceRequest>,
) -> Result<ApiResponse<OrderView>, AppError> {
    let view = state
        .service
        .advance_compounding(&actor, OrderId::new(id), &body.status, body.note)
        .await?;
    Ok(ApiResponse::ok(view))
}
