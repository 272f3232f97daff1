//! Patient portal endpoints.
//!
//! Every route is scoped to the caller's own patient profile.

use super::{CurrentActor, PageParams, paginated};
use crate::server::state::AppState;
use crate::types::{
    OrderDetail, OrderId, OrderQuery, OrderStatus, OrderView, PrescriptionId, ShippingAddress,
    SortOrder,
};
use axum::extract::{Path, State};
use rx_dispatch_web::{ApiJson, ApiQuery, ApiResponse, AppError, Paginated};
use serde::Deserialize;

/// Filters for `GET /patient/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct PatientOrderFilter {
    /// Only this status
    pub status: Option<OrderStatus>,
}

/// Body of `POST /patient/orders`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// Prescription to dispense against
    pub prescription_id: PrescriptionId,
    /// Destination
    pub shipping_address: ShippingAddress,
}

/// The caller's orders, newest first unless `sortOrder=asc`.
///
/// # Errors
///
/// `UNAUTHORIZED` without a patient profile.
pub async fn list_my_orders(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(paging): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<PatientOrderFilter>,
) -> Result<Paginated<OrderView>, AppError> {
    let page = paging.window()?;
    let query = OrderQuery {
        status: filter.status,
        patient: None,
        sort: paging.sort_order.unwrap_or(SortOrder::Desc),
        page,
    };
    let result = state.service.patient_orders(&actor, query).await?;
    Ok(paginated(page, result))
}

/// One of the caller's orders.
///
/// # Errors
///
/// `NOT_FOUND` for unknown ids and for other patients' orders.
pub async fn get_my_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<ApiResponse<OrderDetail>, AppError> {
    let detail = state.service.patient_order(&actor, OrderId::new(id)).await?;
    Ok(ApiResponse::ok(detail))
}

/// Order a refill of one of the caller's prescriptions.
///
/// # Errors
///
/// `VALIDATION_ERROR` for a bad address, `BAD_REQUEST` when the
/// prescription cannot be dispensed.
pub async fn place_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<ApiResponse<OrderDetail>, AppError> {
    let detail = state
        .service
        .place_order(&actor, body.prescription_id, body.shipping_address)
        .await?;
    Ok(ApiResponse::created(detail))
}
