//! Pharmacy order endpoints.
//!
//! - GET /orders - List orders (status filter, paging, `sortOrder` default asc)
//! - GET /orders/:id - Order detail with recent audit entries
//! - PATCH /orders/:id - Status change and/or shipping details

use super::{CurrentActor, PageParams, paginated};
use crate::server::state::AppState;
use crate::types::{OrderDetail, OrderId, OrderQuery, OrderStatus, OrderView, SortOrder};
use crate::workflow::order::OrderUpdate;
use axum::extract::{Path, State};
use rx_dispatch_web::{ApiJson, ApiQuery, ApiResponse, AppError, CorrelationId, Paginated};
use serde::Deserialize;

/// Filters for `GET /orders`.
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    /// Only this status
    pub status: Option<OrderStatus>,
}

/// Body of `PATCH /orders/:id`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    /// Requested status
    pub status: Option<OrderStatus>,
    /// Audit note
    pub note: Option<String>,
    /// Carrier tracking number
    pub tracking_number: Option<String>,
    /// Carrier
    pub carrier: Option<String>,
}

impl From<UpdateOrderRequest> for OrderUpdate {
    fn from(req: UpdateOrderRequest) -> Self {
        Self {
            status: req.status,
            note: req.note,
            tracking_number: req.tracking_number,
            carrier: req.carrier,
        }
    }
}

/// List orders for pharmacy staff.
///
/// # Errors
///
/// `UNAUTHORIZED` for non-staff, `VALIDATION_ERROR` for bad paging.
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(paging): ApiQuery<PageParams>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> Result<Paginated<OrderView>, AppError> {
    let page = paging.window()?;
    let query = OrderQuery {
        status: filter.status,
        patient: None,
        sort: paging.sort_order.unwrap_or(SortOrder::Asc),
        page,
    };
    let result = state.service.list_orders(&actor, query).await?;
    Ok(paginated(page, result))
}

/// Order detail.
///
/// # Errors
///
/// `UNAUTHORIZED` for non-staff, `NOT_FOUND` for an unknown id.
pub async fn get_order(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<ApiResponse<OrderDetail>, AppError> {
    let detail = state.service.order_detail(&actor, OrderId::new(id)).await?;
    Ok(ApiResponse::ok(detail))
}

/// Apply a status change and/or shipping details.
///
/// An empty body succeeds and returns the order unchanged.
///
/// # Errors
///
/// `INVALID_TRANSITION` when the status change is not allowed; see
/// [`PharmacyService::update_order`](crate::service::PharmacyService::update_order).
pub async fn update_order(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateOrderRequest>,
) -> Result<ApiResponse<OrderView>, AppError> {
    tracing::debug!(correlation_id = %correlation_id.0, order_id = %id, "order update requested");
    let view = state
        .service
        .update_order(&actor, OrderId::new(id), body.into())
        .await?;
    Ok(ApiResponse::ok(view))
}
