//! Success envelopes.
//!
//! Single resources render as `{ "success": true, "data": ... }`, lists as
//! `{ "success": true, "data": [...], "pagination": { ... } }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Envelope for a single resource.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            status: StatusCode::OK,
        }
    }

    /// 201 with `data`.
    #[must_use]
    pub const fn created(data: T) -> Self {
        Self {
            success: true,
            data,
            status: StatusCode::CREATED,
        }
    }

    /// The wrapped payload.
    pub const fn data(&self) -> &T {
        &self.data
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    /// 1-based page number
    pub page: u32,
    /// Requested page size
    pub page_size: u32,
    /// Total matching rows
    pub total: u64,
    /// Whether another page follows
    pub has_more: bool,
}

impl PaginationMeta {
    /// Build the metadata; `has_more` is `page * page_size < total`.
    #[must_use]
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let seen = u64::from(page) * u64::from(page_size);
        Self {
            page,
            page_size,
            total,
            has_more: seen < total,
        }
    }
}

/// Envelope for a page of resources.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    success: bool,
    data: Vec<T>,
    pagination: PaginationMeta,
}

impl<T: Serialize> Paginated<T> {
    /// Wrap one page.
    #[must_use]
    pub const fn new(data: Vec<T>, pagination: PaginationMeta) -> Self {
        Self {
            success: true,
            data,
            pagination,
        }
    }
}

impl<T: Serialize> IntoResponse for Paginated<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_more_until_last_page() {
        assert!(PaginationMeta::new(1, 20, 41).has_more);
        assert!(PaginationMeta::new(2, 20, 41).has_more);
        assert!(!PaginationMeta::new(3, 20, 41).has_more);
        assert!(!PaginationMeta::new(1, 20, 20).has_more);
    }

    #[test]
    fn created_sets_status() {
        let response = ApiResponse::created("x").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
