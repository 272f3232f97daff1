//! HTTP handlers.
//!
//! Handlers only translate: they parse the request, resolve the caller,
//! call one [`PharmacyService`](crate::service::PharmacyService) operation
//! and wrap the result in the response envelope.

use crate::error::WorkflowError;
use crate::types::{PageRequest, SortOrder};
use rx_dispatch_web::{AppError, Paginated, PaginationMeta};
use serde::Deserialize;

pub mod auth;
pub mod compounding;
pub mod orders;
pub mod patient;
pub mod prescriptions;
pub mod provider;

pub use auth::CurrentActor;

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(resource) => Self::not_found(resource),
            WorkflowError::Unauthorized(message) => Self::unauthorized(message),
            WorkflowError::Forbidden(message) => Self::forbidden(message),
            WorkflowError::BadRequest(message) => Self::bad_request(message),
            WorkflowError::InvalidState(message) => Self::invalid_state(message),
            transition @ WorkflowError::InvalidTransition { .. } => {
                Self::invalid_transition(transition.to_string())
            },
            WorkflowError::Validation(errors) => {
                Self::validation(serde_json::to_value(errors).unwrap_or_default())
            },
            WorkflowError::Store(source) => {
                Self::internal("Internal server error").with_source(anyhow::Error::new(source))
            },
        }
    }
}

/// Largest accepted `pageSize`.
pub const MAX_PAGE_SIZE: u32 = 100;

const fn default_page() -> u32 {
    1
}

const fn default_page_size() -> u32 {
    20
}

/// Paging and sort parameters shared by list endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    /// 1-based page
    #[serde(default = "default_page")]
    pub page: u32,
    /// Rows per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Sort direction; each endpoint picks its own default
    pub sort_order: Option<SortOrder>,
}

impl PageParams {
    /// Check bounds and produce the store-level window.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR` naming `page` or `pageSize`.
    pub fn window(&self) -> Result<PageRequest, AppError> {
        let mut errors = serde_json::Map::new();
        if self.page < 1 {
            errors.insert("page".into(), serde_json::json!(["Must be at least 1"]));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            errors.insert(
                "pageSize".into(),
                serde_json::json!([format!("Must be between 1 and {MAX_PAGE_SIZE}")]),
            );
        }
        if errors.is_empty() {
            Ok(PageRequest {
                page: self.page,
                page_size: self.page_size,
            })
        } else {
            Err(AppError::validation(errors.into()))
        }
    }
}

/// Wrap a store page in the list envelope.
pub(crate) fn paginated<T: serde::Serialize>(
    page: PageRequest,
    result: crate::types::Page<T>,
) -> Paginated<T> {
    Paginated::new(
        result.items,
        PaginationMeta::new(page.page, page.page_size, result.total),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn workflow_errors_keep_their_codes() {
        let cases = [
            (WorkflowError::NotFound("Order"), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                WorkflowError::Unauthorized("Pharmacy staff profile not found".into()),
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
            ),
            (
                WorkflowError::InvalidState("Order is not in compounding stage".into()),
                StatusCode::BAD_REQUEST,
                "INVALID_STATE",
            ),
            (
                WorkflowError::Store(crate::error::StoreError::DatabaseError("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
        }
    }

    #[test]
    fn store_failures_do_not_leak() {
        let app = AppError::from(WorkflowError::Store(
            crate::error::StoreError::DatabaseError("password authentication failed".into()),
        ));
        assert_eq!(app.message(), "Internal server error");
    }

    #[test]
    fn page_bounds() {
        let params = PageParams {
            page: 0,
            page_size: 101,
            sort_order: None,
        };
        let err = params.window().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let ok = PageParams {
            page: 2,
            page_size: 100,
            sort_order: None,
        };
        assert_eq!(ok.window().map(|w| w.offset()).unwrap_or_default(), 100);
    }
}
