//! Axum integration for Rx Dispatch.
//!
//! This crate is the HTTP edge of the "Functional Core, Imperative Shell"
//! split: it turns requests into typed inputs and workflow outcomes into the
//! JSON envelopes every client expects.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, bearer principal
//! │  - Request parsing (ApiJson, ApiQuery)  │  ← Correlation IDs, tracing
//! │  - Envelopes (ApiResponse, AppError)    │
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Reducers + guarded state machines    │  ← No I/O, no side effects
//! └─────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ApiJson, ApiQuery, BearerToken, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use response::{ApiResponse, Paginated, PaginationMeta};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
