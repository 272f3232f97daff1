//! Health check endpoints.
//!
//! Used by load balancers and monitoring systems to verify service health.

use axum::http::StatusCode;

/// Liveness probe.
///
/// Returns 200 OK while the process is serving requests. Does NOT check
/// dependencies (database, identity provider).
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
