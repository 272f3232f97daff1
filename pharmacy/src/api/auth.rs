//! Caller resolution for handlers.

use crate::identity::Actor;
use crate::server::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use rx_dispatch_web::{AppError, BearerToken};

/// The resolved caller.
///
/// Rejects with `UNAUTHORIZED` when the bearer principal is missing or no
/// account is linked to it. Role checks happen later, in the service.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(subject) = BearerToken::from_request_parts(parts, state).await?;

        let actor = state.identity.resolve(&subject).await.map_err(|err| {
            tracing::error!(error = %err, "actor lookup failed");
            AppError::internal("Internal server error").with_source(anyhow::Error::new(err))
        })?;

        actor
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Not authenticated"))
    }
}
