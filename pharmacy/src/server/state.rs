//! Application state for the HTTP server.

use crate::identity::ActorResolver;
use crate::service::PharmacyService;
use std::sync::Arc;

/// Shared by every handler; cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Workflow entry points
    pub service: PharmacyService,
    /// Maps the bearer principal to an actor
    pub identity: Arc<dyn ActorResolver>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(service: PharmacyService, identity: Arc<dyn ActorResolver>) -> Self {
        Self { service, identity }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}
