//! Identity collaborator.
//!
//! Authentication happens at the identity provider. What reaches this service
//! is the provider's subject for the caller; an [`ActorResolver`] maps it to
//! the user's role and to the domain ids the workflows need.

use crate::error::StoreError;
use crate::role::Role;
use crate::store::StoreFuture;
use crate::types::{PatientId, ProviderId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The resolved caller of a workflow operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    /// User account id, recorded as `created_by` / `verified_by`
    pub user_id: UserId,
    /// Role
    pub role: Role,
    /// Patient profile, for patient accounts
    pub patient_id: Option<PatientId>,
    /// Provider profile, for prescriber accounts
    pub provider_id: Option<ProviderId>,
}

impl Actor {
    /// An actor with no linked patient or provider profile.
    #[must_use]
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role,
            patient_id: None,
            provider_id: None,
        }
    }

    /// Link a patient profile.
    #[must_use]
    pub fn with_patient(mut self, patient: PatientId) -> Self {
        self.patient_id = Some(patient);
        self
    }

    /// Link a provider profile.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider_id = Some(provider);
        self
    }
}

/// Maps an authenticated principal to an [`Actor`].
pub trait ActorResolver: Send + Sync {
    /// Resolve `subject`; `Ok(None)` when no account is linked to it.
    fn resolve(&self, subject: &str) -> StoreFuture<'_, Option<Actor>>;
}

/// In-memory resolver keyed by subject.
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    actors: Arc<RwLock<HashMap<String, Actor>>>,
}

impl StaticResolver {
    /// Empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `actor` under `subject`.
    pub fn insert(&self, subject: impl Into<String>, actor: Actor) {
        let mut actors = match self.actors.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        actors.insert(subject.into(), actor);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(self, subject: impl Into<String>, actor: Actor) -> Self {
        self.insert(subject, actor);
        self
    }
}

impl ActorResolver for StaticResolver {
    fn resolve(&self, subject: &str) -> StoreFuture<'_, Option<Actor>> {
        let found = self
            .actors
            .read()
            .map(|actors| actors.get(subject).cloned())
            .map_err(|_| StoreError::DatabaseError("actor table lock poisoned".into()));
        Box::pin(std::future::ready(found))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_registered_subject_only() {
        let resolver = StaticResolver::new().with(
            "auth0|rx-1",
            Actor::new("user-1", Role::Pharmacist),
        );

        let actor = resolver.resolve("auth0|rx-1").await.unwrap().unwrap();
        assert_eq!(actor.role, Role::Pharmacist);
        assert!(resolver.resolve("auth0|nobody").await.unwrap().is_none());
    }
}
