//! Functional core: one reducer per workflow.
//!
//! | Module | Machine | Acts on |
//! |---|---|---|
//! | [`order`] | [`order::ORDER_MACHINE`] | order status, shipment fields |
//! | [`prescription`] | [`prescription::VERIFICATION_MACHINE`] | verify / reject / amend |
//! | [`compounding`] | [`compounding::COMPOUNDING_MACHINE`] | the lab slice of the order graph |
//! | [`placement`] | - | patient places an order against a prescription |
//! | [`prescribing`] | - | provider writes a prescription |
//!
//! Reducers validate everything before mutating; a refused action returns an
//! error, leaves the record untouched and produces no writes.

use chrono::{DateTime, Utc};
use rx_dispatch_core::environment::{Clock, IdGenerator};
use std::sync::Arc;

pub mod compounding;
pub mod order;
pub mod placement;
pub mod prescribing;
pub mod prescription;

/// Dependencies injected into every workflow reducer.
#[derive(Clone)]
pub struct WorkflowEnvironment {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl WorkflowEnvironment {
    /// Build from a clock and an id generator.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    /// Current time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fresh identifier.
    #[must_use]
    pub fn next_id(&self) -> String {
        self.ids.next_id()
    }
}

impl std::fmt::Debug for WorkflowEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEnvironment").finish_non_exhaustive()
    }
}

/// Production id generator: random UUID v4 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
