//! Persistence collaborator.
//!
//! Workflows load records through [`PharmacyStore`], run a reducer, and hand
//! the resulting [`Write`] batch to [`PharmacyStore::commit`]. A batch commits
//! atomically: either every write lands or none does.
//!
//! Two implementations ship with the crate:
//! - [`InMemoryStore`]: mutex-guarded tables, used by tests and local runs
//! - [`PostgresStore`]: `sqlx` over a `PgPool`, one transaction per commit

use crate::error::StoreError;
use crate::types::{
    Compound, CompoundId, OrderDetail, OrderId, OrderQuery, OrderRecord, OrderView, Page,
    Patient, PatientId, PrescriptionId, PrescriptionQuery, PrescriptionRecord, PrescriptionView,
    ProviderId,
};
use crate::workflow::compounding::BatchMember;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

mod memory;
mod postgres;
mod write;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use write::{OrderPatch, PrescriptionPatch, Write};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Storage for orders, prescriptions and the reference data around them.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the service can hold an
/// `Arc<dyn PharmacyStore>`.
pub trait PharmacyStore: Send + Sync {
    /// Load an order row.
    fn find_order(&self, id: OrderId) -> StoreFuture<'_, Option<OrderRecord>>;

    /// Load a prescription row.
    fn find_prescription(&self, id: PrescriptionId) -> StoreFuture<'_, Option<PrescriptionRecord>>;

    /// Load a patient, including the state from their address.
    fn find_patient(&self, id: PatientId) -> StoreFuture<'_, Option<Patient>>;

    /// Load a compound.
    fn find_compound(&self, id: CompoundId) -> StoreFuture<'_, Option<Compound>>;

    /// Whether `provider` holds an active, unexpired license for `state` at `at`.
    fn provider_licensed_in(
        &self,
        provider: ProviderId,
        state: String,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool>;

    /// Order headline joined with patient and compound.
    fn order_view(&self, id: OrderId) -> StoreFuture<'_, Option<OrderView>>;

    /// Full order read model.
    fn order_detail(&self, id: OrderId) -> StoreFuture<'_, Option<OrderDetail>>;

    /// Prescription joined with patient and compound.
    fn prescription_view(&self, id: PrescriptionId) -> StoreFuture<'_, Option<PrescriptionView>>;

    /// Filtered, sorted, paged order list.
    fn list_orders(&self, query: OrderQuery) -> StoreFuture<'_, Page<OrderView>>;

    /// Filtered, sorted, paged prescription list.
    fn list_prescriptions(&self, query: PrescriptionQuery) -> StoreFuture<'_, Page<PrescriptionView>>;

    /// Every order currently in compounding or quality check, with its compound.
    fn compounding_members(&self) -> StoreFuture<'_, Vec<BatchMember>>;

    /// Apply `writes` in order, all or nothing.
    fn commit(&self, writes: Vec<Write>) -> StoreFuture<'_, ()>;
}
