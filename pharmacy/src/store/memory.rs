//! In-memory [`PharmacyStore`].
//!
//! A commit applies its batch to a clone of the tables and swaps the clone in
//! only when every write succeeded, which gives the same all-or-nothing
//! behaviour as a database transaction.

use super::{PharmacyStore, StoreFuture, Write};
use crate::error::StoreError;
use crate::types::{
    Compound, CompoundId, CompoundSummary, OrderDetail, OrderId, OrderQuery, OrderRecord,
    OrderView, Page, PageRequest, Patient, PatientId, PersonRef, PrescriptionId,
    PrescriptionQuery, PrescriptionRecord, PrescriptionSummary, PrescriptionView,
    ProviderId, ProviderLicense, RECENT_LOG_ENTRIES, ShippingAddress, SortOrder,
    StatusLogEntry,
};
use crate::workflow::compounding::BatchMember;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
struct Tables {
    orders: HashMap<OrderId, OrderRecord>,
    addresses: HashMap<OrderId, ShippingAddress>,
    logs: Vec<StatusLogEntry>,
    prescriptions: HashMap<PrescriptionId, PrescriptionRecord>,
    patients: HashMap<PatientId, Patient>,
    compounds: HashMap<CompoundId, Compound>,
    licenses: Vec<ProviderLicense>,
}

fn missing(kind: &str, id: impl std::fmt::Display) -> StoreError {
    StoreError::MissingRow(format!("{kind} {id}"))
}

impl Tables {
    fn apply(&mut self, write: Write) -> Result<(), StoreError> {
        match write {
            Write::UpdateOrder { id, patch } => {
                let order = self.orders.get_mut(&id).ok_or_else(|| missing("order", &id))?;
                patch.apply_to(order);
            },
            Write::AppendOrderLog(entry) => {
                if !self.orders.contains_key(&entry.order_id) {
                    return Err(missing("order", &entry.order_id));
                }
                self.logs.push(entry);
            },
            Write::UpdatePrescription { id, patch } => {
                let rx = self
                    .prescriptions
                    .get_mut(&id)
                    .ok_or_else(|| missing("prescription", &id))?;
                patch.apply_to(rx);
            },
            Write::ConsumeRefill { id } => {
                let rx = self
                    .prescriptions
                    .get_mut(&id)
                    .filter(|rx| rx.refills_used < rx.refills)
                    .ok_or_else(|| missing("prescription with a refill left", &id))?;
                rx.refills_used += 1;
            },
            Write::InsertOrder { order, address } => {
                self.addresses.insert(order.id.clone(), address);
                self.orders.insert(order.id.clone(), order);
            },
            Write::InsertPrescription(rx) => {
                self.prescriptions.insert(rx.id.clone(), rx);
            },
        }
        Ok(())
    }

    fn compound_for(&self, rx: &PrescriptionRecord) -> Result<&Compound, StoreError> {
        self.compounds
            .get(&rx.compound_id)
            .ok_or_else(|| StoreError::Corrupt(format!("compound {} missing", rx.compound_id)))
    }

    fn person(&self, id: &PatientId) -> Result<PersonRef, StoreError> {
        self.patients
            .get(id)
            .map(|p| PersonRef {
                id: p.id.to_string(),
                name: p.full_name(),
            })
            .ok_or_else(|| StoreError::Corrupt(format!("patient {id} missing")))
    }

    fn order_view(&self, order: &OrderRecord) -> Result<OrderView, StoreError> {
        let rx = self
            .prescriptions
            .get(&order.prescription_id)
            .ok_or_else(|| StoreError::Corrupt(format!("prescription {} missing", order.prescription_id)))?;
        Ok(OrderView {
            id: order.id.clone(),
            order_number: order.order_number.clone(),
            status: order.status,
            total_amount: order.total_amount,
            created_at: order.created_at,
            tracking_number: order.tracking_number.clone(),
            carrier: order.carrier.clone(),
            patient: self.person(&order.patient_id)?,
            medication: self.compound_for(rx)?.name.clone(),
        })
    }

    fn order_detail(&self, order: &OrderRecord) -> Result<OrderDetail, StoreError> {
        let view = self.order_view(order)?;
        let rx = self
            .prescriptions
            .get(&order.prescription_id)
            .ok_or_else(|| StoreError::Corrupt(format!("prescription {} missing", order.prescription_id)))?;

        // Newest first; among equal timestamps the later append wins.
        let mut logs: Vec<_> = self
            .logs
            .iter()
            .rev()
            .filter(|entry| entry.order_id == order.id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(RECENT_LOG_ENTRIES);

        Ok(OrderDetail {
            order: view,
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            prescription: PrescriptionSummary {
                id: rx.id.clone(),
                quantity: rx.quantity,
                directions: rx.directions.clone(),
                refills: rx.refills,
                refills_used: rx.refills_used,
                prescribed_at: rx.prescribed_at,
            },
            compound: CompoundSummary::from(self.compound_for(rx)?),
            ship_address: self.addresses.get(&order.id).cloned(),
            status_logs: logs,
        })
    }

    fn prescription_view(&self, rx: &PrescriptionRecord) -> Result<PrescriptionView, StoreError> {
        Ok(PrescriptionView {
            id: rx.id.clone(),
            quantity: rx.quantity,
            directions: rx.directions.clone(),
            status: rx.status,
            refills: rx.refills,
            refills_used: rx.refills_used,
            prescribed_at: rx.prescribed_at,
            verified_at: rx.verified_at,
            verified_by: rx.verified_by.clone(),
            patient: self.person(&rx.patient_id)?,
            provider_id: rx.provider_id.clone(),
            compound: CompoundSummary::from(self.compound_for(rx)?),
            rejection_reason: None,
        })
    }
}

fn paginate<T, K: Ord>(
    mut rows: Vec<T>,
    key: impl Fn(&T) -> K,
    sort: SortOrder,
    page: PageRequest,
) -> (Vec<T>, u64) {
    rows.sort_by_key(|row| key(row));
    if sort == SortOrder::Desc {
        rows.reverse();
    }
    let total = rows.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let rows = rows
        .into_iter()
        .skip(offset)
        .take(page.page_size as usize)
        .collect();
    (rows, total)
}

/// Mutex-guarded tables behind the [`PharmacyStore`] trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_at: Mutex<Option<usize>>,
    commits: AtomicUsize,
}

impl InMemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::DatabaseError("table lock poisoned".into()))
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut tables = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut tables)
    }

    fn read<T: Send + 'static>(
        &self,
        f: impl FnOnce(&Tables) -> Result<T, StoreError>,
    ) -> StoreFuture<'_, T> {
        let result = self.lock().and_then(|tables| f(&tables));
        Box::pin(std::future::ready(result))
    }

    /// Add or replace a patient.
    pub fn seed_patient(&self, patient: Patient) {
        self.with_tables(|t| t.patients.insert(patient.id.clone(), patient));
    }

    /// Add or replace a compound.
    pub fn seed_compound(&self, compound: Compound) {
        self.with_tables(|t| t.compounds.insert(compound.id.clone(), compound));
    }

    /// Add or replace a prescription.
    pub fn seed_prescription(&self, rx: PrescriptionRecord) {
        self.with_tables(|t| t.prescriptions.insert(rx.id.clone(), rx));
    }

    /// Add or replace an order, without an audit entry.
    pub fn seed_order(&self, order: OrderRecord) {
        self.with_tables(|t| t.orders.insert(order.id.clone(), order));
    }

    /// Record a provider license.
    pub fn seed_license(&self, license: ProviderLicense) {
        self.with_tables(|t| t.licenses.push(license));
    }

    /// Current order row.
    #[must_use]
    pub fn order(&self, id: &OrderId) -> Option<OrderRecord> {
        self.with_tables(|t| t.orders.get(id).cloned())
    }

    /// Current prescription row.
    #[must_use]
    pub fn prescription(&self, id: &PrescriptionId) -> Option<PrescriptionRecord> {
        self.with_tables(|t| t.prescriptions.get(id).cloned())
    }

    /// Audit entries for `id`, oldest first.
    #[must_use]
    pub fn status_logs(&self, id: &OrderId) -> Vec<StatusLogEntry> {
        self.with_tables(|t| t.logs.iter().filter(|e| &e.order_id == id).cloned().collect())
    }

    /// Number of orders stored.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.with_tables(|t| t.orders.len())
    }

    /// Batches committed so far.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make the next commit fail when it reaches write number `index`.
    ///
    /// Writes before `index` are applied to the scratch copy and then thrown
    /// away with it.
    pub fn fail_commit_at(&self, index: usize) {
        let mut fail_at = match self.fail_at.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *fail_at = Some(index);
    }

    fn commit_now(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let fail_at = self
            .fail_at
            .lock()
            .map_err(|_| StoreError::DatabaseError("failure injector poisoned".into()))?
            .take();

        let mut tables = self.lock()?;
        let mut scratch = tables.clone();
        for (index, write) in writes.into_iter().enumerate() {
            if fail_at == Some(index) {
                return Err(StoreError::DatabaseError(format!(
                    "injected failure at {}",
                    write.kind()
                )));
            }
            scratch.apply(write)?;
        }
        *tables = scratch;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PharmacyStore for InMemoryStore {
    fn find_order(&self, id: OrderId) -> StoreFuture<'_, Option<OrderRecord>> {
        self.read(move |t| Ok(t.orders.get(&id).cloned()))
    }

    fn find_prescription(&self, id: PrescriptionId) -> StoreFuture<'_, Option<PrescriptionRecord>> {
        self.read(move |t| Ok(t.prescriptions.get(&id).cloned()))
    }

    fn find_patient(&self, id: PatientId) -> StoreFuture<'_, Option<Patient>> {
        self.read(move |t| Ok(t.patients.get(&id).cloned()))
    }

    fn find_compound(&self, id: CompoundId) -> StoreFuture<'_, Option<Compound>> {
        self.read(move |t| Ok(t.compounds.get(&id).cloned()))
    }

    fn provider_licensed_in(
        &self,
        provider: ProviderId,
        state: String,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        self.read(move |t| {
            Ok(t.licenses
                .iter()
                .any(|l| l.provider_id == provider && l.covers(&state, at)))
        })
    }

    fn order_view(&self, id: OrderId) -> StoreFuture<'_, Option<OrderView>> {
        self.read(move |t| t.orders.get(&id).map(|o| t.order_view(o)).transpose())
    }

    fn order_detail(&self, id: OrderId) -> StoreFuture<'_, Option<OrderDetail>> {
        self.read(move |t| t.orders.get(&id).map(|o| t.order_detail(o)).transpose())
    }

    fn prescription_view(&self, id: PrescriptionId) -> StoreFuture<'_, Option<PrescriptionView>> {
        self.read(move |t| {
            t.prescriptions
                .get(&id)
                .map(|rx| t.prescription_view(rx))
                .transpose()
        })
    }

    fn list_orders(&self, query: OrderQuery) -> StoreFuture<'_, Page<OrderView>> {
        self.read(move |t| {
            let rows: Vec<&OrderRecord> = t
                .orders
                .values()
                .filter(|o| query.status.is_none_or(|s| o.status == s))
                .filter(|o| query.patient.as_ref().is_none_or(|p| &o.patient_id == p))
                .collect();
            let (rows, total) =
                paginate(rows, |o| (o.created_at, o.id.clone()), query.sort, query.page);
            let items = rows
                .into_iter()
                .map(|o| t.order_view(o))
                .collect::<Result<_, _>>()?;
            Ok(Page { items, total })
        })
    }

    fn list_prescriptions(&self, query: PrescriptionQuery) -> StoreFuture<'_, Page<PrescriptionView>> {
        self.read(move |t| {
            let rows: Vec<&PrescriptionRecord> = t
                .prescriptions
                .values()
                .filter(|rx| query.status.is_none_or(|s| rx.status == s))
                .filter(|rx| query.provider.as_ref().is_none_or(|p| &rx.provider_id == p))
                .filter(|rx| query.patient.as_ref().is_none_or(|p| &rx.patient_id == p))
                .collect();
            let (rows, total) =
                paginate(rows, |rx| (rx.prescribed_at, rx.id.clone()), query.sort, query.page);
            let items = rows
                .into_iter()
                .map(|rx| t.prescription_view(rx))
                .collect::<Result<_, _>>()?;
            Ok(Page { items, total })
        })
    }

    fn compounding_members(&self) -> StoreFuture<'_, Vec<BatchMember>> {
        self.read(|t| {
            t.orders
                .values()
                .filter(|o| o.status.in_compounding_stage())
                .map(|o| -> Result<BatchMember, StoreError> {
                    let rx = t.prescriptions.get(&o.prescription_id).ok_or_else(|| {
                        StoreError::Corrupt(format!("prescription {} missing", o.prescription_id))
                    })?;
                    Ok(BatchMember {
                        order_id: o.id.clone(),
                        order_number: o.order_number.clone(),
                        status: o.status,
                        created_at: o.created_at,
                        compound: CompoundSummary::from(t.compound_for(rx)?),
                    })
                })
                .collect()
        })
    }

    fn commit(&self, writes: Vec<Write>) -> StoreFuture<'_, ()> {
        Box::pin(std::future::ready(self.commit_now(writes)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::OrderPatch;
    use crate::types::{Money, OrderStatus, PrescriptionStatus};
    use rx_dispatch_testing::test_epoch;

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_patient(Patient {
            id: PatientId::new("pat-1"),
            first_name: "Ada".into(),
            last_name: "Quinn".into(),
            date_of_birth: None,
            state: Some("TX".into()),
        });
        store.seed_compound(Compound {
            id: CompoundId::new("cmp-1"),
            name: "Naltrexone".into(),
            dosage_form: "capsule".into(),
            strength: Some("4.5mg".into()),
            cash_price: Some(Money::from_cents(6_000)),
            is_active: true,
        });
        store.seed_prescription(PrescriptionRecord {
            id: PrescriptionId::new("rx-1"),
            patient_id: PatientId::new("pat-1"),
            provider_id: ProviderId::new("prov-1"),
            compound_id: CompoundId::new("cmp-1"),
            quantity: 30,
            directions: "One daily".into(),
            status: PrescriptionStatus::Verified,
            refills: 3,
            refills_used: 0,
            prescribed_at: test_epoch(),
            verified_at: None,
            verified_by: None,
        });
        store.seed_order(OrderRecord {
            id: OrderId::new("ord-1"),
            order_number: "ORD-1".into(),
            patient_id: PatientId::new("pat-1"),
            prescription_id: PrescriptionId::new("rx-1"),
            status: OrderStatus::Pending,
            total_amount: Money::from_cents(6_000),
            created_at: test_epoch(),
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            tracking_number: None,
            carrier: None,
        });
        store
    }

    fn status_patch(status: OrderStatus) -> Write {
        Write::UpdateOrder {
            id: OrderId::new("ord-1"),
            patch: OrderPatch {
                status: Some(status),
                ..OrderPatch::default()
            },
        }
    }

    #[tokio::test]
    async fn view_joins_patient_and_compound() {
        let store = seeded();
        let view = store.order_view(OrderId::new("ord-1")).await.unwrap().unwrap();
        assert_eq!(view.patient.name, "Ada Quinn");
        assert_eq!(view.medication, "Naltrexone");
    }

    #[tokio::test]
    async fn failed_commit_leaves_nothing_behind() {
        let store = seeded();
        store.fail_commit_at(1);
        let writes = vec![
            status_patch(OrderStatus::Processing),
            Write::ConsumeRefill {
                id: PrescriptionId::new("rx-1"),
            },
        ];
        assert!(store.commit(writes).await.is_err());

        let order = store.order(&OrderId::new("ord-1")).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(store.commit_count(), 0);

        // The injector is one-shot.
        store.commit(vec![status_patch(OrderStatus::Processing)]).await.unwrap();
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn write_to_missing_row_aborts_batch() {
        let store = seeded();
        let writes = vec![
            status_patch(OrderStatus::Processing),
            Write::ConsumeRefill {
                id: PrescriptionId::new("rx-404"),
            },
        ];
        let err = store.commit(writes).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRow(_)));
        assert_eq!(
            store.order(&OrderId::new("ord-1")).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn exhausted_refills_fail_the_whole_commit() {
        let store = seeded();
        let mut rx = store.prescription(&PrescriptionId::new("rx-1")).unwrap();
        rx.refills_used = rx.refills;
        store.seed_prescription(rx);

        let writes = vec![
            status_patch(OrderStatus::Processing),
            Write::ConsumeRefill {
                id: PrescriptionId::new("rx-1"),
            },
        ];
        let err = store.commit(writes).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingRow(_)));

        let rx = store.prescription(&PrescriptionId::new("rx-1")).unwrap();
        assert_eq!(rx.refills_used, 3);
        assert_eq!(
            store.order(&OrderId::new("ord-1")).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[tokio::test]
    async fn license_lookup_respects_expiry() {
        let store = seeded();
        store.seed_license(ProviderLicense {
            provider_id: ProviderId::new("prov-1"),
            state: "TX".into(),
            is_active: true,
            expires_at: Some(test_epoch()),
        });
        let before = test_epoch() - chrono::Duration::days(1);
        assert!(store.provider_licensed_in(ProviderId::new("prov-1"), "TX".into(), before).await.unwrap());
        assert!(!store.provider_licensed_in(ProviderId::new("prov-1"), "TX".into(), test_epoch()).await.unwrap());
        assert!(!store.provider_licensed_in(ProviderId::new("prov-2"), "TX".into(), before).await.unwrap());
    }
}
