//! PostgreSQL [`PharmacyStore`] and [`ActorResolver`].
//!
//! Each [`commit`](PharmacyStore::commit) runs inside one transaction; any
//! failing statement rolls the whole batch back.
//!
//! # Example
//!
//! ```no_run
//! use rx_dispatch_pharmacy::store::PostgresStore;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgres://localhost/rx_dispatch").await?;
//! let store = PostgresStore::new(pool);
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use super::{PharmacyStore, StoreFuture, Write};
use crate::error::StoreError;
use crate::identity::{Actor, ActorResolver};
use crate::role::Role;
use crate::types::{
    Compound, CompoundId, CompoundSummary, Money, OrderDetail, OrderId, OrderQuery, OrderRecord,
    OrderStatus, OrderView, Page, PageRequest, Patient, PatientId, PersonRef, PrescriptionId,
    PrescriptionQuery, PrescriptionRecord, PrescriptionSummary, PrescriptionView, ProviderId,
    RECENT_LOG_ENTRIES, ShippingAddress, SortOrder, StatusLogEntry, UserId,
};
use crate::workflow::compounding::BatchMember;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.patient_id, o.prescription_id, o.status, \
     o.total_amount_cents, o.created_at, o.paid_at, o.shipped_at, o.delivered_at, \
     o.tracking_number, o.carrier";

const ORDER_VIEW_JOINS: &str = "FROM orders o \
     JOIN patients p ON p.id = o.patient_id \
     JOIN prescriptions rx ON rx.id = o.prescription_id \
     JOIN compounds c ON c.id = rx.compound_id";

const PRESCRIPTION_COLUMNS: &str = "rx.id, rx.patient_id, rx.provider_id, rx.compound_id, \
     rx.quantity, rx.directions, rx.status, rx.refills, rx.refills_used, rx.prescribed_at, \
     rx.verified_at, rx.verified_by";

const PRESCRIPTION_VIEW_JOINS: &str = "FROM prescriptions rx \
     JOIN patients p ON p.id = rx.patient_id \
     JOIN compounds c ON c.id = rx.compound_id";

const VIEW_EXTRAS: &str = "p.first_name AS patient_first_name, p.last_name AS patient_last_name, \
     c.name AS compound_name, c.dosage_form AS compound_dosage_form, c.strength AS compound_strength";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    order_number: String,
    patient_id: String,
    prescription_id: String,
    status: String,
    total_amount_cents: i64,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    tracking_number: Option<String>,
    carrier: Option<String>,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            patient_id: PatientId::new(row.patient_id),
            prescription_id: PrescriptionId::new(row.prescription_id),
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("{e}")))?,
            total_amount: Money::from_cents(row.total_amount_cents),
            created_at: row.created_at,
            paid_at: row.paid_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            tracking_number: row.tracking_number,
            carrier: row.carrier,
        })
    }
}

/// Patient and compound columns joined onto a view.
#[derive(sqlx::FromRow)]
struct ViewExtras {
    patient_first_name: String,
    patient_last_name: String,
    compound_name: String,
    compound_dosage_form: String,
    compound_strength: Option<String>,
}

impl ViewExtras {
    fn person(&self, id: &PatientId) -> PersonRef {
        PersonRef {
            id: id.to_string(),
            name: format!("{} {}", self.patient_first_name, self.patient_last_name),
        }
    }

    fn compound(&self, id: CompoundId) -> CompoundSummary {
        CompoundSummary {
            id,
            name: self.compound_name.clone(),
            dosage_form: self.compound_dosage_form.clone(),
            strength: self.compound_strength.clone(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderViewRow {
    #[sqlx(flatten)]
    order: OrderRow,
    #[sqlx(flatten)]
    extras: ViewExtras,
    rx_compound_id: String,
}

impl OrderViewRow {
    fn into_parts(self) -> Result<(OrderRecord, OrderView, CompoundSummary), StoreError> {
        let order = OrderRecord::try_from(self.order)?;
        let view = OrderView {
            id: order.id.clone(),
            order_number: order.order_number.clone(),
            status: order.status,
            total_amount: order.total_amount,
            created_at: order.created_at,
            tracking_number: order.tracking_number.clone(),
            carrier: order.carrier.clone(),
            patient: self.extras.person(&order.patient_id),
            medication: self.extras.compound_name.clone(),
        };
        let compound = self.extras.compound(CompoundId::new(self.rx_compound_id));
        Ok((order, view, compound))
    }
}

#[derive(sqlx::FromRow)]
struct PrescriptionRow {
    id: String,
    patient_id: String,
    provider_id: String,
    compound_id: String,
    quantity: i32,
    directions: String,
    status: String,
    refills: i32,
    refills_used: i32,
    prescribed_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
    verified_by: Option<String>,
}

impl TryFrom<PrescriptionRow> for PrescriptionRecord {
    type Error = StoreError;

    fn try_from(row: PrescriptionRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: PrescriptionId::new(row.id),
            patient_id: PatientId::new(row.patient_id),
            provider_id: ProviderId::new(row.provider_id),
            compound_id: CompoundId::new(row.compound_id),
            quantity: row.quantity,
            directions: row.directions,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("{e}")))?,
            refills: row.refills,
            refills_used: row.refills_used,
            prescribed_at: row.prescribed_at,
            verified_at: row.verified_at,
            verified_by: row.verified_by.map(UserId::new),
        })
    }
}

#[derive(sqlx::FromRow)]
struct PrescriptionViewRow {
    #[sqlx(flatten)]
    rx: PrescriptionRow,
    #[sqlx(flatten)]
    extras: ViewExtras,
}

impl TryFrom<PrescriptionViewRow> for PrescriptionView {
    type Error = StoreError;

    fn try_from(row: PrescriptionViewRow) -> Result<Self, StoreError> {
        let rx = PrescriptionRecord::try_from(row.rx)?;
        Ok(Self {
            patient: row.extras.person(&rx.patient_id),
            compound: row.extras.compound(rx.compound_id),
            id: rx.id,
            quantity: rx.quantity,
            directions: rx.directions,
            status: rx.status,
            refills: rx.refills,
            refills_used: rx.refills_used,
            prescribed_at: rx.prescribed_at,
            verified_at: rx.verified_at,
            verified_by: rx.verified_by,
            provider_id: rx.provider_id,
            rejection_reason: None,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: String,
    order_id: String,
    status: String,
    note: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LogRow> for StatusLogEntry {
    type Error = StoreError;

    fn try_from(row: LogRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.id,
            order_id: OrderId::new(row.order_id),
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("{e}")))?,
            note: row.note,
            created_by: row.created_by.map(UserId::new),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    street1: String,
    street2: Option<String>,
    city: String,
    state: String,
    zip_code: String,
    country: String,
}

#[derive(sqlx::FromRow)]
struct CompoundRow {
    id: String,
    name: String,
    dosage_form: String,
    strength: Option<String>,
    cash_price_cents: Option<i64>,
    is_active: bool,
}

#[derive(sqlx::FromRow)]
struct PatientRow {
    id: String,
    first_name: String,
    last_name: String,
    date_of_birth: Option<NaiveDate>,
    address_state: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ActorRow {
    id: String,
    role: String,
    patient_id: Option<String>,
    provider_id: Option<String>,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: String,
    order_number: String,
    status: String,
    created_at: DateTime<Utc>,
    compound_id: String,
    compound_name: String,
    compound_dosage_form: String,
    compound_strength: Option<String>,
}

const fn direction(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

fn window(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.page_size),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

fn ensure_one(rows: u64, what: impl Into<String>) -> Result<(), StoreError> {
    if rows == 0 {
        Err(StoreError::MissingRow(what.into()))
    } else {
        Ok(())
    }
}

async fn apply(conn: &mut PgConnection, write: Write) -> Result<(), StoreError> {
    match write {
        Write::UpdateOrder { id, patch } => {
            let result = sqlx::query(
                "UPDATE orders SET \
                     status = COALESCE($2, status), \
                     shipped_at = COALESCE($3, shipped_at), \
                     delivered_at = COALESCE($4, delivered_at), \
                     tracking_number = COALESCE($5, tracking_number), \
                     carrier = COALESCE($6, carrier) \
                 WHERE id = $1",
            )
            .bind(id.as_str())
            .bind(patch.status.map(OrderStatus::as_str))
            .bind(patch.shipped_at)
            .bind(patch.delivered_at)
            .bind(patch.tracking_number)
            .bind(patch.carrier)
            .execute(&mut *conn)
            .await?;
            ensure_one(result.rows_affected(), format!("order {id}"))
        },
        Write::AppendOrderLog(entry) => {
            sqlx::query(
                "INSERT INTO order_status_logs (id, order_id, status, note, created_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(entry.id)
            .bind(entry.order_id.as_str())
            .bind(entry.status.as_str())
            .bind(entry.note)
            .bind(entry.created_by.as_ref().map(UserId::as_str))
            .bind(entry.created_at)
            .execute(&mut *conn)
            .await?;
            Ok(())
        },
        Write::UpdatePrescription { id, patch } => {
            let result = sqlx::query(
                "UPDATE prescriptions SET \
                     status = COALESCE($2, status), \
                     verified_at = COALESCE($3, verified_at), \
                     verified_by = COALESCE($4, verified_by), \
                     quantity = COALESCE($5, quantity), \
                     directions = COALESCE($6, directions) \
                 WHERE id = $1",
            )
            .bind(id.as_str())
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.verified_at)
            .bind(patch.verified_by.as_ref().map(UserId::as_str))
            .bind(patch.quantity)
            .bind(patch.directions)
            .execute(&mut *conn)
            .await?;
            ensure_one(result.rows_affected(), format!("prescription {id}"))
        },
        Write::ConsumeRefill { id } => {
            let result = sqlx::query(
                "UPDATE prescriptions SET refills_used = refills_used + 1 \
                 WHERE id = $1 AND refills_used < refills",
            )
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?;
            ensure_one(result.rows_affected(), format!("prescription {id} with a refill left"))
        },
        Write::InsertOrder { order, address } => {
            sqlx::query(
                "INSERT INTO orders (id, order_number, patient_id, prescription_id, status, \
                     total_amount_cents, created_at, paid_at, shipped_at, delivered_at, \
                     tracking_number, carrier) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(order.id.as_str())
            .bind(&order.order_number)
            .bind(order.patient_id.as_str())
            .bind(order.prescription_id.as_str())
            .bind(order.status.as_str())
            .bind(order.total_amount.cents())
            .bind(order.created_at)
            .bind(order.paid_at)
            .bind(order.shipped_at)
            .bind(order.delivered_at)
            .bind(&order.tracking_number)
            .bind(&order.carrier)
            .execute(&mut *conn)
            .await?;
            sqlx::query(
                "INSERT INTO order_addresses (order_id, street1, street2, city, state, zip_code, country) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(order.id.as_str())
            .bind(address.street1)
            .bind(address.street2)
            .bind(address.city)
            .bind(address.state)
            .bind(address.zip_code)
            .bind(address.country)
            .execute(&mut *conn)
            .await?;
            Ok(())
        },
        Write::InsertPrescription(rx) => {
            sqlx::query(
                "INSERT INTO prescriptions (id, patient_id, provider_id, compound_id, quantity, \
                     directions, status, refills, refills_used, prescribed_at, verified_at, verified_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            )
            .bind(rx.id.as_str())
            .bind(rx.patient_id.as_str())
            .bind(rx.provider_id.as_str())
            .bind(rx.compound_id.as_str())
            .bind(rx.quantity)
            .bind(&rx.directions)
            .bind(rx.status.as_str())
            .bind(rx.refills)
            .bind(rx.refills_used)
            .bind(rx.prescribed_at)
            .bind(rx.verified_at)
            .bind(rx.verified_by.as_ref().map(UserId::as_str))
            .execute(&mut *conn)
            .await?;
            Ok(())
        },
    }
}

/// PostgreSQL-backed store.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::DatabaseError(format!("Migration failed: {e}")))
    }

    async fn fetch_order_view(
        &self,
        id: &OrderId,
    ) -> Result<Option<(OrderRecord, OrderView, CompoundSummary)>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS}, {VIEW_EXTRAS}, rx.compound_id AS rx_compound_id \
             {ORDER_VIEW_JOINS} WHERE o.id = $1"
        );
        sqlx::query_as::<_, OrderViewRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(OrderViewRow::into_parts)
            .transpose()
    }

    async fn fetch_order_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, StoreError> {
        let Some((order, view, compound)) = self.fetch_order_view(&id).await? else {
            return Ok(None);
        };

        let rx_sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions rx WHERE rx.id = $1");
        let log_sql = "SELECT id, order_id, status, note, created_by, created_at \
                       FROM order_status_logs WHERE order_id = $1 \
                       ORDER BY created_at DESC, seq DESC LIMIT $2";
        let address_sql = "SELECT street1, street2, city, state, zip_code, country \
                           FROM order_addresses WHERE order_id = $1";
        let limit = i64::try_from(RECENT_LOG_ENTRIES).unwrap_or(i64::MAX);

        let (rx, logs, address) = futures::try_join!(
            sqlx::query_as::<_, PrescriptionRow>(&rx_sql)
                .bind(order.prescription_id.as_str())
                .fetch_one(&self.pool),
            sqlx::query_as::<_, LogRow>(log_sql)
                .bind(id.as_str())
                .bind(limit)
                .fetch_all(&self.pool),
            sqlx::query_as::<_, AddressRow>(address_sql)
                .bind(id.as_str())
                .fetch_optional(&self.pool),
        )?;
        let rx = PrescriptionRecord::try_from(rx)?;

        Ok(Some(OrderDetail {
            order: view,
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            prescription: PrescriptionSummary {
                id: rx.id,
                quantity: rx.quantity,
                directions: rx.directions,
                refills: rx.refills,
                refills_used: rx.refills_used,
                prescribed_at: rx.prescribed_at,
            },
            compound,
            ship_address: address.map(|a| ShippingAddress {
                street1: a.street1,
                street2: a.street2,
                city: a.city,
                state: a.state,
                zip_code: a.zip_code,
                country: a.country,
            }),
            status_logs: logs
                .into_iter()
                .map(StatusLogEntry::try_from)
                .collect::<Result<_, _>>()?,
        }))
    }

    async fn fetch_orders(&self, query: OrderQuery) -> Result<Page<OrderView>, StoreError> {
        let filter = "WHERE ($1::text IS NULL OR o.status = $1) \
                      AND ($2::text IS NULL OR o.patient_id = $2)";
        let list_sql = format!(
            "SELECT {ORDER_COLUMNS}, {VIEW_EXTRAS}, rx.compound_id AS rx_compound_id \
             {ORDER_VIEW_JOINS} {filter} \
             ORDER BY o.created_at {dir}, o.id {dir} LIMIT $3 OFFSET $4",
            dir = direction(query.sort),
        );
        let count_sql = format!("SELECT COUNT(*) FROM orders o {filter}");
        let status = query.status.map(OrderStatus::as_str);
        let patient = query.patient.as_ref().map(PatientId::as_str);
        let (limit, offset) = window(query.page);

        let (rows, (count,)) = futures::try_join!(
            sqlx::query_as::<_, OrderViewRow>(&list_sql)
                .bind(status)
                .bind(patient)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
            sqlx::query_as::<_, (i64,)>(&count_sql)
                .bind(status)
                .bind(patient)
                .fetch_one(&self.pool),
        )?;

        let items = rows
            .into_iter()
            .map(|row| row.into_parts().map(|(_, view, _)| view))
            .collect::<Result<_, _>>()?;
        Ok(Page {
            items,
            total: total(count),
        })
    }

    async fn fetch_prescriptions(
        &self,
        query: PrescriptionQuery,
    ) -> Result<Page<PrescriptionView>, StoreError> {
        let filter = "WHERE ($1::text IS NULL OR rx.status = $1) \
                      AND ($2::text IS NULL OR rx.provider_id = $2) \
                      AND ($3::text IS NULL OR rx.patient_id = $3)";
        let list_sql = format!(
            "SELECT {PRESCRIPTION_COLUMNS}, {VIEW_EXTRAS} {PRESCRIPTION_VIEW_JOINS} {filter} \
             ORDER BY rx.prescribed_at {dir}, rx.id {dir} LIMIT $4 OFFSET $5",
            dir = direction(query.sort),
        );
        let count_sql = format!("SELECT COUNT(*) FROM prescriptions rx {filter}");
        let status = query.status.map(|s| s.as_str());
        let provider = query.provider.as_ref().map(ProviderId::as_str);
        let patient = query.patient.as_ref().map(PatientId::as_str);
        let (limit, offset) = window(query.page);

        let (rows, (count,)) = futures::try_join!(
            sqlx::query_as::<_, PrescriptionViewRow>(&list_sql)
                .bind(status)
                .bind(provider)
                .bind(patient)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool),
            sqlx::query_as::<_, (i64,)>(&count_sql)
                .bind(status)
                .bind(provider)
                .bind(patient)
                .fetch_one(&self.pool),
        )?;

        let items = rows
            .into_iter()
            .map(PrescriptionView::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Page {
            items,
            total: total(count),
        })
    }

    async fn commit_batch(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for write in writes {
            let kind = write.kind();
            if let Err(err) = apply(&mut tx, write).await {
                tracing::warn!(write = kind, error = %err, "rolling back batch");
                return Err(err);
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

impl PharmacyStore for PostgresStore {
    fn find_order(&self, id: OrderId) -> StoreFuture<'_, Option<OrderRecord>> {
        Box::pin(async move {
            let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1");
            sqlx::query_as::<_, OrderRow>(&sql)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?
                .map(OrderRecord::try_from)
                .transpose()
        })
    }

    fn find_prescription(&self, id: PrescriptionId) -> StoreFuture<'_, Option<PrescriptionRecord>> {
        Box::pin(async move {
            let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions rx WHERE rx.id = $1");
            sqlx::query_as::<_, PrescriptionRow>(&sql)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?
                .map(PrescriptionRecord::try_from)
                .transpose()
        })
    }

    fn find_patient(&self, id: PatientId) -> StoreFuture<'_, Option<Patient>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, PatientRow>(
                "SELECT id, first_name, last_name, date_of_birth, address_state \
                 FROM patients WHERE id = $1",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(|r| Patient {
                id: PatientId::new(r.id),
                first_name: r.first_name,
                last_name: r.last_name,
                date_of_birth: r.date_of_birth,
                state: r.address_state,
            }))
        })
    }

    fn find_compound(&self, id: CompoundId) -> StoreFuture<'_, Option<Compound>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, CompoundRow>(
                "SELECT id, name, dosage_form, strength, cash_price_cents, is_active \
                 FROM compounds WHERE id = $1",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row.map(|r| Compound {
                id: CompoundId::new(r.id),
                name: r.name,
                dosage_form: r.dosage_form,
                strength: r.strength,
                cash_price: r.cash_price_cents.map(Money::from_cents),
                is_active: r.is_active,
            }))
        })
    }

    fn provider_licensed_in(
        &self,
        provider: ProviderId,
        state: String,
        at: DateTime<Utc>,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let (licensed,): (bool,) = sqlx::query_as(
                "SELECT EXISTS( \
                     SELECT 1 FROM state_licenses \
                     WHERE provider_id = $1 AND upper(state) = upper($2) AND is_active \
                       AND (expires_at IS NULL OR expires_at > $3))",
            )
            .bind(provider.as_str())
            .bind(state)
            .bind(at)
            .fetch_one(&self.pool)
            .await?;
            Ok(licensed)
        })
    }

    fn order_view(&self, id: OrderId) -> StoreFuture<'_, Option<OrderView>> {
        Box::pin(async move {
            Ok(self
                .fetch_order_view(&id)
                .await?
                .map(|(_, view, _)| view))
        })
    }

    fn order_detail(&self, id: OrderId) -> StoreFuture<'_, Option<OrderDetail>> {
        Box::pin(self.fetch_order_detail(id))
    }

    fn prescription_view(&self, id: PrescriptionId) -> StoreFuture<'_, Option<PrescriptionView>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {PRESCRIPTION_COLUMNS}, {VIEW_EXTRAS} {PRESCRIPTION_VIEW_JOINS} WHERE rx.id = $1"
            );
            sqlx::query_as::<_, PrescriptionViewRow>(&sql)
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?
                .map(PrescriptionView::try_from)
                .transpose()
        })
    }

    fn list_orders(&self, query: OrderQuery) -> StoreFuture<'_, Page<OrderView>> {
        Box::pin(self.fetch_orders(query))
    }

    fn list_prescriptions(&self, query: PrescriptionQuery) -> StoreFuture<'_, Page<PrescriptionView>> {
        Box::pin(self.fetch_prescriptions(query))
    }

    fn compounding_members(&self) -> StoreFuture<'_, Vec<BatchMember>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, MemberRow>(
                "SELECT o.id, o.order_number, o.status, o.created_at, \
                     c.id AS compound_id, c.name AS compound_name, \
                     c.dosage_form AS compound_dosage_form, c.strength AS compound_strength \
                 FROM orders o \
                 JOIN prescriptions rx ON rx.id = o.prescription_id \
                 JOIN compounds c ON c.id = rx.compound_id \
                 WHERE o.status IN ('compounding', 'quality_check') \
                 ORDER BY o.created_at ASC",
            )
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter()
                .map(|r| -> Result<BatchMember, StoreError> {
                    Ok(BatchMember {
                        order_id: OrderId::new(r.id),
                        order_number: r.order_number,
                        status: r
                            .status
                            .parse()
                            .map_err(|e| StoreError::Corrupt(format!("{e}")))?,
                        created_at: r.created_at,
                        compound: CompoundSummary {
                            id: CompoundId::new(r.compound_id),
                            name: r.compound_name,
                            dosage_form: r.compound_dosage_form,
                            strength: r.compound_strength,
                        },
                    })
                })
                .collect()
        })
    }

    fn commit(&self, writes: Vec<Write>) -> StoreFuture<'_, ()> {
        Box::pin(self.commit_batch(writes))
    }
}

impl ActorResolver for PostgresStore {
    fn resolve(&self, subject: &str) -> StoreFuture<'_, Option<Actor>> {
        let subject = subject.to_string();
        Box::pin(async move {
            let row = sqlx::query_as::<_, ActorRow>(
                "SELECT u.id, u.role, p.id AS patient_id, pr.id AS provider_id \
                 FROM users u \
                 LEFT JOIN patients p ON p.user_id = u.id \
                 LEFT JOIN providers pr ON pr.user_id = u.id \
                 WHERE u.subject = $1",
            )
            .bind(subject)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };
            let role: Role = row.role.parse().map_err(StoreError::Corrupt)?;
            let mut actor = Actor::new(row.id, role);
            actor.patient_id = row.patient_id.map(PatientId::new);
            actor.provider_id = row.provider_id.map(ProviderId::new);
            Ok(Some(actor))
        })
    }
}
