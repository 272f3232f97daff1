//! Shared fixtures for the pharmacy integration tests.
//!
//! One patient in Texas, one provider licensed there, two active compounds
//! and a verified prescription with two refills.

#![allow(dead_code)]

use chrono::Duration;
use rx_dispatch_pharmacy::identity::Actor;
use rx_dispatch_pharmacy::role::Role;
use rx_dispatch_pharmacy::service::PharmacyService;
use rx_dispatch_pharmacy::store::InMemoryStore;
use rx_dispatch_pharmacy::types::{
    Compound, CompoundId, Money, OrderId, OrderRecord, OrderStatus, Patient, PatientId,
    PrescriptionId, PrescriptionRecord, PrescriptionStatus, ProviderId, ProviderLicense,
    ShippingAddress,
};
use rx_dispatch_pharmacy::workflow::WorkflowEnvironment;
use rx_dispatch_testing::{SequentialIds, SteppingClock, test_epoch};
use std::sync::Arc;

pub const PATIENT: &str = "pat-1";
pub const OTHER_PATIENT: &str = "pat-2";
pub const PROVIDER: &str = "prov-1";
pub const COMPOUND_A: &str = "cmp-a";
pub const COMPOUND_B: &str = "cmp-b";
pub const RX: &str = "rx-1";

pub struct Pharmacy {
    pub store: Arc<InMemoryStore>,
    pub service: PharmacyService,
}

impl Pharmacy {
    pub fn new() -> Self {
        rx_dispatch_testing::init_test_tracing();

        let store = Arc::new(InMemoryStore::new());
        store.seed_patient(patient(PATIENT, "Ada", "Lovelace", Some("TX")));
        store.seed_patient(patient(OTHER_PATIENT, "Alan", "Turing", None));
        store.seed_compound(compound(COMPOUND_A, "Progesterone", "capsule", true));
        store.seed_compound(compound(COMPOUND_B, "Tretinoin", "cream", true));
        store.seed_prescription(prescription(RX, PATIENT, COMPOUND_A, PrescriptionStatus::Verified));
        store.seed_license(ProviderLicense {
            provider_id: ProviderId::new(PROVIDER),
            state: "TX".into(),
            is_active: true,
            expires_at: Some(test_epoch() + Duration::days(365)),
        });

        let env = WorkflowEnvironment::new(
            Arc::new(SteppingClock::new(test_epoch(), Duration::seconds(1))),
            Arc::new(SequentialIds::new("id")),
        );
        let service = PharmacyService::new(store.clone(), env);
        Self { store, service }
    }

    /// Seed an order in `status` against a fresh prescription for `compound`.
    ///
    /// Orders are spaced a minute apart in seeding order.
    pub fn order_in(&self, id: &str, status: OrderStatus, compound: &str) -> OrderId {
        let rx_id = format!("rx-{id}");
        self.store.seed_prescription(prescription(
            &rx_id,
            PATIENT,
            compound,
            PrescriptionStatus::Verified,
        ));
        let minutes = i64::try_from(self.store.order_count()).unwrap_or_default();
        self.store.seed_order(OrderRecord {
            id: OrderId::new(id),
            order_number: format!("ORD-{}", id.to_uppercase()),
            patient_id: PatientId::new(PATIENT),
            prescription_id: PrescriptionId::new(rx_id),
            status,
            total_amount: Money::from_cents(4_500),
            created_at: test_epoch() - Duration::days(1) + Duration::minutes(minutes),
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            tracking_number: None,
            carrier: None,
        });
        OrderId::new(id)
    }
}

pub fn patient(id: &str, first: &str, last: &str, state: Option<&str>) -> Patient {
    Patient {
        id: PatientId::new(id),
        first_name: first.into(),
        last_name: last.into(),
        date_of_birth: None,
        state: state.map(str::to_string),
    }
}

pub fn compound(id: &str, name: &str, form: &str, active: bool) -> Compound {
    Compound {
        id: CompoundId::new(id),
        name: name.into(),
        dosage_form: form.into(),
        strength: Some("100mg".into()),
        cash_price: Some(Money::from_cents(4_500)),
        is_active: active,
    }
}

pub fn prescription(
    id: &str,
    patient: &str,
    compound: &str,
    status: PrescriptionStatus,
) -> PrescriptionRecord {
    PrescriptionRecord {
        id: PrescriptionId::new(id),
        patient_id: PatientId::new(patient),
        provider_id: ProviderId::new(PROVIDER),
        compound_id: CompoundId::new(compound),
        quantity: 30,
        directions: "Take one capsule nightly".into(),
        status,
        refills: 2,
        refills_used: 0,
        prescribed_at: test_epoch() - Duration::days(7),
        verified_at: None,
        verified_by: None,
    }
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        street1: "1 Main St".into(),
        street2: None,
        city: "Austin".into(),
        state: "TX".into(),
        zip_code: "78701".into(),
        country: "US".into(),
    }
}

pub fn pharmacist() -> Actor {
    Actor::new("user-pharmacist", Role::Pharmacist)
}

pub fn technician() -> Actor {
    Actor::new("user-tech", Role::Technician)
}

pub fn patient_actor() -> Actor {
    Actor::new("user-patient", Role::Patient).with_patient(PatientId::new(PATIENT))
}

pub fn other_patient_actor() -> Actor {
    Actor::new("user-patient-2", Role::Patient).with_patient(PatientId::new(OTHER_PATIENT))
}

pub fn provider_actor() -> Actor {
    Actor::new("user-provider", Role::Prescriber).with_provider(ProviderId::new(PROVIDER))
}
