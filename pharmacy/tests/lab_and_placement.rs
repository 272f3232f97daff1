//! Compounding lab and patient order placement.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{
    COMPOUND_A, COMPOUND_B, PATIENT, Pharmacy, RX, address, other_patient_actor, patient_actor,
    prescription, technician,
};
use rx_dispatch_pharmacy::types::{
    Money, OrderQuery, OrderStatus, PageRequest, PrescriptionId, PrescriptionStatus, SortOrder,
};

#[tokio::test]
async fn batches_group_by_compound_with_progress() {
    let pharmacy = Pharmacy::new();
    pharmacy.order_in("ord-1", OrderStatus::QualityCheck, COMPOUND_A);
    pharmacy.order_in("ord-2", OrderStatus::Compounding, COMPOUND_A);
    pharmacy.order_in("ord-3", OrderStatus::QualityCheck, COMPOUND_B);
    pharmacy.order_in("ord-4", OrderStatus::Packaging, COMPOUND_B);

    let report = pharmacy.service.batches(&technician()).await.unwrap();

    assert_eq!(report.total_batches, 2);
    assert_eq!(report.total_orders, 3);

    let a = &report.batches[0];
    assert_eq!(a.compound_id.as_str(), COMPOUND_A);
    assert_eq!(a.order_count, 2);
    assert_eq!(a.statuses.compounding, 1);
    assert_eq!(a.statuses.quality_check, 1);
    assert_eq!(a.progress, 50);
    assert_eq!(a.current_step, "Compounding");

    let b = &report.batches[1];
    assert_eq!(b.compound_id.as_str(), COMPOUND_B);
    assert_eq!(b.statuses.compounding, 0);
    assert_eq!(b.statuses.quality_check, 1);
    assert_eq!(b.progress, 100);
    assert_eq!(b.current_step, "Quality Check");
}

#[tokio::test]
async fn batches_reflect_each_read() {
    let pharmacy = Pharmacy::new();
    let id = pharmacy.order_in("ord-1", OrderStatus::Compounding, COMPOUND_A);
    let staff = technician();

    let before = pharmacy.service.batches(&staff).await.unwrap();
    assert_eq!(before.batches[0].progress, 0);

    pharmacy
        .service
        .advance_compounding(&staff, id, "quality_check", None)
        .await
        .unwrap();

    let after = pharmacy.service.batches(&staff).await.unwrap();
    assert_eq!(after.batches[0].progress, 100);
}

#[tokio::test]
async fn lab_moves_through_qc_and_back() {
    let pharmacy = Pharmacy::new();
    let id = pharmacy.order_in("ord-1", OrderStatus::Compounding, COMPOUND_A);
    let staff = technician();

    for (to, expected) in [
        ("quality_check", OrderStatus::QualityCheck),
        ("compounding", OrderStatus::Compounding),
        ("quality_check", OrderStatus::QualityCheck),
        ("packaging", OrderStatus::Packaging),
    ] {
        let view = pharmacy
            .service
            .advance_compounding(&staff, id.clone(), to, Some(format!("to {to}")))
            .await
            .unwrap();
        assert_eq!(view.status, expected);
    }
    assert_eq!(pharmacy.store.status_logs(&id).len(), 4);

    // Packaging is outside the lab's reach
    let err = pharmacy
        .service
        .advance_compounding(&staff, id.clone(), "quality_check", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");
}

#[tokio::test]
async fn lab_cannot_skip_qc_or_leave_its_slice() {
    let pharmacy = Pharmacy::new();
    let id = pharmacy.order_in("ord-1", OrderStatus::Compounding, COMPOUND_A);
    let staff = technician();

    let skip = pharmacy
        .service
        .advance_compounding(&staff, id.clone(), "packaging", None)
        .await
        .unwrap_err();
    assert_eq!(skip.code(), "INVALID_TRANSITION");

    let outside = pharmacy
        .service
        .advance_compounding(&staff, id.clone(), "shipped", None)
        .await
        .unwrap_err();
    assert_eq!(outside.code(), "BAD_REQUEST");

    assert!(pharmacy.store.status_logs(&id).is_empty());
}

#[tokio::test]
async fn lab_refuses_orders_outside_compounding() {
    let pharmacy = Pharmacy::new();
    let id = pharmacy.order_in("ord-1", OrderStatus::Processing, COMPOUND_A);

    let err = pharmacy
        .service
        .advance_compounding(&technician(), id.clone(), "quality_check", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");

    let detail = pharmacy
        .service
        .compounding_detail(&technician(), id)
        .await
        .unwrap_err();
    assert_eq!(detail.code(), "INVALID_STATE");
}

#[tokio::test]
async fn placing_an_order_consumes_a_refill() {
    let pharmacy = Pharmacy::new();
    let rx = PrescriptionId::new(RX);

    let detail = pharmacy
        .service
        .place_order(&patient_actor(), rx.clone(), address())
        .await
        .unwrap();

    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.total_amount, Money::from_cents(4_500));
    assert!(detail.order.order_number.starts_with("ORD-"));
    assert_eq!(detail.ship_address.as_ref().map(|a| a.city.as_str()), Some("Austin"));
    assert_eq!(detail.status_logs.len(), 1);
    assert_eq!(detail.status_logs[0].note.as_deref(), Some("Order created"));
    assert!(detail.status_logs[0].created_by.is_none());

    assert_eq!(pharmacy.store.prescription(&rx).unwrap().refills_used, 1);
    assert_eq!(pharmacy.store.order_count(), 1);
}

#[tokio::test]
async fn exhausted_prescription_is_refused_before_any_write() {
    let pharmacy = Pharmacy::new();
    let mut used_up = prescription("rx-used", PATIENT, COMPOUND_A, PrescriptionStatus::Verified);
    used_up.refills_used = 2;
    pharmacy.store.seed_prescription(used_up);

    let err = pharmacy
        .service
        .place_order(&patient_actor(), PrescriptionId::new("rx-used"), address())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "BAD_REQUEST");
    assert_eq!(err.to_string(), "No refills remaining on this prescription");
    assert_eq!(pharmacy.store.order_count(), 0);
    assert_eq!(pharmacy.store.commit_count(), 0);
    assert_eq!(
        pharmacy
            .store
            .prescription(&PrescriptionId::new("rx-used"))
            .unwrap()
            .refills_used,
        2
    );
}

#[tokio::test]
async fn placement_checks_ownership_and_status() {
    let pharmacy = Pharmacy::new();
    pharmacy.store.seed_prescription(prescription(
        "rx-cancelled",
        PATIENT,
        COMPOUND_A,
        PrescriptionStatus::Cancelled,
    ));

    let cancelled = pharmacy
        .service
        .place_order(&patient_actor(), PrescriptionId::new("rx-cancelled"), address())
        .await
        .unwrap_err();
    assert_eq!(cancelled.to_string(), "Cannot order from a cancelled prescription");

    let foreign = pharmacy
        .service
        .place_order(&other_patient_actor(), PrescriptionId::new(RX), address())
        .await
        .unwrap_err();
    assert_eq!(foreign.code(), "BAD_REQUEST");
    assert_eq!(foreign.to_string(), "Prescription not found");

    assert_eq!(pharmacy.store.order_count(), 0);
}

#[tokio::test]
async fn bad_address_is_a_validation_error() {
    let pharmacy = Pharmacy::new();
    let mut bad = address();
    bad.zip_code = "7870".into();
    bad.state = "Texas".into();

    let err = pharmacy
        .service
        .place_order(&patient_actor(), PrescriptionId::new(RX), bad)
        .await
        .unwrap_err();

    let rx_dispatch_pharmacy::WorkflowError::Validation(fields) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(fields.contains_key("shippingAddress.zipCode"));
    assert!(fields.contains_key("shippingAddress.state"));
}

#[tokio::test]
async fn staff_cannot_place_patient_orders() {
    let pharmacy = Pharmacy::new();
    let err = pharmacy
        .service
        .place_order(&technician(), PrescriptionId::new(RX), address())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
    assert_eq!(err.to_string(), "Patient profile not found");
}

#[tokio::test]
async fn patients_see_only_their_own_orders() {
    let pharmacy = Pharmacy::new();
    let id = pharmacy.order_in("ord-1", OrderStatus::Shipped, COMPOUND_A);

    let mine = pharmacy
        .service
        .patient_order(&patient_actor(), id.clone())
        .await
        .unwrap();
    assert_eq!(mine.order.id, id);

    let theirs = pharmacy
        .service
        .patient_order(&other_patient_actor(), id)
        .await
        .unwrap_err();
    assert_eq!(theirs.code(), "NOT_FOUND");

    let page = pharmacy
        .service
        .patient_orders(
            &other_patient_actor(),
            OrderQuery {
                status: None,
                patient: None,
                sort: SortOrder::Desc,
                page: PageRequest {
                    page: 1,
                    page_size: 20,
                },
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}
