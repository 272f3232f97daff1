//! Prescription review, writing and amendment.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{
    COMPOUND_A, COMPOUND_B, OTHER_PATIENT, PATIENT, PROVIDER, Pharmacy, RX, compound,
    pharmacist, prescription, provider_actor, technician,
};
use rx_dispatch_pharmacy::identity::Actor;
use rx_dispatch_pharmacy::role::Role;
use rx_dispatch_pharmacy::types::{
    CompoundId, PageRequest, PatientId, PrescriptionId, PrescriptionQuery, PrescriptionStatus,
    ProviderId, SortOrder,
};
use rx_dispatch_pharmacy::workflow::prescribing::PrescriptionDraft;

fn seed_pending(pharmacy: &Pharmacy, id: &str) -> PrescriptionId {
    pharmacy
        .store
        .seed_prescription(prescription(id, PATIENT, COMPOUND_A, PrescriptionStatus::Pending));
    PrescriptionId::new(id)
}

fn draft() -> PrescriptionDraft {
    PrescriptionDraft {
        quantity: 30,
        refills: 3,
        directions: "Apply a thin layer at bedtime".into(),
    }
}

#[tokio::test]
async fn pharmacist_verifies_pending_prescription() {
    let pharmacy = Pharmacy::new();
    let id = seed_pending(&pharmacy, "rx-p");

    let view = pharmacy.service.verify(&pharmacist(), id.clone()).await.unwrap();

    assert_eq!(view.status, PrescriptionStatus::Verified);
    assert_eq!(view.verified_by.as_ref().map(|u| u.as_str()), Some("user-pharmacist"));
    assert!(view.verified_at.is_some());
    let stored = pharmacy.store.prescription(&id).unwrap();
    assert_eq!(stored.status, PrescriptionStatus::Verified);
}

#[tokio::test]
async fn technician_cannot_verify() {
    let pharmacy = Pharmacy::new();
    let id = seed_pending(&pharmacy, "rx-p");

    let err = pharmacy.service.verify(&technician(), id.clone()).await.unwrap_err();

    assert_eq!(err.code(), "FORBIDDEN");
    assert_eq!(
        pharmacy.store.prescription(&id).unwrap().status,
        PrescriptionStatus::Pending
    );
    assert_eq!(pharmacy.store.commit_count(), 0);
}

#[tokio::test]
async fn verify_outside_pending_is_invalid_state_for_any_staff() {
    let pharmacy = Pharmacy::new();
    let staff = [
        pharmacist(),
        technician(),
        Actor::new("user-admin", Role::SystemAdmin),
    ];

    for actor in &staff {
        let err = pharmacy
            .service
            .verify(actor, PrescriptionId::new(RX))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE", "{:?}", actor.role);
    }
}

#[tokio::test]
async fn rejection_cancels_and_echoes_reason() {
    let pharmacy = Pharmacy::new();
    let id = seed_pending(&pharmacy, "rx-p");

    let view = pharmacy
        .service
        .reject(&technician(), id.clone(), Some("Dose exceeds guideline".into()))
        .await
        .unwrap();

    assert_eq!(view.status, PrescriptionStatus::Cancelled);
    assert_eq!(view.rejection_reason.as_deref(), Some("Dose exceeds guideline"));

    // Not stored: a fresh read carries no reason
    let reread = pharmacy
        .service
        .prescription_detail(&technician(), id)
        .await
        .unwrap();
    assert_eq!(reread.status, PrescriptionStatus::Cancelled);
    assert!(reread.rejection_reason.is_none());
}

#[tokio::test]
async fn rejection_needs_a_reason() {
    let pharmacy = Pharmacy::new();
    let id = seed_pending(&pharmacy, "rx-p");

    for reason in [None, Some(String::new())] {
        let err = pharmacy
            .service
            .reject(&pharmacist(), id.clone(), reason)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }
    assert_eq!(pharmacy.store.commit_count(), 0);
}

#[tokio::test]
async fn blank_but_present_reason_is_accepted() {
    let pharmacy = Pharmacy::new();
    let id = seed_pending(&pharmacy, "rx-p");

    let view = pharmacy
        .service
        .reject(&technician(), id, Some("   ".into()))
        .await
        .unwrap();

    assert_eq!(view.status, PrescriptionStatus::Cancelled);
    assert_eq!(view.rejection_reason.as_deref(), Some("   "));
    assert_eq!(pharmacy.store.commit_count(), 1);
}

#[tokio::test]
async fn unknown_prescription_is_not_found() {
    let pharmacy = Pharmacy::new();
    let err = pharmacy
        .service
        .verify(&pharmacist(), PrescriptionId::new("nope"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn review_queue_defaults_to_pending() {
    let pharmacy = Pharmacy::new();
    seed_pending(&pharmacy, "rx-p1");
    seed_pending(&pharmacy, "rx-p2");

    let page = pharmacy
        .service
        .list_prescriptions(
            &technician(),
            PrescriptionQuery {
                status: Some(PrescriptionStatus::Pending),
                provider: None,
                patient: None,
                sort: SortOrder::Asc,
                page: PageRequest {
                    page: 1,
                    page_size: 1,
                },
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].status, PrescriptionStatus::Pending);
}

#[tokio::test]
async fn provider_writes_prescription_in_licensed_state() {
    let pharmacy = Pharmacy::new();

    let view = pharmacy
        .service
        .create_prescription(
            &provider_actor(),
            PatientId::new(PATIENT),
            CompoundId::new(COMPOUND_B),
            draft(),
        )
        .await
        .unwrap();

    assert_eq!(view.status, PrescriptionStatus::Pending);
    assert_eq!(view.refills, 3);
    assert_eq!(view.refills_used, 0);
    assert_eq!(view.provider_id, ProviderId::new(PROVIDER));
    assert_eq!(view.compound.name, "Tretinoin");
    assert!(pharmacy.store.prescription(&view.id).is_some());
}

#[tokio::test]
async fn unlicensed_state_is_forbidden() {
    let pharmacy = Pharmacy::new();
    pharmacy
        .store
        .seed_patient(common::patient("pat-ca", "Grace", "Hopper", Some("CA")));

    let err = pharmacy
        .service
        .create_prescription(
            &provider_actor(),
            PatientId::new("pat-ca"),
            CompoundId::new(COMPOUND_A),
            draft(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "FORBIDDEN");
    assert_eq!(
        err.to_string(),
        "You do not have an active license to prescribe in CA"
    );
    assert_eq!(pharmacy.store.commit_count(), 0);
}

#[tokio::test]
async fn patient_without_state_skips_license_check() {
    let pharmacy = Pharmacy::new();

    let view = pharmacy
        .service
        .create_prescription(
            &provider_actor(),
            PatientId::new(OTHER_PATIENT),
            CompoundId::new(COMPOUND_A),
            draft(),
        )
        .await
        .unwrap();

    assert_eq!(view.patient.id, OTHER_PATIENT);
}

#[tokio::test]
async fn inactive_or_unknown_compound_is_refused() {
    let pharmacy = Pharmacy::new();
    pharmacy
        .store
        .seed_compound(compound("cmp-old", "Retired blend", "capsule", false));

    let inactive = pharmacy
        .service
        .create_prescription(
            &provider_actor(),
            PatientId::new(PATIENT),
            CompoundId::new("cmp-old"),
            draft(),
        )
        .await
        .unwrap_err();
    assert_eq!(inactive.code(), "FORBIDDEN");

    let unknown = pharmacy
        .service
        .create_prescription(
            &provider_actor(),
            PatientId::new(PATIENT),
            CompoundId::new("cmp-none"),
            draft(),
        )
        .await
        .unwrap_err();
    assert_eq!(unknown.code(), "NOT_FOUND");
}

#[tokio::test]
async fn draft_fields_are_validated_first() {
    let pharmacy = Pharmacy::new();
    let bad = PrescriptionDraft {
        quantity: 0,
        refills: 13,
        directions: String::new(),
    };

    let err = pharmacy
        .service
        .create_prescription(
            &provider_actor(),
            PatientId::new("nobody"),
            CompoundId::new(COMPOUND_A),
            bad,
        )
        .await
        .unwrap_err();

    let rx_dispatch_pharmacy::WorkflowError::Validation(fields) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(fields.contains_key("quantity"));
    assert!(fields.contains_key("refills"));
    assert!(fields.contains_key("directions"));
}

#[tokio::test]
async fn non_providers_cannot_prescribe() {
    let pharmacy = Pharmacy::new();
    let err = pharmacy
        .service
        .create_prescription(
            &pharmacist(),
            PatientId::new(PATIENT),
            CompoundId::new(COMPOUND_A),
            draft(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Provider profile not found");
}

#[tokio::test]
async fn amendment_locks_once_dispensing_starts() {
    let pharmacy = Pharmacy::new();
    let id = seed_pending(&pharmacy, "rx-p");

    let view = pharmacy
        .service
        .amend_prescription(&provider_actor(), id.clone(), Some(60), None)
        .await
        .unwrap();
    assert_eq!(view.quantity, 60);

    pharmacy.store.seed_prescription(prescription(
        "rx-busy",
        PATIENT,
        COMPOUND_A,
        PrescriptionStatus::Compounding,
    ));
    let err = pharmacy
        .service
        .amend_prescription(
            &provider_actor(),
            PrescriptionId::new("rx-busy"),
            None,
            Some("New directions".into()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FORBIDDEN");
    assert_eq!(
        pharmacy
            .store
            .prescription(&PrescriptionId::new("rx-busy"))
            .unwrap()
            .directions,
        "Take one capsule nightly"
    );
}

#[tokio::test]
async fn providers_only_see_their_own_prescriptions() {
    let pharmacy = Pharmacy::new();
    let mut foreign = prescription("rx-foreign", PATIENT, COMPOUND_A, PrescriptionStatus::Pending);
    foreign.provider_id = ProviderId::new("prov-2");
    pharmacy.store.seed_prescription(foreign);

    let err = pharmacy
        .service
        .provider_prescription(&provider_actor(), PrescriptionId::new("rx-foreign"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "FORBIDDEN");

    let page = pharmacy
        .service
        .provider_prescriptions(
            &provider_actor(),
            PrescriptionQuery {
                status: None,
                provider: Some(ProviderId::new("prov-2")),
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
    assert!(page.items.iter().all(|rx| rx.provider_id.as_str() == PROVIDER));
    assert_eq!(page.total, 1);
}
