//! Router configuration.

use super::state::AppState;
use crate::api::{compounding, orders, patient, prescriptions, provider};
use axum::{Router, routing::get};
use rx_dispatch_web::correlation_id_layer;
use rx_dispatch_web::handlers::health_check;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Pharmacy staff routes live at the root (`/orders`, `/prescriptions`,
/// `/compounding`); portal routes under `/patient` and `/provider`. Every
/// request gets a correlation ID and a trace span.
pub fn build_router(state: AppState) -> Router {
    let pharmacy = Router::new()
        .route("/orders", get(orders::list_orders))
        .route(
            "/orders/:id",
            get(orders::get_order).patch(orders::update_order),
        )
        .route("/prescriptions", get(prescriptions::list_prescriptions))
        .route(
            "/prescriptions/:id",
            get(prescriptions::get_prescription).patch(prescriptions::review_prescription),
        )
        .route("/compounding", get(compounding::list_batches))
        .route(
            "/compounding/:id",
            get(compounding::get_compounding_order).patch(compounding::advance),
        );

    let patient = Router::new()
        .route(
            "/orders",
            get(patient::list_my_orders).post(patient::place_order),
        )
        .route("/orders/:id", get(patient::get_my_order));

    let provider = Router::new()
        .route(
            "/prescriptions",
            get(provider::list_my_prescriptions).post(provider::create_prescription),
        )
        .route(
            "/prescriptions/:id",
            get(provider::get_my_prescription).patch(provider::amend_prescription),
        );

    Router::new()
        .route("/health", get(health_check))
        .merge(pharmacy)
        .nest("/patient", patient)
        .nest("/provider", provider)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}

