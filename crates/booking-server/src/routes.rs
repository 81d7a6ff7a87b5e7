//! Router

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    create_booking, create_checkout, delete_booking, get_plan, get_salon, get_usage, health_check,
    list_bookings, stripe_webhook,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Public booking page
        .route("/api/salons/{salon}", get(get_salon))
        .route("/api/salons/{salon}/plan", get(get_plan))
        .route("/api/salons/{salon}/usage", get(get_usage))
        .route(
            "/api/salons/{salon}/bookings",
            post(create_booking).get(list_bookings),
        )
        .route(
            "/api/salons/{salon}/bookings/{booking_id}",
            delete(delete_booking),
        )

        // Payments
        .route("/api/checkout", post(create_checkout))
        .route("/webhook/stripe", post(stripe_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
