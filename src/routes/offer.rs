//! Price offer route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn offer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/offers", post(submit_offer).get(list_offers))
        .route("/api/offers/:id", get(get_offer))
        .route("/api/offers/:id/accept", post(accept_offer))
        .route("/api/offers/:id/reject", post(reject_offer))
        .route("/api/offers/:id/checkout", post(checkout_offer))
}
