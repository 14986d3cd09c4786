//! Purchase and dispute route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn purchase_routes() -> Router<AppState> {
    Router::new()
        .route("/api/purchases", get(list_purchases))
        .route("/api/purchases/:id", get(get_purchase))
        .route("/api/purchases/:id/confirm-receipt", post(confirm_receipt))
        .route("/api/purchases/:id/cancel", post(cancel_purchase))
        .route("/api/purchases/:id/dispute", post(open_dispute))
        .route(
            "/api/purchases/:id/dispute/comments",
            get(list_comments).post(add_comment),
        )
        .route("/api/purchases/:id/dispute/withdraw", post(withdraw_dispute))
        .route("/api/disputes/:id", get(get_dispute))
        .route("/api/admin/disputes", get(list_disputes))
        .route("/api/admin/disputes/:id/resolve", post(resolve_dispute))
        .route("/api/admin/disputes/:id/close", post(close_dispute))
}
