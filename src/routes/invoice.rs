//! Invoice and notification route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/api/invoices", get(list_invoices))
        .route("/api/invoices/check-overdue", post(check_overdue))
        .route("/api/invoices/webhook", post(payment_webhook))
        .route("/api/invoices/:id", get(get_invoice))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id/read", post(mark_read))
}
