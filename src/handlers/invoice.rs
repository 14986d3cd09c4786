//! Invoice handlers

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::invoice::{Invoice, InvoiceService, InvoiceWithItems, OverdueSweepResult, PaymentWebhook};
use crate::middleware::{AdminUser, AuthenticatedUser};
use crate::models::{PaginatedResponse, PaginationParams};
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// Invoices issued to the caller as a seller
pub async fn list_invoices(
    State(service): State<Arc<InvoiceService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<Invoice>>, ApiError> {
    let result = service.list_invoices(actor.user_id, &params).await?;
    Ok(Json(result))
}

pub async fn get_invoice(
    State(service): State<Arc<InvoiceService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceWithItems>, ApiError> {
    let invoice = service.get_invoice(id, &actor).await?;
    Ok(Json(invoice))
}

pub async fn check_overdue(
    State(service): State<Arc<InvoiceService>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<OverdueSweepResult>, ApiError> {
    let updated = service.check_overdue().await?;
    Ok(Json(OverdueSweepResult { updated }))
}

/// Payment processor callback, authenticated by a shared secret header
pub async fn payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentWebhook>,
) -> Result<Json<Value>, ApiError> {
    match app_state.webhook_secret.as_deref() {
        Some(secret) if !secret.is_empty() => {
            let provided = headers
                .get(WEBHOOK_SECRET_HEADER)
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();

            if provided != secret {
                tracing::warn!(invoice_number = %payload.invoice_number, "Webhook with bad secret");
                return Err(ApiError::Unauthorized(
                    "Invalid webhook secret".to_string(),
                ));
            }
        }
        _ => {
            // Fail closed until a secret is configured
            tracing::error!("Webhook secret not configured - rejecting request");
            return Err(ApiError::ServiceUnavailable(
                "Webhook not configured".to_string(),
            ));
        }
    }

    payload.validate()?;
    let invoice = app_state.invoice_service.mark_paid(&payload).await?;
    Ok(Json(json!({ "message": "Payment recorded", "invoice": invoice })))
}
