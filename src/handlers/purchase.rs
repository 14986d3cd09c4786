//! Purchase handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::PaginatedResponse;
use crate::purchase::{
    CancelPurchaseRequest, ListPurchasesQuery, PurchaseService, PurchaseSummary,
};

pub async fn list_purchases(
    State(service): State<Arc<PurchaseService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<ListPurchasesQuery>,
) -> Result<Json<PaginatedResponse<PurchaseSummary>>, ApiError> {
    let result = service.list_purchases(&actor, &query).await?;
    Ok(Json(result))
}

pub async fn get_purchase(
    State(service): State<Arc<PurchaseService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseSummary>, ApiError> {
    let purchase = service.get_purchase(id, &actor).await?;
    Ok(Json(purchase))
}

pub async fn confirm_receipt(
    State(service): State<Arc<PurchaseService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let purchase = service.confirm_receipt(id, &actor).await?;
    Ok(Json(json!({ "message": "Receipt confirmed", "purchase": purchase })))
}

pub async fn cancel_purchase(
    State(service): State<Arc<PurchaseService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<CancelPurchaseRequest>>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = request.unwrap_or_default();
    request.validate()?;
    let purchase = service.cancel_purchase(id, &actor, &request).await?;
    Ok(Json(json!({ "message": "Purchase cancelled", "purchase": purchase })))
}
