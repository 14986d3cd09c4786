//! Dispute handlers
//!
//! Disputes are addressed by their purchase id on every route.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::dispute::{
    AddCommentRequest, DisputeComment, DisputeService, DisputeView, ListDisputesQuery,
    OpenDisputeRequest, ResolveDisputeRequest,
};
use crate::error::ApiError;
use crate::middleware::{AdminUser, AuthenticatedUser};
use crate::models::PaginatedResponse;

pub async fn open_dispute(
    State(service): State<Arc<DisputeService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(purchase_id): Path<Uuid>,
    Json(request): Json<OpenDisputeRequest>,
) -> Result<(StatusCode, Json<DisputeView>), ApiError> {
    request.validate()?;
    let dispute = service.open_dispute(purchase_id, &actor, &request).await?;
    Ok((StatusCode::CREATED, Json(dispute)))
}

pub async fn get_dispute(
    State(service): State<Arc<DisputeService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<DisputeView>, ApiError> {
    let dispute = service.get_dispute(purchase_id, &actor).await?;
    Ok(Json(dispute))
}

pub async fn list_comments(
    State(service): State<Arc<DisputeService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<Vec<DisputeComment>>, ApiError> {
    let comments = service.list_comments(purchase_id, &actor).await?;
    Ok(Json(comments))
}

pub async fn add_comment(
    State(service): State<Arc<DisputeService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(purchase_id): Path<Uuid>,
    Json(request): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<DisputeComment>), ApiError> {
    request.validate()?;
    let comment = service.add_comment(purchase_id, &actor, &request).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn withdraw_dispute(
    State(service): State<Arc<DisputeService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<DisputeView>, ApiError> {
    let dispute = service.withdraw_dispute(purchase_id, &actor).await?;
    Ok(Json(dispute))
}

pub async fn resolve_dispute(
    State(service): State<Arc<DisputeService>>,
    AdminUser(admin): AdminUser,
    Path(purchase_id): Path<Uuid>,
    Json(request): Json<ResolveDisputeRequest>,
) -> Result<Json<DisputeView>, ApiError> {
    request.validate()?;
    let dispute = service
        .resolve_dispute(purchase_id, &admin, &request)
        .await?;
    Ok(Json(dispute))
}

pub async fn close_dispute(
    State(service): State<Arc<DisputeService>>,
    AdminUser(admin): AdminUser,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<DisputeView>, ApiError> {
    let dispute = service.close_dispute(purchase_id, &admin).await?;
    Ok(Json(dispute))
}

pub async fn list_disputes(
    State(service): State<Arc<DisputeService>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListDisputesQuery>,
) -> Result<Json<PaginatedResponse<DisputeView>>, ApiError> {
    let result = service.list_disputes(&query).await?;
    Ok(Json(result))
}
