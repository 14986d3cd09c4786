//! Listing handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::listing::{
    CreateListingRequest, ListListingsQuery, Listing, ListingDetail, ListingService,
    ModerateListingRequest, ModerationStatus, UpdateListingRequest,
};
use crate::middleware::{AdminUser, AuthenticatedUser};
use crate::models::PaginatedResponse;

pub async fn create_listing(
    State(service): State<Arc<ListingService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    request.validate()?;
    let listing = service.create_listing(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// Public browse; only approved listings are shown
pub async fn list_listings(
    State(service): State<Arc<ListingService>>,
    Query(query): Query<ListListingsQuery>,
) -> Result<Json<PaginatedResponse<Listing>>, ApiError> {
    let result = service
        .list_listings(&query, ModerationStatus::Approved)
        .await?;
    Ok(Json(result))
}

/// Moderation queue; defaults to listings awaiting review
pub async fn list_listings_admin(
    State(service): State<Arc<ListingService>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListListingsQuery>,
) -> Result<Json<PaginatedResponse<Listing>>, ApiError> {
    let status = query.status.unwrap_or(ModerationStatus::Pending);
    let result = service.list_listings(&query, status).await?;
    Ok(Json(result))
}

pub async fn get_listing(
    State(service): State<Arc<ListingService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingDetail>, ApiError> {
    let detail = service.get_listing(id).await?;
    Ok(Json(detail))
}

pub async fn update_listing(
    State(service): State<Arc<ListingService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    patch.validate()?;
    let listing = service.update_listing(id, &actor, patch).await?;
    Ok(Json(listing))
}

pub async fn moderate_listing(
    State(service): State<Arc<ListingService>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ModerateListingRequest>,
) -> Result<Json<Listing>, ApiError> {
    let listing = service.moderate_listing(id, &admin, request.status).await?;
    Ok(Json(listing))
}

pub async fn delete_listing(
    State(service): State<Arc<ListingService>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let deleted = service.delete_listing(id, &admin).await?;
    Ok(Json(json!({
        "message": "Listing deleted",
        "deleted": deleted,
    })))
}
