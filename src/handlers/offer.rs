//! Price offer handlers

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
use crate::middleware::AuthenticatedUser;
use crate::offer::{CreateOfferRequest, ListOffersQuery, OfferResponse, OfferService, PriceOffer};
use crate::purchase::CheckoutRequest;

/// 201 for a new offer, 200 when the buyer's pending offer was revised
pub async fn submit_offer(
    State(service): State<Arc<OfferService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Json(request): Json<CreateOfferRequest>,
) -> Result<(StatusCode, Json<OfferResponse>), ApiError> {
    request.validate()?;
    let submission = service.create_or_update_offer(&actor, &request).await?;

    let (status, message) = if submission.created {
        (StatusCode::CREATED, "Offer submitted")
    } else {
        (StatusCode::OK, "Offer updated")
    };
    Ok((
        status,
        Json(OfferResponse {
            message,
            offer: submission.offer,
        }),
    ))
}

pub async fn list_offers(
    State(service): State<Arc<OfferService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<ListOffersQuery>,
) -> Result<Json<Vec<PriceOffer>>, ApiError> {
    let offers = service.list_offers(&actor, &query).await?;
    Ok(Json(offers))
}

pub async fn get_offer(
    State(service): State<Arc<OfferService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PriceOffer>, ApiError> {
    let offer = service.get_offer(id, &actor).await?;
    Ok(Json(offer))
}

pub async fn accept_offer(
    State(service): State<Arc<OfferService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferResponse>, ApiError> {
    let offer = service.accept_offer(id, &actor).await?;
    Ok(Json(OfferResponse {
        message: "Offer accepted",
        offer,
    }))
}

pub async fn reject_offer(
    State(service): State<Arc<OfferService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferResponse>, ApiError> {
    let offer = service.reject_offer(id, &actor).await?;
    Ok(Json(OfferResponse {
        message: "Offer rejected",
        offer,
    }))
}

pub async fn checkout_offer(
    State(service): State<Arc<OfferService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = request.unwrap_or_default();
    let purchase = service
        .checkout_offer(id, &actor, request.payment_protection)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Purchase completed", "purchase": purchase })),
    ))
}
