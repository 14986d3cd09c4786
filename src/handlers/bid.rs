//! Bid and buy-now handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::bid::{BidHistory, BidService, MyBidEntry, PlaceBidRequest};
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::purchase::CheckoutRequest;

pub async fn bid_history(
    State(service): State<Arc<BidService>>,
    Path(watch_id): Path<Uuid>,
) -> Result<Json<BidHistory>, ApiError> {
    let history = service.bid_history(watch_id).await?;
    Ok(Json(history))
}

pub async fn place_bid(
    State(service): State<Arc<BidService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(watch_id): Path<Uuid>,
    Json(request): Json<PlaceBidRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    request.validate()?;
    let bid = service.place_bid(watch_id, &actor, request.amount).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Bid placed", "bid": bid })),
    ))
}

pub async fn buy_now(
    State(service): State<Arc<BidService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(watch_id): Path<Uuid>,
    request: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = request.unwrap_or_default();
    let purchase = service
        .buy_now(watch_id, &actor, request.payment_protection)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Purchase completed", "purchase": purchase })),
    ))
}

pub async fn my_bids(
    State(service): State<Arc<BidService>>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> Result<Json<Vec<MyBidEntry>>, ApiError> {
    let bids = service.my_bids(&actor).await?;
    Ok(Json(bids))
}
