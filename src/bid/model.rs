//! Bid models and request DTOs

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::listing::Listing;

/// Append-only auction bid
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub bidder_id: Uuid,
    pub amount: i64,
    pub is_buy_now: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view of a listing's bids
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct BidStats {
    pub bid_count: i64,
    pub highest_amount: Option<i64>,
    pub highest_bidder_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidHistory {
    pub current_price: i64,
    pub bid_count: i64,
    pub bids: Vec<Bid>,
}

/// Where the caller stands on an auction they bid on
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MyBidStatus {
    Leading,
    Outbid,
    Ended,
}

/// Row backing the my-bids view
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MyBidRow {
    #[sqlx(flatten)]
    pub listing: Listing,
    pub my_highest_bid: i64,
    pub highest_amount: i64,
    pub highest_bidder_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyBidEntry {
    pub watch_id: Uuid,
    pub title: String,
    pub my_highest_bid: i64,
    pub current_price: i64,
    pub auction_end: Option<DateTime<Utc>>,
    pub status: MyBidStatus,
    pub won: bool,
}
