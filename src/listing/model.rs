//! Listing models and request DTOs

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Listing row (`watches` table)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: String,
    /// Fixed price, or starting price for auctions (Rappen)
    pub price: i64,
    pub buy_now_price: Option<i64>,
    pub is_auction: bool,
    pub auction_start: Option<DateTime<Utc>>,
    pub auction_end: Option<DateTime<Utc>>,
    pub moderation_status: ModerationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "moderation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
    Blocked,
}

/// Where an auction stands relative to a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionPhase {
    NotAuction,
    Scheduled,
    Running,
    Ended,
}

impl Listing {
    pub fn auction_phase(&self, now: DateTime<Utc>) -> AuctionPhase {
        if !self.is_auction {
            return AuctionPhase::NotAuction;
        }
        if self.auction_start.is_some_and(|start| now < start) {
            return AuctionPhase::Scheduled;
        }
        match self.auction_end {
            Some(end) if now >= end => AuctionPhase::Ended,
            _ => AuctionPhase::Running,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.moderation_status == ModerationStatus::Approved
    }
}

/// Listing with the figures buyers see next to it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub current_price: i64,
    pub bid_count: i64,
    pub highest_bidder_id: Option<Uuid>,
    pub auction_phase: AuctionPhase,
    pub is_sold: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    #[validate(length(min = 3, max = 120))]
    pub title: String,
    #[validate(length(max = 10000))]
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 1))]
    pub price: i64,
    pub buy_now_price: Option<i64>,
    #[serde(default)]
    pub is_auction: bool,
    pub auction_start: Option<DateTime<Utc>>,
    pub auction_end: Option<DateTime<Utc>>,
}

/// Partial update; absent fields stay untouched, `"buyNowPrice": null` clears it
#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    #[validate(length(min = 3, max = 120))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    pub price: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub buy_now_price: Option<Option<i64>>,
    pub is_auction: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub auction_start: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub auction_end: Option<Option<DateTime<Utc>>>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateListingRequest {
    pub status: ModerationStatus,
}

/// Query parameters for browsing listings
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListListingsQuery {
    pub seller_id: Option<Uuid>,
    pub is_auction: Option<bool>,
    pub status: Option<ModerationStatus>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Rows removed by an admin delete
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeletionSummary {
    pub bids: u64,
    pub favorites: u64,
    pub price_offers: u64,
    pub dispute_comments: u64,
    pub purchases: u64,
    pub messages: u64,
    pub categories: u64,
    pub views: u64,
    pub reports: u64,
    pub notifications: u64,
    pub invoice_items_unlinked: u64,
}
