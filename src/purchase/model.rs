//! Purchase models and request DTOs

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// A finalized sale. Dispute state lives on the same row.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub status: PurchaseStatus,
    pub price: i64,
    pub source: PurchaseSource,
    pub payment_protection: bool,
    pub dispute_status: DisputeStatus,
    pub dispute_deadline: Option<DateTime<Utc>>,
    pub dispute_opened_at: Option<DateTime<Utc>>,
    pub dispute_opened_by: Option<Uuid>,
    pub dispute_resolved_at: Option<DateTime<Utc>>,
    pub dispute_escalated_at: Option<DateTime<Utc>>,
    pub dispute_reason: Option<String>,
    pub dispute_description: Option<String>,
    pub dispute_attachments: Vec<String>,
    pub dispute_resolution: Option<String>,
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "purchase_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Active,
    Completed,
    Cancelled,
}

/// How the sale came about
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "purchase_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    Auction,
    BuyNow,
    Offer,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "dispute_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    None,
    Pending,
    Resolved,
    Rejected,
    Closed,
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DisputeStatus::None => "no dispute",
            DisputeStatus::Pending => "under review",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Rejected => "rejected",
            DisputeStatus::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Purchase joined with the listing title for overview pages
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub purchase: Purchase,
    pub watch_title: String,
}

/// Everything needed to record a sale
#[derive(Debug, Clone, Copy)]
pub struct NewPurchase {
    pub watch_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub price: i64,
    pub source: PurchaseSource,
    pub payment_protection: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseRole {
    #[default]
    Bought,
    Sold,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListPurchasesQuery {
    #[serde(default)]
    pub role: PurchaseRole,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase")]
pub struct CancelPurchaseRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Body of buy-now and offer checkout
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub payment_protection: bool,
}
