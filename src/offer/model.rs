//! Price offer models and request DTOs

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Buyer's counter-price proposal on a fixed-price listing
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PriceOffer {
    pub id: Uuid,
    pub watch_id: Uuid,
    pub buyer_id: Uuid,
    pub amount: i64,
    pub message: Option<String>,
    pub status: OfferStatus,
    pub expires_at: DateTime<Utc>,
    /// Set once the buyer checks out; an offer sells the item at most once
    pub purchase_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "offer_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl PriceOffer {
    /// Status as the parties see it; a pending offer past its expiry reads as expired
    pub fn effective_status(&self, now: DateTime<Utc>) -> OfferStatus {
        if self.status == OfferStatus::Pending && self.expires_at <= now {
            OfferStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.purchase_id.is_none()
            && matches!(
                self.effective_status(now),
                OfferStatus::Pending | OfferStatus::Accepted
            )
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub watch_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub message: &'static str,
    pub offer: PriceOffer,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfferListType {
    #[default]
    Sent,
    Received,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListOffersQuery {
    #[serde(rename = "type", default)]
    pub list_type: OfferListType,
    pub watch_id: Option<Uuid>,
}
