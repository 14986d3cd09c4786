//! Price offer negotiation rules
//!
//! Every check here runs before the service writes anything, so a rejected
//! offer never leaves a row behind.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::model::{OfferStatus, PriceOffer};
use crate::error::ApiError;
use crate::listing::Listing;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    #[error("This item has already been sold")]
    AlreadySold,

    #[error("You cannot make an offer on your own listing")]
    OwnListing,

    #[error("Price offers are not possible on auctions")]
    AuctionListing,

    #[error("This listing is not available")]
    ListingNotAvailable,

    #[error("Offer must be at least {min} Rappen")]
    AmountTooLow { min: i64 },

    #[error("Offer must be below the listing price")]
    AmountNotBelowPrice,

    #[error("You already have {max} active offers on this listing")]
    TooManyActive { max: i64 },

    #[error("Only the seller can respond to this offer")]
    NotSeller,

    #[error("Only the buyer can complete this offer")]
    NotBuyer,

    #[error("Offer is no longer pending")]
    NotPending,

    #[error("Offer has expired")]
    Expired,

    #[error("Offer has not been accepted")]
    NotAccepted,

    #[error("This offer has already been checked out")]
    AlreadyCheckedOut,
}

impl From<OfferError> for ApiError {
    fn from(err: OfferError) -> Self {
        match err {
            OfferError::NotSeller | OfferError::NotBuyer => ApiError::Forbidden(err.to_string()),
            OfferError::AlreadySold
            | OfferError::NotPending
            | OfferError::Expired
            | OfferError::NotAccepted
            | OfferError::AlreadyCheckedOut => ApiError::Conflict(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

/// Negotiation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferPolicy {
    /// Lowest acceptable offer as a percentage of the listing price
    pub min_percent: i64,
    /// Active (pending or accepted) offers one buyer may hold per listing
    pub max_active: i64,
    pub ttl_hours: i64,
}

impl Default for OfferPolicy {
    fn default() -> Self {
        Self {
            min_percent: 60,
            max_active: 3,
            ttl_hours: 48,
        }
    }
}

impl OfferPolicy {
    /// Smallest amount accepted on a listing priced at `price`, rounded up to the Rappen
    pub fn min_amount(&self, price: i64) -> i64 {
        let scaled = i128::from(price) * i128::from(self.min_percent);
        i64::try_from((scaled + 99).div_euclid(100)).unwrap_or(i64::MAX)
    }

    pub fn validate_amount(&self, price: i64, amount: i64) -> Result<(), OfferError> {
        let min = self.min_amount(price);
        if amount < min {
            return Err(OfferError::AmountTooLow { min });
        }
        if amount >= price {
            return Err(OfferError::AmountNotBelowPrice);
        }
        Ok(())
    }

    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::hours(self.ttl_hours)
    }
}

/// What a submission does to the buyer's offers on a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferPlan {
    Update { offer_id: Uuid, previous_amount: i64 },
    Create,
}

impl OfferPlan {
    /// The seller hears about new offers and about changed amounts, not about resubmissions
    pub fn should_notify_seller(&self, amount: i64) -> bool {
        match self {
            OfferPlan::Create => true,
            OfferPlan::Update {
                previous_amount, ..
            } => *previous_amount != amount,
        }
    }
}

/// Decide how to handle an offer of `amount` by `buyer_id`
///
/// `existing` holds the buyer's non-final offers on this listing.
pub fn plan_offer(
    policy: &OfferPolicy,
    listing: &Listing,
    buyer_id: Uuid,
    amount: i64,
    is_sold: bool,
    existing: &[PriceOffer],
    now: DateTime<Utc>,
) -> Result<OfferPlan, OfferError> {
    if is_sold {
        return Err(OfferError::AlreadySold);
    }
    if listing.seller_id == buyer_id {
        return Err(OfferError::OwnListing);
    }
    if listing.is_auction {
        return Err(OfferError::AuctionListing);
    }
    if !listing.is_approved() {
        return Err(OfferError::ListingNotAvailable);
    }
    policy.validate_amount(listing.price, amount)?;

    // An unanswered offer is revised in place, even after it lapsed.
    let pending = existing
        .iter()
        .filter(|offer| offer.buyer_id == buyer_id && offer.status == OfferStatus::Pending)
        .max_by_key(|offer| offer.updated_at);
    if let Some(offer) = pending {
        return Ok(OfferPlan::Update {
            offer_id: offer.id,
            previous_amount: offer.amount,
        });
    }

    let active = existing
        .iter()
        .filter(|offer| offer.buyer_id == buyer_id && offer.is_active(now))
        .count() as i64;
    if active >= policy.max_active {
        return Err(OfferError::TooManyActive {
            max: policy.max_active,
        });
    }

    Ok(OfferPlan::Create)
}

/// Seller's accept/reject precondition
pub fn check_response(
    offer: &PriceOffer,
    listing: &Listing,
    seller_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), OfferError> {
    if listing.seller_id != seller_id {
        return Err(OfferError::NotSeller);
    }
    match offer.effective_status(now) {
        OfferStatus::Pending => Ok(()),
        OfferStatus::Expired => Err(OfferError::Expired),
        OfferStatus::Accepted | OfferStatus::Rejected => Err(OfferError::NotPending),
    }
}

/// Buyer's checkout precondition, checked against the locked listing
pub fn check_checkout(
    offer: &PriceOffer,
    listing: &Listing,
    buyer_id: Uuid,
) -> Result<(), OfferError> {
    if offer.buyer_id != buyer_id {
        return Err(OfferError::NotBuyer);
    }
    if offer.status != OfferStatus::Accepted {
        return Err(OfferError::NotAccepted);
    }
    if offer.purchase_id.is_some() {
        return Err(OfferError::AlreadyCheckedOut);
    }
    // Moderation may have pulled the listing after the seller accepted.
    if !listing.is_approved() {
        return Err(OfferError::ListingNotAvailable);
    }
    Ok(())
}
