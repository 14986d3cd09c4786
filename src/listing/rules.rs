//! Listing publication and edit rules

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::model::{CreateListingRequest, Listing, UpdateListingRequest};
use crate::error::ApiError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("Price must be greater than zero")]
    InvalidPrice,

    #[error("Buy-now price must be higher than the starting price")]
    BuyNowNotAboveStart,

    #[error("Buy-now prices are only available on auctions")]
    BuyNowOnFixedPrice,

    #[error("An auction needs an end date")]
    MissingAuctionEnd,

    #[error("Auction end must lie in the future and after the auction start")]
    InvalidAuctionWindow,

    #[error("Fixed-price listings cannot carry auction dates")]
    AuctionDatesOnFixedPrice,

    #[error("Price, buy-now price and sale format cannot be changed once bids exist")]
    PriceLockedByBids,

    #[error("The auction end cannot be moved earlier once bids exist")]
    AuctionShortenedAfterBids,
}

impl From<ListingError> for ApiError {
    fn from(err: ListingError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

/// Sale terms after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleTerms {
    pub price: i64,
    pub buy_now_price: Option<i64>,
    pub is_auction: bool,
    pub auction_start: Option<DateTime<Utc>>,
    pub auction_end: Option<DateTime<Utc>>,
}

/// Check sale terms; auctions without a start date start at `now`
pub fn validate_terms(terms: SaleTerms, now: DateTime<Utc>) -> Result<SaleTerms, ListingError> {
    if terms.price <= 0 {
        return Err(ListingError::InvalidPrice);
    }

    if !terms.is_auction {
        if terms.buy_now_price.is_some() {
            return Err(ListingError::BuyNowOnFixedPrice);
        }
        if terms.auction_start.is_some() || terms.auction_end.is_some() {
            return Err(ListingError::AuctionDatesOnFixedPrice);
        }
        return Ok(terms);
    }

    if let Some(buy_now) = terms.buy_now_price {
        if buy_now <= terms.price {
            return Err(ListingError::BuyNowNotAboveStart);
        }
    }

    let end = terms.auction_end.ok_or(ListingError::MissingAuctionEnd)?;
    let start = terms.auction_start.unwrap_or(now);
    if end <= now || end <= start {
        return Err(ListingError::InvalidAuctionWindow);
    }

    Ok(SaleTerms {
        auction_start: Some(start),
        ..terms
    })
}

pub fn validate_new_listing(
    request: &CreateListingRequest,
    now: DateTime<Utc>,
) -> Result<SaleTerms, ListingError> {
    validate_terms(
        SaleTerms {
            price: request.price,
            buy_now_price: request.buy_now_price,
            is_auction: request.is_auction,
            auction_start: request.auction_start,
            auction_end: request.auction_end,
        },
        now,
    )
}

fn changes<T: PartialEq>(patch: &Option<T>, current: &T) -> bool {
    patch.as_ref().is_some_and(|value| value != current)
}

/// Merge `patch` into `current`, enforcing the post-bid price lock
pub fn apply_update(
    current: &Listing,
    patch: &UpdateListingRequest,
    bid_count: i64,
    now: DateTime<Utc>,
) -> Result<Listing, ListingError> {
    let price_changes = changes(&patch.price, &current.price)
        || changes(&patch.buy_now_price, &current.buy_now_price)
        || changes(&patch.is_auction, &current.is_auction)
        || changes(&patch.auction_start, &current.auction_start);

    if bid_count > 0 {
        if price_changes {
            return Err(ListingError::PriceLockedByBids);
        }
        if let Some(new_end) = patch.auction_end {
            let earlier = match (new_end, current.auction_end) {
                (Some(new_end), Some(old_end)) => new_end < old_end,
                (None, Some(_)) => true,
                _ => false,
            };
            if earlier {
                return Err(ListingError::AuctionShortenedAfterBids);
            }
        }
    }

    let mut updated = current.clone();
    if let Some(title) = &patch.title {
        updated.title = title.trim().to_string();
    }
    if let Some(description) = &patch.description {
        updated.description = description.clone();
    }

    let window_changes = price_changes || changes(&patch.auction_end, &current.auction_end);
    if window_changes {
        let terms = validate_terms(
            SaleTerms {
                price: patch.price.unwrap_or(current.price),
                buy_now_price: patch.buy_now_price.unwrap_or(current.buy_now_price),
                is_auction: patch.is_auction.unwrap_or(current.is_auction),
                auction_start: patch.auction_start.unwrap_or(current.auction_start),
                auction_end: patch.auction_end.unwrap_or(current.auction_end),
            },
            now,
        )?;
        updated.price = terms.price;
        updated.buy_now_price = terms.buy_now_price;
        updated.is_auction = terms.is_auction;
        updated.auction_start = terms.auction_start;
        updated.auction_end = terms.auction_end;
    }

    updated.updated_at = now;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ModerationStatus;
    use chrono::Duration;
    use uuid::Uuid;

    fn fixed_price_listing(price: i64) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            title: "Omega Speedmaster".to_string(),
            description: String::new(),
            price,
            buy_now_price: None,
            is_auction: false,
            auction_start: None,
            auction_end: None,
            moderation_status: ModerationStatus::Approved,
            created_at: now,
            updated_at: now,
        }
    }

    fn auction_listing(price: i64, buy_now: Option<i64>) -> Listing {
        let now = Utc::now();
        Listing {
            is_auction: true,
            buy_now_price: buy_now,
            auction_start: Some(now - Duration::days(1)),
            auction_end: Some(now + Duration::days(6)),
            ..fixed_price_listing(price)
        }
    }

    #[test]
    fn auction_start_defaults_to_now() {
        let now = Utc::now();
        let terms = validate_terms(
            SaleTerms {
                price: 10_000,
                buy_now_price: Some(50_000),
                is_auction: true,
                auction_start: None,
                auction_end: Some(now + Duration::days(7)),
            },
            now,
        )
        .unwrap();
        assert_eq!(terms.auction_start, Some(now));
    }

    #[test]
    fn rejects_inconsistent_terms() {
        let now = Utc::now();
        let base = SaleTerms {
            price: 10_000,
            buy_now_price: None,
            is_auction: true,
            auction_start: None,
            auction_end: Some(now + Duration::days(7)),
        };

        let past_end = SaleTerms {
            auction_end: Some(now - Duration::hours(1)),
            ..base.clone()
        };
        assert_eq!(
            validate_terms(past_end, now),
            Err(ListingError::InvalidAuctionWindow)
        );

        let cheap_buy_now = SaleTerms {
            buy_now_price: Some(10_000),
            ..base.clone()
        };
        assert_eq!(
            validate_terms(cheap_buy_now, now),
            Err(ListingError::BuyNowNotAboveStart)
        );

        let fixed_with_dates = SaleTerms {
            is_auction: false,
            ..base
        };
        assert_eq!(
            validate_terms(fixed_with_dates, now),
            Err(ListingError::AuctionDatesOnFixedPrice)
        );
    }

    #[test]
    fn price_change_rejected_once_bids_exist() {
        let listing = auction_listing(10_000, Some(80_000));
        let patch = UpdateListingRequest {
            price: Some(12_000),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&listing, &patch, 1, Utc::now()).unwrap_err(),
            ListingError::PriceLockedByBids
        );

        let patch = UpdateListingRequest {
            buy_now_price: Some(None),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&listing, &patch, 3, Utc::now()).unwrap_err(),
            ListingError::PriceLockedByBids
        );
    }

    #[test]
    fn unchanged_price_and_text_edits_allowed_after_bids() {
        let listing = auction_listing(10_000, None);
        let patch = UpdateListingRequest {
            title: Some("  Omega Speedmaster Professional ".to_string()),
            price: Some(10_000),
            ..Default::default()
        };
        let updated = apply_update(&listing, &patch, 2, Utc::now()).unwrap();
        assert_eq!(updated.title, "Omega Speedmaster Professional");
        assert_eq!(updated.price, 10_000);
    }

    #[test]
    fn auction_end_may_only_move_later_after_bids() {
        let listing = auction_listing(10_000, None);
        let old_end = listing.auction_end.unwrap();

        let shorter = UpdateListingRequest {
            auction_end: Some(Some(old_end - Duration::days(1))),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&listing, &shorter, 1, Utc::now()).unwrap_err(),
            ListingError::AuctionShortenedAfterBids
        );

        let longer = UpdateListingRequest {
            auction_end: Some(Some(old_end + Duration::days(1))),
            ..Default::default()
        };
        let updated = apply_update(&listing, &longer, 1, Utc::now()).unwrap();
        assert_eq!(updated.auction_end, Some(old_end + Duration::days(1)));
    }

    #[test]
    fn price_change_without_bids_is_revalidated() {
        let listing = fixed_price_listing(100_000);
        let patch = UpdateListingRequest {
            price: Some(90_000),
            ..Default::default()
        };
        assert_eq!(apply_update(&listing, &patch, 0, Utc::now()).unwrap().price, 90_000);

        let patch = UpdateListingRequest {
            price: Some(0),
            ..Default::default()
        };
        assert_eq!(
            apply_update(&listing, &patch, 0, Utc::now()).unwrap_err(),
            ListingError::InvalidPrice
        );
    }
}
