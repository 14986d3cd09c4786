//! Auction bid and buy-now rules

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::model::{BidStats, MyBidStatus};
use crate::error::ApiError;
use crate::listing::{AuctionPhase, Listing};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BidError {
    #[error("Bids are only possible on auctions")]
    NotAuction,

    #[error("This listing is not available")]
    ListingNotAvailable,

    #[error("This item has already been sold")]
    AlreadySold,

    #[error("You cannot bid on your own listing")]
    OwnListing,

    #[error("The auction has not started yet")]
    NotStarted,

    #[error("The auction has ended")]
    AuctionEnded,

    #[error("The first bid must be at least {min} Rappen")]
    BelowStartingPrice { min: i64 },

    #[error("Bid must be higher than the current bid of {highest} Rappen")]
    NotAboveHighest { highest: i64 },

    #[error("Buy-now is not offered on this listing")]
    BuyNowUnavailable,

    #[error("Bidding has reached the buy-now price")]
    BuyNowSurpassed,
}

impl From<BidError> for ApiError {
    fn from(err: BidError) -> Self {
        match err {
            BidError::AlreadySold | BidError::AuctionEnded | BidError::BuyNowSurpassed => {
                ApiError::Conflict(err.to_string())
            }
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

/// Highest bid, or the listing price before anyone bids
pub fn current_price(price: i64, highest_bid: Option<i64>) -> i64 {
    highest_bid.unwrap_or(price)
}

fn check_open(listing: &Listing, user_id: Uuid, is_sold: bool) -> Result<(), BidError> {
    if !listing.is_approved() {
        return Err(BidError::ListingNotAvailable);
    }
    if is_sold {
        return Err(BidError::AlreadySold);
    }
    if listing.seller_id == user_id {
        return Err(BidError::OwnListing);
    }
    Ok(())
}

fn check_running(listing: &Listing, now: DateTime<Utc>) -> Result<(), BidError> {
    match listing.auction_phase(now) {
        AuctionPhase::Running => Ok(()),
        AuctionPhase::Scheduled => Err(BidError::NotStarted),
        AuctionPhase::Ended => Err(BidError::AuctionEnded),
        AuctionPhase::NotAuction => Err(BidError::NotAuction),
    }
}

pub fn check_bid(
    listing: &Listing,
    bidder_id: Uuid,
    amount: i64,
    stats: &BidStats,
    is_sold: bool,
    now: DateTime<Utc>,
) -> Result<(), BidError> {
    if !listing.is_auction {
        return Err(BidError::NotAuction);
    }
    check_open(listing, bidder_id, is_sold)?;
    check_running(listing, now)?;

    match stats.highest_amount {
        Some(highest) if amount <= highest => Err(BidError::NotAboveHighest { highest }),
        None if amount < listing.price => Err(BidError::BelowStartingPrice { min: listing.price }),
        _ => Ok(()),
    }
}

/// How a buy-now request settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyNowTerms {
    pub price: i64,
    /// Auctions record a closing bid and end immediately
    pub closes_auction: bool,
}

pub fn check_buy_now(
    listing: &Listing,
    buyer_id: Uuid,
    stats: &BidStats,
    is_sold: bool,
    now: DateTime<Utc>,
) -> Result<BuyNowTerms, BidError> {
    check_open(listing, buyer_id, is_sold)?;

    if !listing.is_auction {
        return Ok(BuyNowTerms {
            price: listing.price,
            closes_auction: false,
        });
    }

    let buy_now_price = listing.buy_now_price.ok_or(BidError::BuyNowUnavailable)?;
    check_running(listing, now)?;
    if stats.highest_amount.is_some_and(|highest| highest >= buy_now_price) {
        return Err(BidError::BuyNowSurpassed);
    }

    Ok(BuyNowTerms {
        price: buy_now_price,
        closes_auction: true,
    })
}

/// Classify the caller's position on an auction; the flag is whether they won
pub fn classify(
    listing: &Listing,
    user_id: Uuid,
    highest_bidder_id: Uuid,
    now: DateTime<Utc>,
) -> (MyBidStatus, bool) {
    let leads = highest_bidder_id == user_id;
    match listing.auction_phase(now) {
        AuctionPhase::Ended => (MyBidStatus::Ended, leads),
        _ if leads => (MyBidStatus::Leading, false),
        _ => (MyBidStatus::Outbid, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ModerationStatus;
    use chrono::Duration;

    fn running_auction(price: i64, buy_now: Option<i64>) -> Listing {
        let now = Utc::now();
        Listing {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            title: "Tudor Black Bay".to_string(),
            description: String::new(),
            price,
            buy_now_price: buy_now,
            is_auction: true,
            auction_start: Some(now - Duration::hours(2)),
            auction_end: Some(now + Duration::days(3)),
            moderation_status: ModerationStatus::Approved,
            created_at: now,
            updated_at: now,
        }
    }

    fn stats(highest: Option<(i64, Uuid)>) -> BidStats {
        BidStats {
            bid_count: i64::from(highest.is_some()),
            highest_amount: highest.map(|(amount, _)| amount),
            highest_bidder_id: highest.map(|(_, bidder)| bidder),
        }
    }

    #[test]
    fn current_price_follows_highest_bid() {
        assert_eq!(current_price(10_000, None), 10_000);
        assert_eq!(current_price(10_000, Some(12_500)), 12_500);
    }

    #[test]
    fn first_bid_may_equal_starting_price() {
        let listing = running_auction(10_000, None);
        let now = Utc::now();
        let bidder = Uuid::new_v4();

        assert!(check_bid(&listing, bidder, 10_000, &stats(None), false, now).is_ok());
        assert_eq!(
            check_bid(&listing, bidder, 9_999, &stats(None), false, now),
            Err(BidError::BelowStartingPrice { min: 10_000 })
        );
    }

    #[test]
    fn later_bids_must_exceed_highest() {
        let listing = running_auction(10_000, None);
        let now = Utc::now();
        let current = stats(Some((12_000, Uuid::new_v4())));
        let bidder = Uuid::new_v4();

        assert_eq!(
            check_bid(&listing, bidder, 12_000, &current, false, now),
            Err(BidError::NotAboveHighest { highest: 12_000 })
        );
        assert!(check_bid(&listing, bidder, 12_001, &current, false, now).is_ok());
    }

    #[test]
    fn bids_rejected_outside_running_window() {
        let now = Utc::now();
        let bidder = Uuid::new_v4();

        let ended = Listing {
            auction_end: Some(now - Duration::seconds(1)),
            ..running_auction(10_000, None)
        };
        assert_eq!(
            check_bid(&ended, bidder, 20_000, &stats(None), false, now),
            Err(BidError::AuctionEnded)
        );

        let scheduled = Listing {
            auction_start: Some(now + Duration::hours(1)),
            ..running_auction(10_000, None)
        };
        assert_eq!(
            check_bid(&scheduled, bidder, 20_000, &stats(None), false, now),
            Err(BidError::NotStarted)
        );

        let listing = running_auction(10_000, None);
        assert_eq!(
            check_bid(&listing, listing.seller_id, 20_000, &stats(None), false, now),
            Err(BidError::OwnListing)
        );
        assert_eq!(
            check_bid(&listing, bidder, 20_000, &stats(None), true, now),
            Err(BidError::AlreadySold)
        );
    }

    #[test]
    fn buy_now_only_below_buy_now_price() {
        let listing = running_auction(10_000, Some(50_000));
        let now = Utc::now();
        let buyer = Uuid::new_v4();

        assert_eq!(
            check_buy_now(&listing, buyer, &stats(Some((49_999, Uuid::new_v4()))), false, now),
            Ok(BuyNowTerms {
                price: 50_000,
                closes_auction: true
            })
        );
        assert_eq!(
            check_buy_now(&listing, buyer, &stats(Some((50_000, Uuid::new_v4()))), false, now),
            Err(BidError::BuyNowSurpassed)
        );

        let without = running_auction(10_000, None);
        assert_eq!(
            check_buy_now(&without, buyer, &stats(None), false, now),
            Err(BidError::BuyNowUnavailable)
        );
    }

    #[test]
    fn buy_now_closes_auction_for_later_bids() {
        let listing = running_auction(10_000, Some(50_000));
        let now = Utc::now();
        let buyer = Uuid::new_v4();
        let terms = check_buy_now(&listing, buyer, &stats(None), false, now).unwrap();
        assert!(terms.closes_auction);

        let closed = Listing {
            auction_end: Some(now),
            ..listing
        };
        let after_sale = stats(Some((50_000, buyer)));
        assert_eq!(
            check_bid(&closed, Uuid::new_v4(), 60_000, &after_sale, true, now),
            Err(BidError::AlreadySold)
        );
        assert_eq!(
            check_bid(&closed, Uuid::new_v4(), 60_000, &after_sale, false, now),
            Err(BidError::AuctionEnded)
        );
    }

    #[test]
    fn fixed_price_buy_now_uses_listing_price() {
        let listing = Listing {
            is_auction: false,
            auction_start: None,
            auction_end: None,
            ..running_auction(100_000, None)
        };
        assert_eq!(
            check_buy_now(&listing, Uuid::new_v4(), &stats(None), false, Utc::now()),
            Ok(BuyNowTerms {
                price: 100_000,
                closes_auction: false
            })
        );
    }

    #[test]
    fn classification() {
        let now = Utc::now();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let running = running_auction(10_000, None);

        assert_eq!(classify(&running, me, me, now), (MyBidStatus::Leading, false));
        assert_eq!(classify(&running, me, other, now), (MyBidStatus::Outbid, false));

        let ended = Listing {
            auction_end: Some(now - Duration::minutes(5)),
            ..running
        };
        assert_eq!(classify(&ended, me, me, now), (MyBidStatus::Ended, true));
        assert_eq!(classify(&ended, me, other, now), (MyBidStatus::Ended, false));
    }
}
