//! Auction bidding module
//!
//! Bids are append-only. Placement and buy-now serialize on the listing row lock.

mod model;
pub mod rules;
mod service;

pub use model::{Bid, BidHistory, BidStats, MyBidEntry, MyBidStatus, PlaceBidRequest};
pub use rules::{current_price, BidError, BuyNowTerms};
pub(crate) use service::bid_stats;
pub use service::BidService;
