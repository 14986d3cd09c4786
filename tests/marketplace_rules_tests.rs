//! Marketplace rule scenarios
//!
//! These walk the pure decision functions through the flows buyers and
//! sellers actually take, without a database.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use helvenda_server::auth::Actor;
use helvenda_server::bid::rules::{check_bid, check_buy_now, classify};
use helvenda_server::bid::{BidError, BidStats, MyBidStatus};
use helvenda_server::dispute::rules::{check_comment, check_open, check_withdraw, is_escalation_due};
use helvenda_server::dispute::DisputeError;
use helvenda_server::error::ApiError;
use helvenda_server::invoice::rules::{check_payment, compute_totals, invoice_number, is_overdue};
use helvenda_server::invoice::{FeePolicy, InvoiceError, InvoiceStatus};
use helvenda_server::listing::rules::apply_update;
use helvenda_server::listing::{Listing, ListingError, ModerationStatus, UpdateListingRequest};
use helvenda_server::offer::rules::{check_checkout, check_response, plan_offer};
use helvenda_server::offer::{OfferError, OfferPlan, OfferPolicy, OfferStatus, PriceOffer};
use helvenda_server::purchase::{DisputeStatus, Purchase, PurchaseSource, PurchaseStatus};

// ============================================================================
// Fixtures
// ============================================================================

fn fixed_price_listing(seller_id: Uuid, price: i64) -> Listing {
    let now = Utc::now();
    Listing {
        id: Uuid::new_v4(),
        seller_id,
        title: "Omega Speedmaster Professional".to_string(),
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

fn auction_listing(seller_id: Uuid, price: i64, buy_now: Option<i64>, now: DateTime<Utc>) -> Listing {
    Listing {
        is_auction: true,
        buy_now_price: buy_now,
        auction_start: Some(now - Duration::hours(1)),
        auction_end: Some(now + Duration::days(3)),
        ..fixed_price_listing(seller_id, price)
    }
}

fn offer(listing: &Listing, buyer_id: Uuid, amount: i64, status: OfferStatus, now: DateTime<Utc>) -> PriceOffer {
    PriceOffer {
        id: Uuid::new_v4(),
        watch_id: listing.id,
        buyer_id,
        amount,
        message: None,
        status,
        expires_at: now + Duration::hours(48),
        purchase_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn purchase(buyer_id: Uuid, seller_id: Uuid) -> Purchase {
    Purchase {
        id: Uuid::new_v4(),
        watch_id: Uuid::new_v4(),
        buyer_id,
        seller_id,
        status: PurchaseStatus::Active,
        price: 450_000,
        source: PurchaseSource::Offer,
        payment_protection: true,
        dispute_status: DisputeStatus::None,
        dispute_deadline: None,
        dispute_opened_at: None,
        dispute_opened_by: None,
        dispute_resolved_at: None,
        dispute_escalated_at: None,
        dispute_reason: None,
        dispute_description: None,
        dispute_attachments: Vec::new(),
        dispute_resolution: None,
        cancel_reason: None,
        cancelled_at: None,
        completed_at: None,
        created_at: Utc::now(),
    }
}

// ============================================================================
// Price offers
// ============================================================================

#[test]
fn test_offer_amount_bounds() {
    let policy = OfferPolicy::default();
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let listing = fixed_price_listing(seller, 1000);
    let now = Utc::now();

    assert_eq!(
        plan_offer(&policy, &listing, buyer, 599, false, &[], now),
        Err(OfferError::AmountTooLow { min: 600 })
    );
    assert_eq!(
        plan_offer(&policy, &listing, buyer, 1000, false, &[], now),
        Err(OfferError::AmountNotBelowPrice)
    );
    assert_eq!(
        plan_offer(&policy, &listing, buyer, 600, false, &[], now),
        Ok(OfferPlan::Create)
    );
    assert_eq!(
        plan_offer(&policy, &listing, buyer, 999, false, &[], now),
        Ok(OfferPlan::Create)
    );
}

#[test]
fn test_offer_cap_without_pending_offer() {
    let policy = OfferPolicy::default();
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let listing = fixed_price_listing(seller, 1000);
    let now = Utc::now();

    let existing: Vec<PriceOffer> = (0..3)
        .map(|i| offer(&listing, buyer, 650 + i, OfferStatus::Accepted, now))
        .collect();

    let result = plan_offer(&policy, &listing, buyer, 700, false, &existing, now);
    assert_eq!(result, Err(OfferError::TooManyActive { max: 3 }));
    assert!(matches!(
        ApiError::from(OfferError::TooManyActive { max: 3 }),
        ApiError::BadRequest(_)
    ));
}

#[test]
fn test_offer_resubmission_reuses_pending_offer() {
    let policy = OfferPolicy::default();
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let listing = fixed_price_listing(seller, 1000);
    let now = Utc::now();

    let pending = offer(&listing, buyer, 650, OfferStatus::Pending, now - Duration::hours(2));
    let plan = plan_offer(&policy, &listing, buyer, 650, false, &[pending.clone()], now)
        .expect("resubmission should be allowed");

    assert_eq!(
        plan,
        OfferPlan::Update {
            offer_id: pending.id,
            previous_amount: 650
        }
    );
    assert!(!plan.should_notify_seller(650));
    assert!(plan.should_notify_seller(700));
    assert_eq!(policy.expires_at(now), now + Duration::hours(48));
}

#[test]
fn test_lapsed_pending_offer_is_revised_in_place() {
    let policy = OfferPolicy::default();
    let buyer = Uuid::new_v4();
    let listing = fixed_price_listing(Uuid::new_v4(), 1000);
    let now = Utc::now();

    let mut lapsed = offer(&listing, buyer, 650, OfferStatus::Pending, now - Duration::hours(72));
    lapsed.expires_at = now - Duration::hours(24);
    assert_eq!(lapsed.effective_status(now), OfferStatus::Expired);

    let plan = plan_offer(&policy, &listing, buyer, 680, false, &[lapsed.clone()], now);
    assert!(matches!(plan, Ok(OfferPlan::Update { offer_id, .. }) if offer_id == lapsed.id));
}

#[test]
fn test_offer_end_to_end_scenario() {
    let policy = OfferPolicy::default();
    let seller = Uuid::new_v4();
    let buyer = Uuid::new_v4();
    let listing = fixed_price_listing(seller, 1000);
    let now = Utc::now();

    // 650 on 1000 opens a pending offer
    assert_eq!(
        plan_offer(&policy, &listing, buyer, 650, false, &[], now),
        Ok(OfferPlan::Create)
    );
    let mut first = offer(&listing, buyer, 650, OfferStatus::Pending, now);

    // The seller accepts it; the buyer cannot answer their own offer
    assert_eq!(
        check_response(&first, &listing, buyer, now),
        Err(OfferError::NotSeller)
    );
    assert_eq!(check_response(&first, &listing, seller, now), Ok(()));
    first.status = OfferStatus::Accepted;
    assert_eq!(check_checkout(&first, &listing, buyer), Ok(()));
    assert_eq!(
        check_response(&first, &listing, seller, now),
        Err(OfferError::NotPending)
    );

    // Resubmitting 700 opens a second offer beside the accepted one
    let plan = plan_offer(&policy, &listing, buyer, 700, false, &[first.clone()], now);
    assert_eq!(plan, Ok(OfferPlan::Create));

    // With three accepted offers outstanding the next one hits the cap
    let existing = vec![
        first,
        offer(&listing, buyer, 700, OfferStatus::Accepted, now),
        offer(&listing, buyer, 720, OfferStatus::Accepted, now),
    ];
    assert_eq!(
        plan_offer(&policy, &listing, buyer, 750, false, &existing, now),
        Err(OfferError::TooManyActive { max: 3 })
    );
}

#[test]
fn test_offer_precedence_sold_before_own_listing() {
    let policy = OfferPolicy::default();
    let seller = Uuid::new_v4();
    let listing = fixed_price_listing(seller, 1000);
    let now = Utc::now();

    assert_eq!(
        plan_offer(&policy, &listing, seller, 100, true, &[], now),
        Err(OfferError::AlreadySold)
    );
    assert_eq!(
        plan_offer(&policy, &listing, seller, 700, false, &[], now),
        Err(OfferError::OwnListing)
    );

    let auction = auction_listing(seller, 1000, None, now);
    assert_eq!(
        plan_offer(&policy, &auction, Uuid::new_v4(), 700, false, &[], now),
        Err(OfferError::AuctionListing)
    );
}

// ============================================================================
// Listings
// ============================================================================

#[test]
fn test_price_is_locked_once_bids_exist() {
    let now = Utc::now();
    let listing = auction_listing(Uuid::new_v4(), 100_000, None, now);
    let patch = UpdateListingRequest {
        price: Some(90_000),
        ..Default::default()
    };

    let err = apply_update(&listing, &patch, 1, now).unwrap_err();
    assert_eq!(err, ListingError::PriceLockedByBids);
    assert!(matches!(ApiError::from(err), ApiError::BadRequest(_)));

    let updated = apply_update(&listing, &patch, 0, now).expect("no bids yet");
    assert_eq!(updated.price, 90_000);
}

#[test]
fn test_title_edit_allowed_after_bids() {
    let now = Utc::now();
    let listing = auction_listing(Uuid::new_v4(), 100_000, None, now);
    let patch = UpdateListingRequest {
        title: Some("  Rolex Submariner 16610  ".to_string()),
        ..Default::default()
    };

    let updated = apply_update(&listing, &patch, 4, now).expect("titles stay editable");
    assert_eq!(updated.title, "Rolex Submariner 16610");
    assert_eq!(updated.price, listing.price);
}

// ============================================================================
// Bidding and buy-now
// ============================================================================

#[test]
fn test_bid_must_exceed_highest() {
    let now = Utc::now();
    let seller = Uuid::new_v4();
    let bidder = Uuid::new_v4();
    let listing = auction_listing(seller, 10_000, Some(50_000), now);

    let empty = BidStats::default();
    assert_eq!(
        check_bid(&listing, bidder, 9_999, &empty, false, now),
        Err(BidError::BelowStartingPrice { min: 10_000 })
    );
    assert_eq!(check_bid(&listing, bidder, 10_000, &empty, false, now), Ok(()));

    let stats = BidStats {
        bid_count: 1,
        highest_amount: Some(12_000),
        highest_bidder_id: Some(Uuid::new_v4()),
    };
    assert_eq!(
        check_bid(&listing, bidder, 12_000, &stats, false, now),
        Err(BidError::NotAboveHighest { highest: 12_000 })
    );
    assert_eq!(check_bid(&listing, bidder, 12_001, &stats, false, now), Ok(()));
    assert_eq!(
        check_bid(&listing, seller, 20_000, &stats, false, now),
        Err(BidError::OwnListing)
    );
}

#[test]
fn test_buy_now_ends_auction_and_blocks_later_bids() {
    let now = Utc::now();
    let buyer = Uuid::new_v4();
    let mut listing = auction_listing(Uuid::new_v4(), 10_000, Some(50_000), now);

    let terms = check_buy_now(&listing, buyer, &BidStats::default(), false, now)
        .expect("buy-now available");
    assert_eq!(terms.price, 50_000);
    assert!(terms.closes_auction);

    // The service ends the auction and records the sale
    listing.auction_end = Some(now);
    let later = now + Duration::seconds(1);
    let err = check_bid(&listing, Uuid::new_v4(), 60_000, &BidStats::default(), true, later)
        .unwrap_err();
    assert_eq!(err, BidError::AlreadySold);
    assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
}

#[test]
fn test_buy_now_unavailable_once_bids_reach_it() {
    let now = Utc::now();
    let listing = auction_listing(Uuid::new_v4(), 10_000, Some(50_000), now);
    let stats = BidStats {
        bid_count: 3,
        highest_amount: Some(50_000),
        highest_bidder_id: Some(Uuid::new_v4()),
    };

    assert_eq!(
        check_buy_now(&listing, Uuid::new_v4(), &stats, false, now),
        Err(BidError::BuyNowSurpassed)
    );
}

#[test]
fn test_fixed_price_buy_now_uses_listing_price() {
    let listing = fixed_price_listing(Uuid::new_v4(), 250_000);
    let terms = check_buy_now(&listing, Uuid::new_v4(), &BidStats::default(), false, Utc::now())
        .expect("fixed price sale");
    assert_eq!(terms.price, 250_000);
    assert!(!terms.closes_auction);
}

#[test]
fn test_my_bids_classification() {
    let now = Utc::now();
    let me = Uuid::new_v4();
    let other = Uuid::new_v4();
    let mut listing = auction_listing(Uuid::new_v4(), 10_000, None, now);

    assert_eq!(classify(&listing, me, me, now), (MyBidStatus::Leading, false));
    assert_eq!(classify(&listing, me, other, now), (MyBidStatus::Outbid, false));

    listing.auction_end = Some(now - Duration::minutes(5));
    assert_eq!(classify(&listing, me, me, now), (MyBidStatus::Ended, true));
    assert_eq!(classify(&listing, me, other, now), (MyBidStatus::Ended, false));
}

// ============================================================================
// Disputes
// ============================================================================

#[test]
fn test_dispute_thread_locks_after_decision() {
    let buyer = Uuid::new_v4();
    let seller = Uuid::new_v4();
    let mut disputed = purchase(buyer, seller);
    let actor = Actor::user(buyer);

    assert_eq!(check_open(&disputed, &actor, &[]), Ok(()));
    disputed.dispute_status = DisputeStatus::Pending;
    disputed.dispute_opened_by = Some(buyer);
    assert!(check_comment(&disputed, &actor, false, &[]).is_ok());

    for status in [DisputeStatus::Resolved, DisputeStatus::Rejected, DisputeStatus::Closed] {
        disputed.dispute_status = status;
        assert_eq!(
            check_comment(&disputed, &actor, false, &[]),
            Err(DisputeError::ThreadClosed)
        );
    }
}

#[test]
fn test_only_opener_may_withdraw() {
    let buyer = Uuid::new_v4();
    let seller = Uuid::new_v4();
    let mut disputed = purchase(buyer, seller);
    disputed.dispute_status = DisputeStatus::Pending;
    disputed.dispute_opened_by = Some(seller);

    assert_eq!(
        check_withdraw(&disputed, &Actor::user(buyer)),
        Err(DisputeError::NotOpener)
    );
    assert_eq!(check_withdraw(&disputed, &Actor::user(seller)), Ok(()));
}

#[test]
fn test_escalation_due_once_past_deadline() {
    let now = Utc::now();
    let mut disputed = purchase(Uuid::new_v4(), Uuid::new_v4());
    disputed.dispute_status = DisputeStatus::Pending;
    disputed.dispute_deadline = Some(now - Duration::hours(1));

    assert!(is_escalation_due(&disputed, now));
    disputed.dispute_escalated_at = Some(now);
    assert!(!is_escalation_due(&disputed, now));
}

// ============================================================================
// Invoices
// ============================================================================

#[test]
fn test_sale_invoice_totals() {
    let fees = FeePolicy::default();

    // 10% fee on CHF 1'500.00 is CHF 150.00; VAT 8.1% on top
    let fee = fees.platform_fee(150_000);
    assert_eq!(fee, 15_000);
    let totals = compute_totals(&[fee], fees.vat_rate_bps);
    assert_eq!(totals.subtotal, 15_000);
    assert_eq!(totals.vat_amount, 1_215);
    assert_eq!(totals.total, 16_215);

    // The fee is capped at CHF 220.00
    assert_eq!(fees.platform_fee(10_000_000), 22_000);
}

#[test]
fn test_invoice_overdue_and_paid_is_terminal() {
    let now = Utc::now();
    let due = now - Duration::days(1);

    assert!(is_overdue(InvoiceStatus::Pending, due, now));
    assert!(!is_overdue(InvoiceStatus::Overdue, due, now));
    assert!(!is_overdue(InvoiceStatus::Paid, due, now));

    assert_eq!(check_payment(InvoiceStatus::Overdue, 16_215, 16_215), Ok(()));
    assert_eq!(
        check_payment(InvoiceStatus::Paid, 16_215, 16_215),
        Err(InvoiceError::AlreadyPaid)
    );
    assert!(matches!(
        ApiError::from(InvoiceError::AlreadyPaid),
        ApiError::Conflict(_)
    ));
}

#[test]
fn test_invoice_number_format() {
    let issued = DateTime::parse_from_rfc3339("2025-03-14T10:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc);
    assert_eq!(invoice_number(issued, 123), "HV-2025-000123");
}
