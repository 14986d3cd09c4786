//! Bid service layer - bidding, buy-now and auction close

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::model::{Bid, BidHistory, BidStats, MyBidEntry, MyBidRow};
use super::rules::{check_bid, check_buy_now, classify, current_price};
use crate::auth::Actor;
use crate::error::ApiResult;
use crate::invoice::FeePolicy;
use crate::listing::{fetch_listing, lock_listing, AuctionPhase};
use crate::models::format_chf;
use crate::notification::{NewNotification, NotificationKind, NotificationService};
use crate::purchase::{
    active_purchase_exists, create_purchase, sale_notifications, NewPurchase, Purchase,
    PurchaseSource,
};

/// Bid count plus the leading bid; ties cannot occur since bids strictly increase
pub(crate) async fn bid_stats(conn: &mut PgConnection, watch_id: Uuid) -> ApiResult<BidStats> {
    let stats = sqlx::query_as::<_, BidStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM bids WHERE watch_id = $1) AS bid_count,
            top.amount AS highest_amount,
            top.bidder_id AS highest_bidder_id
        FROM (SELECT 1) AS one
        LEFT JOIN LATERAL (
            SELECT amount, bidder_id FROM bids
            WHERE watch_id = $1
            ORDER BY amount DESC, created_at ASC
            LIMIT 1
        ) top ON TRUE
        "#,
    )
    .bind(watch_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(stats)
}

async fn insert_bid(
    conn: &mut PgConnection,
    watch_id: Uuid,
    bidder_id: Uuid,
    amount: i64,
    is_buy_now: bool,
) -> ApiResult<Bid> {
    let bid = sqlx::query_as::<_, Bid>(
        r#"
        INSERT INTO bids (id, watch_id, bidder_id, amount, is_buy_now, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(watch_id)
    .bind(bidder_id)
    .bind(amount)
    .bind(is_buy_now)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(bid)
}

pub struct BidService {
    db_pool: PgPool,
    notifications: Arc<NotificationService>,
    fees: FeePolicy,
}

impl BidService {
    pub fn new(db_pool: PgPool, notifications: Arc<NotificationService>, fees: FeePolicy) -> Self {
        Self {
            db_pool,
            notifications,
            fees,
        }
    }

    pub async fn place_bid(&self, watch_id: Uuid, actor: &Actor, amount: i64) -> ApiResult<Bid> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let listing = lock_listing(&mut tx, watch_id).await?;
        let stats = bid_stats(&mut tx, watch_id).await?;
        let is_sold = active_purchase_exists(&mut tx, watch_id).await?;

        check_bid(&listing, actor.user_id, amount, &stats, is_sold, now)?;

        let bid = insert_bid(&mut tx, watch_id, actor.user_id, amount, false).await?;
        tx.commit().await?;

        tracing::info!(
            watch_id = %watch_id,
            bidder_id = %actor.user_id,
            amount,
            "Bid placed"
        );

        if let Some(previous) = stats.highest_bidder_id.filter(|id| *id != actor.user_id) {
            self.notifications
                .notify(NewNotification {
                    user_id: previous,
                    kind: NotificationKind::Outbid,
                    title: "You have been outbid".to_string(),
                    message: format!(
                        "Someone bid {} on \"{}\".",
                        format_chf(amount),
                        listing.title
                    ),
                    watch_id: Some(watch_id),
                })
                .await;
        }

        Ok(bid)
    }

    /// Buy at the buy-now price (auctions) or the listing price (fixed price)
    pub async fn buy_now(
        &self,
        watch_id: Uuid,
        actor: &Actor,
        payment_protection: bool,
    ) -> ApiResult<Purchase> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let listing = lock_listing(&mut tx, watch_id).await?;
        let stats = bid_stats(&mut tx, watch_id).await?;
        let is_sold = active_purchase_exists(&mut tx, watch_id).await?;

        let terms = check_buy_now(&listing, actor.user_id, &stats, is_sold, now)?;

        if terms.closes_auction {
            insert_bid(&mut tx, watch_id, actor.user_id, terms.price, true).await?;
            sqlx::query("UPDATE watches SET auction_end = $2, updated_at = $2 WHERE id = $1")
                .bind(watch_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        let (purchase, _invoice) = create_purchase(
            &mut tx,
            NewPurchase {
                watch_id,
                buyer_id: actor.user_id,
                seller_id: listing.seller_id,
                price: terms.price,
                source: PurchaseSource::BuyNow,
                payment_protection,
            },
            &listing.title,
            &self.fees,
            now,
        )
        .await?;

        tx.commit().await?;

        let mut notifications = sale_notifications(&purchase, &listing.title);
        if let Some(previous) = stats.highest_bidder_id.filter(|id| *id != actor.user_id) {
            notifications.push(NewNotification {
                user_id: previous,
                kind: NotificationKind::Outbid,
                title: "Auction ended".to_string(),
                message: format!("\"{}\" was sold at the buy-now price.", listing.title),
                watch_id: Some(watch_id),
            });
        }
        self.notifications.notify_all(notifications).await;

        Ok(purchase)
    }

    pub async fn bid_history(&self, watch_id: Uuid) -> ApiResult<BidHistory> {
        let mut conn = self.db_pool.acquire().await?;
        let listing = fetch_listing(&mut conn, watch_id).await?;

        let bids = sqlx::query_as::<_, Bid>(
            "SELECT * FROM bids WHERE watch_id = $1 ORDER BY amount DESC, created_at ASC",
        )
        .bind(watch_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(BidHistory {
            current_price: current_price(listing.price, bids.first().map(|bid| bid.amount)),
            bid_count: bids.len() as i64,
            bids,
        })
    }

    /// Every auction the actor bid on, with where they stand
    pub async fn my_bids(&self, actor: &Actor) -> ApiResult<Vec<MyBidEntry>> {
        let now = Utc::now();
        let rows = sqlx::query_as::<_, MyBidRow>(
            r#"
            SELECT w.*, mine.my_highest_bid, top.amount AS highest_amount,
                   top.bidder_id AS highest_bidder_id
            FROM (
                SELECT watch_id, MAX(amount) AS my_highest_bid
                FROM bids WHERE bidder_id = $1
                GROUP BY watch_id
            ) mine
            JOIN watches w ON w.id = mine.watch_id
            JOIN LATERAL (
                SELECT amount, bidder_id FROM bids b
                WHERE b.watch_id = w.id
                ORDER BY amount DESC, created_at ASC
                LIMIT 1
            ) top ON TRUE
            ORDER BY w.auction_end DESC NULLS LAST
            "#,
        )
        .bind(actor.user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let (status, won) = classify(&row.listing, actor.user_id, row.highest_bidder_id, now);
                MyBidEntry {
                    watch_id: row.listing.id,
                    title: row.listing.title,
                    my_highest_bid: row.my_highest_bid,
                    current_price: row.highest_amount,
                    auction_end: row.listing.auction_end,
                    status,
                    won,
                }
            })
            .collect())
    }

    /// Turn ended auctions with bids into purchases for their highest bidder
    ///
    /// A listing is closed at most once; a cancelled sale is not re-awarded.
    pub async fn close_expired_auctions(&self) -> ApiResult<usize> {
        let now = Utc::now();
        let candidates: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT w.id FROM watches w
            WHERE w.is_auction
              AND w.moderation_status = 'approved'
              AND w.auction_end <= $1
              AND EXISTS (SELECT 1 FROM bids b WHERE b.watch_id = w.id)
              AND NOT EXISTS (SELECT 1 FROM purchases p WHERE p.watch_id = w.id)
            "#,
        )
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        let mut closed = 0;
        for watch_id in candidates {
            match self.close_auction(watch_id).await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(watch_id = %watch_id, error = %e, "Failed to close auction");
                }
            }
        }

        Ok(closed)
    }

    async fn close_auction(&self, watch_id: Uuid) -> ApiResult<bool> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let listing = lock_listing(&mut tx, watch_id).await?;

        if listing.auction_phase(now) != AuctionPhase::Ended {
            return Ok(false);
        }
        let already_closed: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM purchases WHERE watch_id = $1)")
                .bind(watch_id)
                .fetch_one(&mut *tx)
                .await?;
        if already_closed {
            return Ok(false);
        }

        let stats = bid_stats(&mut tx, watch_id).await?;
        let (Some(amount), Some(winner)) = (stats.highest_amount, stats.highest_bidder_id) else {
            return Ok(false);
        };

        let (purchase, _invoice) = create_purchase(
            &mut tx,
            NewPurchase {
                watch_id,
                buyer_id: winner,
                seller_id: listing.seller_id,
                price: amount,
                source: PurchaseSource::Auction,
                payment_protection: false,
            },
            &listing.title,
            &self.fees,
            now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(watch_id = %watch_id, winner = %winner, amount, "Auction closed");

        self.notifications
            .notify_all(sale_notifications(&purchase, &listing.title))
            .await;

        Ok(true)
    }
}
