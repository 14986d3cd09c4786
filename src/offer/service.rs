//! Price offer service layer

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::model::{
    CreateOfferRequest, ListOffersQuery, OfferListType, OfferStatus, PriceOffer,
};
use super::rules::{
    check_checkout, check_response, plan_offer, OfferError, OfferPlan, OfferPolicy,
};
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::invoice::FeePolicy;
use crate::listing::{fetch_listing, lock_listing, Listing};
use crate::models::format_chf;
use crate::notification::{NewNotification, NotificationKind, NotificationService};
use crate::purchase::{
    active_purchase_exists, create_purchase, sale_notifications, NewPurchase, Purchase,
    PurchaseSource,
};

/// Result of an offer submission
#[derive(Debug)]
pub struct OfferSubmission {
    pub offer: PriceOffer,
    pub created: bool,
}

async fn fetch_offer(conn: &mut PgConnection, id: Uuid) -> ApiResult<PriceOffer> {
    sqlx::query_as::<_, PriceOffer>("SELECT * FROM price_offers WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Offer not found".to_string()))
}

/// Lock the offer's listing first, then the offer, so offer paths and
/// submissions take locks in the same order.
async fn lock_offer_with_listing(
    conn: &mut PgConnection,
    id: Uuid,
) -> ApiResult<(PriceOffer, Listing)> {
    let unlocked = fetch_offer(conn, id).await?;
    let listing = lock_listing(conn, unlocked.watch_id).await?;
    let offer = sqlx::query_as::<_, PriceOffer>("SELECT * FROM price_offers WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok((offer, listing))
}

pub struct OfferService {
    db_pool: PgPool,
    notifications: Arc<NotificationService>,
    policy: OfferPolicy,
    fees: FeePolicy,
}

impl OfferService {
    pub fn new(
        db_pool: PgPool,
        notifications: Arc<NotificationService>,
        policy: OfferPolicy,
        fees: FeePolicy,
    ) -> Self {
        Self {
            db_pool,
            notifications,
            policy,
            fees,
        }
    }

    /// Create an offer, or revise the buyer's pending one
    pub async fn create_or_update_offer(
        &self,
        actor: &Actor,
        request: &CreateOfferRequest,
    ) -> ApiResult<OfferSubmission> {
        let now = Utc::now();
        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let mut tx = self.db_pool.begin().await?;
        let listing = lock_listing(&mut tx, request.watch_id).await?;
        let is_sold = active_purchase_exists(&mut tx, listing.id).await?;

        let existing = sqlx::query_as::<_, PriceOffer>(
            r#"
            SELECT * FROM price_offers
            WHERE watch_id = $1 AND buyer_id = $2 AND status IN ('pending', 'accepted')
              AND purchase_id IS NULL
            "#,
        )
        .bind(listing.id)
        .bind(actor.user_id)
        .fetch_all(&mut *tx)
        .await?;

        let plan = plan_offer(
            &self.policy,
            &listing,
            actor.user_id,
            request.amount,
            is_sold,
            &existing,
            now,
        )?;

        let offer = match plan {
            OfferPlan::Update { offer_id, .. } => {
                sqlx::query_as::<_, PriceOffer>(
                    r#"
                    UPDATE price_offers
                    SET amount = $2, message = $3, expires_at = $4, updated_at = $5
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(offer_id)
                .bind(request.amount)
                .bind(message)
                .bind(self.policy.expires_at(now))
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
            OfferPlan::Create => {
                sqlx::query_as::<_, PriceOffer>(
                    r#"
                    INSERT INTO price_offers (
                        id, watch_id, buyer_id, amount, message, status, expires_at, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(listing.id)
                .bind(actor.user_id)
                .bind(request.amount)
                .bind(message)
                .bind(OfferStatus::Pending)
                .bind(self.policy.expires_at(now))
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        let created = plan == OfferPlan::Create;
        tracing::info!(
            offer_id = %offer.id,
            watch_id = %listing.id,
            buyer_id = %actor.user_id,
            amount = offer.amount,
            created,
            "Price offer submitted"
        );

        if plan.should_notify_seller(offer.amount) {
            self.notifications
                .notify(NewNotification {
                    user_id: listing.seller_id,
                    kind: NotificationKind::OfferReceived,
                    title: if created {
                        "New price offer".to_string()
                    } else {
                        "Price offer updated".to_string()
                    },
                    message: format!(
                        "You received an offer of {} for \"{}\".",
                        format_chf(offer.amount),
                        listing.title
                    ),
                    watch_id: Some(listing.id),
                })
                .await;
        }

        Ok(OfferSubmission { offer, created })
    }

    pub async fn accept_offer(&self, id: Uuid, actor: &Actor) -> ApiResult<PriceOffer> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let (offer, listing) = lock_offer_with_listing(&mut tx, id).await?;

        check_response(&offer, &listing, actor.user_id, now)?;
        if active_purchase_exists(&mut tx, listing.id).await? {
            return Err(OfferError::AlreadySold.into());
        }

        let offer = self.set_status(&mut tx, id, OfferStatus::Accepted).await?;
        tx.commit().await?;

        tracing::info!(offer_id = %id, watch_id = %listing.id, "Price offer accepted");

        self.notifications
            .notify(NewNotification {
                user_id: offer.buyer_id,
                kind: NotificationKind::OfferAccepted,
                title: "Offer accepted".to_string(),
                message: format!(
                    "Your offer of {} for \"{}\" was accepted. Complete the purchase to secure the item.",
                    format_chf(offer.amount),
                    listing.title
                ),
                watch_id: Some(listing.id),
            })
            .await;

        Ok(offer)
    }

    pub async fn reject_offer(&self, id: Uuid, actor: &Actor) -> ApiResult<PriceOffer> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let (offer, listing) = lock_offer_with_listing(&mut tx, id).await?;

        check_response(&offer, &listing, actor.user_id, now)?;

        let offer = self.set_status(&mut tx, id, OfferStatus::Rejected).await?;
        tx.commit().await?;

        tracing::info!(offer_id = %id, watch_id = %listing.id, "Price offer rejected");

        self.notifications
            .notify(NewNotification {
                user_id: offer.buyer_id,
                kind: NotificationKind::OfferRejected,
                title: "Offer declined".to_string(),
                message: format!(
                    "Your offer of {} for \"{}\" was declined.",
                    format_chf(offer.amount),
                    listing.title
                ),
                watch_id: Some(listing.id),
            })
            .await;

        Ok(offer)
    }

    /// Buy the item at the accepted offer amount
    pub async fn checkout_offer(
        &self,
        id: Uuid,
        actor: &Actor,
        payment_protection: bool,
    ) -> ApiResult<Purchase> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let (offer, listing) = lock_offer_with_listing(&mut tx, id).await?;

        check_checkout(&offer, &listing, actor.user_id)?;

        let (purchase, _invoice) = create_purchase(
            &mut tx,
            NewPurchase {
                watch_id: listing.id,
                buyer_id: offer.buyer_id,
                seller_id: listing.seller_id,
                price: offer.amount,
                source: PurchaseSource::Offer,
                payment_protection,
            },
            &listing.title,
            &self.fees,
            now,
        )
        .await?;

        sqlx::query("UPDATE price_offers SET purchase_id = $2, updated_at = $3 WHERE id = $1")
            .bind(offer.id)
            .bind(purchase.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            offer_id = %offer.id,
            purchase_id = %purchase.id,
            "Accepted offer checked out"
        );

        self.notifications
            .notify_all(sale_notifications(&purchase, &listing.title))
            .await;

        Ok(purchase)
    }

    /// Offers the actor sent, or pending offers on the actor's listings
    pub async fn list_offers(
        &self,
        actor: &Actor,
        query: &ListOffersQuery,
    ) -> ApiResult<Vec<PriceOffer>> {
        let now = Utc::now();
        let offers = match query.list_type {
            OfferListType::Sent => {
                sqlx::query_as::<_, PriceOffer>(
                    r#"
                    SELECT * FROM price_offers
                    WHERE buyer_id = $1 AND ($2::uuid IS NULL OR watch_id = $2)
                    ORDER BY updated_at DESC
                    "#,
                )
                .bind(actor.user_id)
                .bind(query.watch_id)
                .fetch_all(&self.db_pool)
                .await?
            }
            OfferListType::Received => {
                sqlx::query_as::<_, PriceOffer>(
                    r#"
                    SELECT o.* FROM price_offers o
                    JOIN watches w ON w.id = o.watch_id
                    WHERE w.seller_id = $1
                      AND o.status = 'pending'
                      AND o.expires_at > $3
                      AND ($2::uuid IS NULL OR o.watch_id = $2)
                    ORDER BY o.updated_at DESC
                    "#,
                )
                .bind(actor.user_id)
                .bind(query.watch_id)
                .bind(now)
                .fetch_all(&self.db_pool)
                .await?
            }
        };

        Ok(offers
            .into_iter()
            .map(|mut offer| {
                offer.status = offer.effective_status(now);
                offer
            })
            .collect())
    }

    /// Persist `expired` on pending offers past their expiry
    pub async fn expire_stale_offers(&self) -> ApiResult<u64> {
        let result = sqlx::query(
            "UPDATE price_offers SET status = $1, updated_at = $2 WHERE status = $3 AND expires_at <= $2",
        )
        .bind(OfferStatus::Expired)
        .bind(Utc::now())
        .bind(OfferStatus::Pending)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn get_offer(&self, id: Uuid, actor: &Actor) -> ApiResult<PriceOffer> {
        let mut conn = self.db_pool.acquire().await?;
        let mut offer = fetch_offer(&mut conn, id).await?;
        let listing = fetch_listing(&mut conn, offer.watch_id).await?;
        if offer.buyer_id != actor.user_id && !actor.owns_or_admin(listing.seller_id) {
            return Err(ApiError::Forbidden("Not allowed to view this offer".to_string()));
        }
        offer.status = offer.effective_status(Utc::now());
        Ok(offer)
    }

    async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        status: OfferStatus,
    ) -> ApiResult<PriceOffer> {
        let offer = sqlx::query_as::<_, PriceOffer>(
            "UPDATE price_offers SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
        Ok(offer)
    }
}
