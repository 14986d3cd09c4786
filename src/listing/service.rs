//! Listing service layer - publication, edits, moderation and admin removal

use chrono::Utc;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use super::model::{
    CreateListingRequest, DeletionSummary, ListListingsQuery, Listing, ListingDetail,
    ModerationStatus, UpdateListingRequest,
};
use super::rules::{apply_update, validate_new_listing};
use crate::auth::Actor;
use crate::bid::{bid_stats, current_price};
use crate::error::{ApiError, ApiResult};
use crate::models::{PaginatedResponse, PaginationParams};
use crate::notification::{NewNotification, NotificationKind, NotificationService};
use crate::purchase::active_purchase_exists;

/// Load a listing and hold its row lock until the transaction ends
///
/// Every write that depends on "who is winning" or "is it sold" goes through
/// this lock, so concurrent bids and buy-now requests on one listing serialize.
pub(crate) async fn lock_listing(conn: &mut PgConnection, id: Uuid) -> ApiResult<Listing> {
    sqlx::query_as::<_, Listing>("SELECT * FROM watches WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found".to_string()))
}

pub(crate) async fn fetch_listing(conn: &mut PgConnection, id: Uuid) -> ApiResult<Listing> {
    sqlx::query_as::<_, Listing>("SELECT * FROM watches WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found".to_string()))
}

#[derive(Clone)]
pub struct ListingService {
    db_pool: PgPool,
    notifications: Arc<NotificationService>,
    review_required: bool,
}

impl ListingService {
    pub fn new(
        db_pool: PgPool,
        notifications: Arc<NotificationService>,
        review_required: bool,
    ) -> Self {
        Self {
            db_pool,
            notifications,
            review_required,
        }
    }

    pub async fn create_listing(
        &self,
        actor: &Actor,
        request: CreateListingRequest,
    ) -> ApiResult<Listing> {
        let now = Utc::now();
        let terms = validate_new_listing(&request, now)?;
        let status = if self.review_required {
            ModerationStatus::Pending
        } else {
            ModerationStatus::Approved
        };

        let listing = sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO watches (
                id, seller_id, title, description, price, buy_now_price, is_auction,
                auction_start, auction_end, moderation_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id)
        .bind(request.title.trim())
        .bind(&request.description)
        .bind(terms.price)
        .bind(terms.buy_now_price)
        .bind(terms.is_auction)
        .bind(terms.auction_start)
        .bind(terms.auction_end)
        .bind(status)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            watch_id = %listing.id,
            seller_id = %actor.user_id,
            is_auction = listing.is_auction,
            "Listing published"
        );

        Ok(listing)
    }

    pub async fn get_listing(&self, id: Uuid) -> ApiResult<ListingDetail> {
        let mut conn = self.db_pool.acquire().await?;
        let listing = fetch_listing(&mut conn, id).await?;
        let stats = bid_stats(&mut conn, id).await?;
        let is_sold = active_purchase_exists(&mut conn, id).await?;

        Ok(ListingDetail {
            current_price: current_price(listing.price, stats.highest_amount),
            bid_count: stats.bid_count,
            highest_bidder_id: stats.highest_bidder_id,
            auction_phase: listing.auction_phase(Utc::now()),
            is_sold,
            listing,
        })
    }

    /// Browse listings in one moderation state
    pub async fn list_listings(
        &self,
        query: &ListListingsQuery,
        status: ModerationStatus,
    ) -> ApiResult<PaginatedResponse<Listing>> {
        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (limit, offset) = params.limit_offset();

        let mut count_query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM watches WHERE 1=1");
        push_filters(&mut count_query, query, status);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        let mut select: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM watches WHERE 1=1");
        push_filters(&mut select, query, status);
        select.push(" ORDER BY created_at DESC LIMIT ");
        select.push_bind(limit);
        select.push(" OFFSET ");
        select.push_bind(offset);

        let data = select
            .build_query_as::<Listing>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(PaginatedResponse {
            data,
            total,
            page: params.page(),
            limit,
        })
    }

    pub async fn update_listing(
        &self,
        id: Uuid,
        actor: &Actor,
        patch: UpdateListingRequest,
    ) -> ApiResult<Listing> {
        let mut tx = self.db_pool.begin().await?;
        let current = lock_listing(&mut tx, id).await?;

        if !actor.owns_or_admin(current.seller_id) {
            return Err(ApiError::Forbidden(
                "Only the seller can edit this listing".to_string(),
            ));
        }

        let stats = bid_stats(&mut tx, id).await?;
        let updated = apply_update(&current, &patch, stats.bid_count, Utc::now())?;

        let listing = sqlx::query_as::<_, Listing>(
            r#"
            UPDATE watches
            SET title = $2, description = $3, price = $4, buy_now_price = $5,
                is_auction = $6, auction_start = $7, auction_end = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(updated.price)
        .bind(updated.buy_now_price)
        .bind(updated.is_auction)
        .bind(updated.auction_start)
        .bind(updated.auction_end)
        .bind(updated.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(watch_id = %id, actor = %actor.user_id, "Listing updated");
        Ok(listing)
    }

    pub async fn moderate_listing(
        &self,
        id: Uuid,
        admin: &Actor,
        status: ModerationStatus,
    ) -> ApiResult<Listing> {
        let listing = sqlx::query_as::<_, Listing>(
            "UPDATE watches SET moderation_status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Listing not found".to_string()))?;

        tracing::info!(watch_id = %id, admin = %admin.user_id, status = ?status, "Listing moderated");
        Ok(listing)
    }

    /// Remove a listing and everything that references it, atomically
    pub async fn delete_listing(&self, id: Uuid, admin: &Actor) -> ApiResult<DeletionSummary> {
        let mut tx = self.db_pool.begin().await?;
        let listing = lock_listing(&mut tx, id).await?;

        let mut summary = DeletionSummary::default();

        summary.invoice_items_unlinked = sqlx::query(
            r#"
            UPDATE invoice_items SET watch_id = NULL, purchase_id = NULL
            WHERE watch_id = $1
               OR purchase_id IN (SELECT id FROM purchases WHERE watch_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.dispute_comments = sqlx::query(
            "DELETE FROM dispute_comments WHERE purchase_id IN (SELECT id FROM purchases WHERE watch_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        summary.notifications = delete_where_watch(&mut tx, "notifications", id).await?;
        summary.bids = delete_where_watch(&mut tx, "bids", id).await?;
        summary.favorites = delete_where_watch(&mut tx, "favorites", id).await?;
        summary.price_offers = delete_where_watch(&mut tx, "price_offers", id).await?;
        summary.purchases = delete_where_watch(&mut tx, "purchases", id).await?;
        summary.messages = delete_where_watch(&mut tx, "messages", id).await?;
        summary.categories = delete_where_watch(&mut tx, "watch_categories", id).await?;
        summary.views = delete_where_watch(&mut tx, "watch_views", id).await?;
        summary.reports = delete_where_watch(&mut tx, "reports", id).await?;

        sqlx::query("DELETE FROM watches WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::warn!(
            watch_id = %id,
            admin = %admin.user_id,
            summary = ?summary,
            "Listing deleted by admin"
        );

        self.notifications
            .notify(NewNotification {
                user_id: listing.seller_id,
                kind: NotificationKind::ListingRemoved,
                title: "Listing removed".to_string(),
                message: format!(
                    "Your listing \"{}\" was removed by an administrator.",
                    listing.title
                ),
                watch_id: None,
            })
            .await;

        Ok(summary)
    }
}

fn push_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    query: &ListListingsQuery,
    status: ModerationStatus,
) {
    builder.push(" AND moderation_status = ");
    builder.push_bind(status);
    if let Some(seller_id) = query.seller_id {
        builder.push(" AND seller_id = ");
        builder.push_bind(seller_id);
    }
    if let Some(is_auction) = query.is_auction {
        builder.push(" AND is_auction = ");
        builder.push_bind(is_auction);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND title ILIKE ");
        builder.push_bind(format!("%{}%", search.replace('%', "\\%").replace('_', "\\_")));
    }
}

/// `table` is always one of the fixed names above, never user input
async fn delete_where_watch(conn: &mut PgConnection, table: &str, id: Uuid) -> ApiResult<u64> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE watch_id = $1", table))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
