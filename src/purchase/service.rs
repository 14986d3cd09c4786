//! Purchase service layer - recording sales and moving them to completion

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::model::{
    CancelPurchaseRequest, ListPurchasesQuery, NewPurchase, Purchase, PurchaseRole,
    PurchaseSource, PurchaseStatus, PurchaseSummary,
};
use super::rules::{check_cancel, check_confirm_receipt, check_visible, PurchaseError};
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::invoice::{insert_sale_invoice, void_sale_invoice, FeePolicy, Invoice};
use crate::models::{format_chf, PaginatedResponse, PaginationParams};
use crate::notification::{NewNotification, NotificationKind, NotificationService};

/// True while a non-cancelled purchase holds the listing
pub(crate) async fn active_purchase_exists(
    conn: &mut PgConnection,
    watch_id: Uuid,
) -> ApiResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM purchases WHERE watch_id = $1 AND status <> 'cancelled')",
    )
    .bind(watch_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

pub(crate) async fn lock_purchase(conn: &mut PgConnection, id: Uuid) -> ApiResult<Purchase> {
    sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound("Purchase not found".to_string()))
}

/// Record a sale and its fee invoice on the caller's transaction
///
/// The caller must hold the listing row lock.
pub(crate) async fn create_purchase(
    conn: &mut PgConnection,
    sale: NewPurchase,
    listing_title: &str,
    fees: &FeePolicy,
    now: DateTime<Utc>,
) -> ApiResult<(Purchase, Invoice)> {
    if active_purchase_exists(conn, sale.watch_id).await? {
        return Err(PurchaseError::AlreadySold.into());
    }

    let purchase = sqlx::query_as::<_, Purchase>(
        r#"
        INSERT INTO purchases (
            id, watch_id, buyer_id, seller_id, status, price, source, payment_protection, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(sale.watch_id)
    .bind(sale.buyer_id)
    .bind(sale.seller_id)
    .bind(PurchaseStatus::Active)
    .bind(sale.price)
    .bind(sale.source)
    .bind(sale.payment_protection)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    let invoice = insert_sale_invoice(conn, &purchase, listing_title, fees, now).await?;

    tracing::info!(
        purchase_id = %purchase.id,
        watch_id = %purchase.watch_id,
        buyer_id = %purchase.buyer_id,
        source = ?purchase.source,
        price = purchase.price,
        "Purchase recorded"
    );

    Ok((purchase, invoice))
}

/// Notifications sent to both parties once a sale has committed
pub(crate) fn sale_notifications(purchase: &Purchase, listing_title: &str) -> Vec<NewNotification> {
    let (buyer_kind, buyer_title) = match purchase.source {
        PurchaseSource::Auction => (NotificationKind::AuctionWon, "Auction won"),
        PurchaseSource::BuyNow | PurchaseSource::Offer => {
            (NotificationKind::ItemSold, "Purchase confirmed")
        }
    };
    let price = format_chf(purchase.price);

    vec![
        NewNotification {
            user_id: purchase.buyer_id,
            kind: buyer_kind,
            title: buyer_title.to_string(),
            message: format!("You bought \"{}\" for {}.", listing_title, price),
            watch_id: Some(purchase.watch_id),
        },
        NewNotification {
            user_id: purchase.seller_id,
            kind: NotificationKind::ItemSold,
            title: "Item sold".to_string(),
            message: format!("\"{}\" was sold for {}.", listing_title, price),
            watch_id: Some(purchase.watch_id),
        },
    ]
}

pub struct PurchaseService {
    db_pool: PgPool,
    notifications: Arc<NotificationService>,
}

impl PurchaseService {
    pub fn new(db_pool: PgPool, notifications: Arc<NotificationService>) -> Self {
        Self {
            db_pool,
            notifications,
        }
    }

    pub async fn list_purchases(
        &self,
        actor: &Actor,
        query: &ListPurchasesQuery,
    ) -> ApiResult<PaginatedResponse<PurchaseSummary>> {
        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (limit, offset) = params.limit_offset();
        let column = match query.role {
            PurchaseRole::Bought => "buyer_id",
            PurchaseRole::Sold => "seller_id",
        };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM purchases WHERE {} = $1",
            column
        ))
        .bind(actor.user_id)
        .fetch_one(&self.db_pool)
        .await?;

        let data = sqlx::query_as::<_, PurchaseSummary>(&format!(
            r#"
            SELECT p.*, w.title AS watch_title
            FROM purchases p
            JOIN watches w ON w.id = p.watch_id
            WHERE p.{} = $1
            ORDER BY p.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            column
        ))
        .bind(actor.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(PaginatedResponse {
            data,
            total,
            page: params.page(),
            limit,
        })
    }

    pub async fn get_purchase(&self, id: Uuid, actor: &Actor) -> ApiResult<PurchaseSummary> {
        let summary = sqlx::query_as::<_, PurchaseSummary>(
            r#"
            SELECT p.*, w.title AS watch_title
            FROM purchases p
            JOIN watches w ON w.id = p.watch_id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Purchase not found".to_string()))?;

        check_visible(&summary.purchase, actor)?;
        Ok(summary)
    }

    pub async fn confirm_receipt(&self, id: Uuid, actor: &Actor) -> ApiResult<Purchase> {
        let mut tx = self.db_pool.begin().await?;
        let purchase = lock_purchase(&mut tx, id).await?;
        check_confirm_receipt(&purchase, actor)?;

        let purchase = sqlx::query_as::<_, Purchase>(
            "UPDATE purchases SET status = $2, completed_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(PurchaseStatus::Completed)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(purchase_id = %id, buyer_id = %actor.user_id, "Receipt confirmed");
        Ok(purchase)
    }

    /// Cancel an active sale; the listing becomes available again
    pub async fn cancel_purchase(
        &self,
        id: Uuid,
        actor: &Actor,
        request: &CancelPurchaseRequest,
    ) -> ApiResult<Purchase> {
        let mut tx = self.db_pool.begin().await?;
        let purchase = lock_purchase(&mut tx, id).await?;
        check_cancel(&purchase, actor)?;

        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty());

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            UPDATE purchases SET status = $2, cancelled_at = $3, cancel_reason = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(PurchaseStatus::Cancelled)
        .bind(Utc::now())
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        void_sale_invoice(&mut tx, id).await?;

        tx.commit().await?;

        tracing::info!(purchase_id = %id, actor = %actor.user_id, "Purchase cancelled");

        self.notifications
            .notify(NewNotification {
                user_id: purchase.buyer_id,
                kind: NotificationKind::PurchaseCancelled,
                title: "Purchase cancelled".to_string(),
                message: match reason {
                    Some(reason) => format!("Your purchase was cancelled: {}", reason),
                    None => "Your purchase was cancelled.".to_string(),
                },
                watch_id: Some(purchase.watch_id),
            })
            .await;

        Ok(purchase)
    }
}
