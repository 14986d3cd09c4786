//! Dispute service layer

use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::model::{
    AddCommentRequest, DisputeComment, DisputeView, ListDisputesQuery, OpenDisputeRequest,
    ResolveDisputeRequest,
};
use super::rules::{
    author_role, check_close, check_comment, check_open, check_resolve, check_withdraw,
    decision_deadline, is_escalation_due, visible_comments,
};
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::models::{PaginatedResponse, PaginationParams};
use crate::notification::{NewNotification, NotificationKind, NotificationService};
use crate::purchase::{lock_purchase, DisputeStatus, Purchase};

pub struct DisputeService {
    db_pool: PgPool,
    notifications: Arc<NotificationService>,
    window_days: i64,
}

impl DisputeService {
    pub fn new(db_pool: PgPool, notifications: Arc<NotificationService>, window_days: i64) -> Self {
        Self {
            db_pool,
            notifications,
            window_days,
        }
    }

    async fn fetch_purchase(&self, purchase_id: Uuid) -> ApiResult<Purchase> {
        sqlx::query_as::<_, Purchase>("SELECT * FROM purchases WHERE id = $1")
            .bind(purchase_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("Purchase not found".to_string()))
    }

    pub async fn open_dispute(
        &self,
        purchase_id: Uuid,
        actor: &Actor,
        request: &OpenDisputeRequest,
    ) -> ApiResult<DisputeView> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let purchase = lock_purchase(&mut tx, purchase_id).await?;

        check_open(&purchase, actor, &request.attachments)?;

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            UPDATE purchases
            SET dispute_status = $2, dispute_opened_at = $3, dispute_opened_by = $4,
                dispute_deadline = $5, dispute_reason = $6, dispute_description = $7,
                dispute_attachments = $8
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(purchase_id)
        .bind(DisputeStatus::Pending)
        .bind(now)
        .bind(actor.user_id)
        .bind(decision_deadline(now, self.window_days))
        .bind(request.reason.trim())
        .bind(&request.description)
        .bind(&request.attachments)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            purchase_id = %purchase_id,
            opened_by = %actor.user_id,
            "Dispute opened"
        );

        let counterparty = if actor.user_id == purchase.buyer_id {
            purchase.seller_id
        } else {
            purchase.buyer_id
        };
        let message = format!(
            "A dispute was opened for purchase {}: {}",
            purchase.id,
            request.reason.trim()
        );
        self.notifications
            .notify(NewNotification {
                user_id: counterparty,
                kind: NotificationKind::DisputeOpened,
                title: "Dispute opened".to_string(),
                message: message.clone(),
                watch_id: Some(purchase.watch_id),
            })
            .await;
        self.notifications
            .notify_admins(
                NotificationKind::DisputeOpened,
                "New dispute",
                &message,
                Some(purchase.watch_id),
            )
            .await;

        Ok(DisputeView::from_purchase(purchase, now))
    }

    pub async fn get_dispute(&self, purchase_id: Uuid, actor: &Actor) -> ApiResult<DisputeView> {
        let purchase = self.fetch_purchase(purchase_id).await?;
        author_role(&purchase, actor)?;
        if purchase.dispute_status == DisputeStatus::None {
            return Err(ApiError::NotFound("No dispute for this purchase".to_string()));
        }
        Ok(DisputeView::from_purchase(purchase, Utc::now()))
    }

    pub async fn list_comments(
        &self,
        purchase_id: Uuid,
        actor: &Actor,
    ) -> ApiResult<Vec<DisputeComment>> {
        let purchase = self.fetch_purchase(purchase_id).await?;
        author_role(&purchase, actor)?;

        let comments = sqlx::query_as::<_, DisputeComment>(
            "SELECT * FROM dispute_comments WHERE purchase_id = $1 ORDER BY created_at ASC",
        )
        .bind(purchase_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(visible_comments(comments, actor))
    }

    pub async fn add_comment(
        &self,
        purchase_id: Uuid,
        actor: &Actor,
        request: &AddCommentRequest,
    ) -> ApiResult<DisputeComment> {
        let mut tx = self.db_pool.begin().await?;
        let purchase = lock_purchase(&mut tx, purchase_id).await?;

        let role = check_comment(&purchase, actor, request.is_internal, &request.attachments)?;

        let comment = sqlx::query_as::<_, DisputeComment>(
            r#"
            INSERT INTO dispute_comments (
                id, purchase_id, author_id, author_role, content, attachments, is_internal, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(purchase_id)
        .bind(actor.user_id)
        .bind(role)
        .bind(request.content.trim())
        .bind(&request.attachments)
        .bind(request.is_internal)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(purchase_id = %purchase_id, role = ?role, "Dispute comment added");

        if !comment.is_internal {
            let recipients = [purchase.buyer_id, purchase.seller_id]
                .into_iter()
                .filter(|id| *id != actor.user_id)
                .map(|user_id| NewNotification {
                    user_id,
                    kind: NotificationKind::DisputeComment,
                    title: "New comment on your dispute".to_string(),
                    message: comment.content.chars().take(200).collect(),
                    watch_id: Some(purchase.watch_id),
                })
                .collect();
            self.notifications.notify_all(recipients).await;
        }

        Ok(comment)
    }

    pub async fn resolve_dispute(
        &self,
        purchase_id: Uuid,
        admin: &Actor,
        request: &ResolveDisputeRequest,
    ) -> ApiResult<DisputeView> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let purchase = lock_purchase(&mut tx, purchase_id).await?;

        check_resolve(&purchase, request.outcome)?;

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            UPDATE purchases
            SET dispute_status = $2, dispute_resolved_at = $3, dispute_resolution = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(purchase_id)
        .bind(request.outcome)
        .bind(now)
        .bind(request.resolution.as_deref().map(str::trim))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            purchase_id = %purchase_id,
            admin = %admin.user_id,
            outcome = ?request.outcome,
            "Dispute decided"
        );

        self.notify_parties(&purchase, "Dispute decided").await;
        Ok(DisputeView::from_purchase(purchase, now))
    }

    /// The opener takes the dispute back; recorded as resolved
    pub async fn withdraw_dispute(&self, purchase_id: Uuid, actor: &Actor) -> ApiResult<DisputeView> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;
        let purchase = lock_purchase(&mut tx, purchase_id).await?;

        check_withdraw(&purchase, actor)?;

        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
            UPDATE purchases
            SET dispute_status = $2, dispute_resolved_at = $3,
                dispute_resolution = 'Withdrawn by the party who opened it'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(purchase_id)
        .bind(DisputeStatus::Resolved)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(purchase_id = %purchase_id, "Dispute withdrawn");

        self.notify_parties(&purchase, "Dispute withdrawn").await;
        Ok(DisputeView::from_purchase(purchase, now))
    }

    pub async fn close_dispute(&self, purchase_id: Uuid, admin: &Actor) -> ApiResult<DisputeView> {
        let mut tx = self.db_pool.begin().await?;
        let purchase = lock_purchase(&mut tx, purchase_id).await?;

        check_close(&purchase)?;

        let purchase = sqlx::query_as::<_, Purchase>(
            "UPDATE purchases SET dispute_status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(purchase_id)
        .bind(DisputeStatus::Closed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(purchase_id = %purchase_id, admin = %admin.user_id, "Dispute closed");
        Ok(DisputeView::from_purchase(purchase, Utc::now()))
    }

    /// Admin overview; `overdue` narrows to pending disputes past their deadline
    pub async fn list_disputes(
        &self,
        query: &ListDisputesQuery,
    ) -> ApiResult<PaginatedResponse<DisputeView>> {
        let now = Utc::now();
        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (limit, offset) = params.limit_offset();

        let filter = r#"
            WHERE dispute_status <> 'none'
              AND ($1::dispute_status IS NULL OR dispute_status = $1)
              AND (NOT $2 OR (dispute_status = 'pending' AND dispute_deadline < $3))
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM purchases {}", filter))
            .bind(query.status)
            .bind(query.overdue)
            .bind(now)
            .fetch_one(&self.db_pool)
            .await?;

        let purchases = sqlx::query_as::<_, Purchase>(&format!(
            "SELECT * FROM purchases {} ORDER BY dispute_deadline ASC NULLS LAST LIMIT $4 OFFSET $5",
            filter
        ))
        .bind(query.status)
        .bind(query.overdue)
        .bind(now)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(PaginatedResponse {
            data: purchases
                .into_iter()
                .map(|p| DisputeView::from_purchase(p, now))
                .collect(),
            total,
            page: params.page(),
            limit,
        })
    }

    /// Flag pending disputes past their deadline to the admins, once each
    pub async fn escalate_overdue(&self) -> ApiResult<usize> {
        let now = Utc::now();
        let candidates = sqlx::query_as::<_, Purchase>(
            r#"
            SELECT * FROM purchases
            WHERE dispute_status = 'pending'
              AND dispute_escalated_at IS NULL
              AND dispute_deadline < $1
            "#,
        )
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        let mut escalated = 0;
        for purchase in candidates.iter().filter(|p| is_escalation_due(p, now)) {
            // Concurrent sweeps race here; only the first update wins.
            let claimed = sqlx::query(
                "UPDATE purchases SET dispute_escalated_at = $2 WHERE id = $1 AND dispute_escalated_at IS NULL",
            )
            .bind(purchase.id)
            .bind(now)
            .execute(&self.db_pool)
            .await?
            .rows_affected();
            if claimed == 0 {
                continue;
            }
            escalated += 1;

            tracing::warn!(purchase_id = %purchase.id, "Dispute deadline passed without decision");
            self.notifications
                .notify_admins(
                    NotificationKind::DisputeEscalated,
                    "Dispute overdue",
                    &format!(
                        "The dispute on purchase {} passed its decision deadline.",
                        purchase.id
                    ),
                    Some(purchase.watch_id),
                )
                .await;
        }

        Ok(escalated)
    }

    async fn notify_parties(&self, purchase: &Purchase, title: &str) {
        let message = match purchase.dispute_resolution.as_deref() {
            Some(note) if !note.is_empty() => format!("Outcome: {}. {}", purchase.dispute_status, note),
            _ => format!("Outcome: {}.", purchase.dispute_status),
        };
        self.notifications
            .notify_all(
                [purchase.buyer_id, purchase.seller_id]
                    .into_iter()
                    .map(|user_id| NewNotification {
                        user_id,
                        kind: NotificationKind::DisputeResolved,
                        title: title.to_string(),
                        message: message.clone(),
                        watch_id: Some(purchase.watch_id),
                    })
                    .collect(),
            )
            .await;
    }
}
