//! Notification service - in-app rows plus best-effort email

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::mailer::Mailer;
use super::model::{ListNotificationsQuery, NewNotification, Notification, NotificationKind};
use crate::error::{ApiError, ApiResult};
use crate::models::{PaginatedResponse, PaginationParams};

/// Delivers notifications; delivery failures never reach the caller
pub struct NotificationService {
    db_pool: PgPool,
    mailer: Mailer,
}

impl NotificationService {
    pub fn new(db_pool: PgPool, mailer: Mailer) -> Self {
        Self { db_pool, mailer }
    }

    pub async fn notify(&self, notification: NewNotification) {
        let inserted = sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, watch_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.watch_id)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await;

        if let Err(e) = inserted {
            tracing::warn!(
                user_id = %notification.user_id,
                kind = ?notification.kind,
                error = %e,
                "Failed to store notification"
            );
        }

        if !self.mailer.is_configured() {
            return;
        }

        let email: Option<String> =
            match sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
                .bind(notification.user_id)
                .fetch_optional(&self.db_pool)
                .await
            {
                Ok(email) => email,
                Err(e) => {
                    tracing::warn!(user_id = %notification.user_id, error = %e, "Failed to look up email address");
                    None
                }
            };

        if let Some(email) = email {
            let mailer = self.mailer.clone();
            tokio::spawn(async move {
                if let Err(e) = mailer
                    .send(&email, &notification.title, &notification.message)
                    .await
                {
                    tracing::warn!(
                        user_id = %notification.user_id,
                        error = %e,
                        "Failed to send notification email"
                    );
                }
            });
        }
    }

    pub async fn notify_all(&self, notifications: Vec<NewNotification>) {
        for notification in notifications {
            self.notify(notification).await;
        }
    }

    /// Send the same notification to every administrator
    pub async fn notify_admins(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        watch_id: Option<Uuid>,
    ) {
        let admins: Vec<Uuid> = match sqlx::query_scalar("SELECT id FROM users WHERE is_admin")
            .fetch_all(&self.db_pool)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load administrators for notification");
                return;
            }
        };

        for user_id in admins {
            self.notify(NewNotification {
                user_id,
                kind,
                title: title.to_string(),
                message: message.to_string(),
                watch_id,
            })
            .await;
        }
    }

    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        query: &ListNotificationsQuery,
    ) -> ApiResult<PaginatedResponse<Notification>> {
        let params = PaginationParams {
            page: query.page,
            limit: query.limit,
        };
        let (limit, offset) = params.limit_offset();

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)",
        )
        .bind(user_id)
        .bind(query.unread_only)
        .fetch_one(&self.db_pool)
        .await?;

        let data = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(query.unread_only)
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

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> ApiResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))
    }
}
