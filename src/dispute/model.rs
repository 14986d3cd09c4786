//! Dispute models and request DTOs

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::purchase::{DisputeStatus, Purchase};

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DisputeComment {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub author_id: Uuid,
    pub author_role: CommentAuthorRole,
    pub content: String,
    pub attachments: Vec<String>,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "comment_author_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CommentAuthorRole {
    Buyer,
    Seller,
    Admin,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpenDisputeRequest {
    #[validate(length(min = 3, max = 200))]
    pub reason: String,
    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResolveDisputeRequest {
    pub outcome: DisputeStatus,
    #[validate(length(max = 5000))]
    pub resolution: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListDisputesQuery {
    pub status: Option<DisputeStatus>,
    #[serde(default)]
    pub overdue: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// A dispute as the parties and admins see it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeView {
    pub purchase_id: Uuid,
    pub watch_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub status: DisputeStatus,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub attachments: Vec<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub opened_by: Option<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub days_until_decision: Option<i64>,
    pub deadline_passed: bool,
}

impl DisputeView {
    pub fn from_purchase(purchase: Purchase, now: DateTime<Utc>) -> Self {
        let pending = purchase.dispute_status == DisputeStatus::Pending;
        let days_until_decision = purchase
            .dispute_deadline
            .filter(|_| pending)
            .map(|deadline| super::rules::days_until(deadline, now));
        let deadline_passed = pending && purchase.dispute_deadline.is_some_and(|d| d < now);

        Self {
            purchase_id: purchase.id,
            watch_id: purchase.watch_id,
            buyer_id: purchase.buyer_id,
            seller_id: purchase.seller_id,
            status: purchase.dispute_status,
            reason: purchase.dispute_reason,
            description: purchase.dispute_description,
            attachments: purchase.dispute_attachments,
            opened_at: purchase.dispute_opened_at,
            opened_by: purchase.dispute_opened_by,
            deadline: purchase.dispute_deadline,
            resolved_at: purchase.dispute_resolved_at,
            resolution: purchase.dispute_resolution,
            escalated_at: purchase.dispute_escalated_at,
            days_until_decision,
            deadline_passed,
        }
    }
}
