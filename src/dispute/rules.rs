//! Dispute lifecycle rules
//!
//! `none -> pending -> resolved | rejected -> closed`. The comment thread is
//! writable only while the dispute is pending.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::model::{CommentAuthorRole, DisputeComment};
use crate::auth::Actor;
use crate::error::ApiError;
use crate::purchase::{DisputeStatus, Purchase, PurchaseStatus};

pub const MAX_ATTACHMENTS: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisputeError {
    #[error("Only the buyer, the seller or an administrator can access this dispute")]
    NotParty,

    #[error("Cancelled purchases cannot be disputed")]
    PurchaseCancelled,

    #[error("A dispute has already been opened for this purchase")]
    AlreadyOpened,

    #[error("There is no open dispute for this purchase")]
    NotPending,

    #[error("The dispute is closed for comments")]
    ThreadClosed,

    #[error("Only administrators can write internal comments")]
    InternalNotAllowed,

    #[error("At most {max} attachments are allowed")]
    TooManyAttachments { max: usize },

    #[error("Attachment is not a valid URL: {0}")]
    InvalidAttachment(String),

    #[error("A dispute can only be decided as resolved or rejected")]
    InvalidOutcome,

    #[error("Only the party who opened the dispute can withdraw it")]
    NotOpener,

    #[error("Only decided disputes can be closed")]
    NotDecided,
}

impl From<DisputeError> for ApiError {
    fn from(err: DisputeError) -> Self {
        match err {
            DisputeError::NotParty | DisputeError::InternalNotAllowed | DisputeError::NotOpener => {
                ApiError::Forbidden(err.to_string())
            }
            DisputeError::PurchaseCancelled
            | DisputeError::AlreadyOpened
            | DisputeError::NotPending
            | DisputeError::ThreadClosed
            | DisputeError::NotDecided => ApiError::Conflict(err.to_string()),
            DisputeError::TooManyAttachments { .. }
            | DisputeError::InvalidAttachment(_)
            | DisputeError::InvalidOutcome => ApiError::BadRequest(err.to_string()),
        }
    }
}

/// Role the actor writes under; parties first, then admins
pub fn author_role(purchase: &Purchase, actor: &Actor) -> Result<CommentAuthorRole, DisputeError> {
    if actor.user_id == purchase.buyer_id {
        Ok(CommentAuthorRole::Buyer)
    } else if actor.user_id == purchase.seller_id {
        Ok(CommentAuthorRole::Seller)
    } else if actor.is_admin() {
        Ok(CommentAuthorRole::Admin)
    } else {
        Err(DisputeError::NotParty)
    }
}

pub fn check_attachments(attachments: &[String]) -> Result<(), DisputeError> {
    if attachments.len() > MAX_ATTACHMENTS {
        return Err(DisputeError::TooManyAttachments {
            max: MAX_ATTACHMENTS,
        });
    }
    if let Some(bad) = attachments.iter().find(|url| !validator::validate_url(url.as_str())) {
        return Err(DisputeError::InvalidAttachment(bad.clone()));
    }
    Ok(())
}

pub fn check_open(
    purchase: &Purchase,
    actor: &Actor,
    attachments: &[String],
) -> Result<(), DisputeError> {
    if !purchase.is_party(actor.user_id) {
        return Err(DisputeError::NotParty);
    }
    if purchase.status == PurchaseStatus::Cancelled {
        return Err(DisputeError::PurchaseCancelled);
    }
    if purchase.dispute_status != DisputeStatus::None {
        return Err(DisputeError::AlreadyOpened);
    }
    check_attachments(attachments)
}

pub fn decision_deadline(opened_at: DateTime<Utc>, window_days: i64) -> DateTime<Utc> {
    opened_at + Duration::days(window_days)
}

/// Whole days left until `deadline`, rounded up, never negative
pub fn days_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (deadline - now).num_seconds();
    if seconds <= 0 {
        0
    } else {
        (seconds + 86_399) / 86_400
    }
}

pub fn check_comment(
    purchase: &Purchase,
    actor: &Actor,
    is_internal: bool,
    attachments: &[String],
) -> Result<CommentAuthorRole, DisputeError> {
    let role = author_role(purchase, actor)?;
    if purchase.dispute_status != DisputeStatus::Pending {
        return Err(DisputeError::ThreadClosed);
    }
    if is_internal && role != CommentAuthorRole::Admin {
        return Err(DisputeError::InternalNotAllowed);
    }
    check_attachments(attachments)?;
    Ok(role)
}

pub fn check_resolve(purchase: &Purchase, outcome: DisputeStatus) -> Result<(), DisputeError> {
    if !matches!(outcome, DisputeStatus::Resolved | DisputeStatus::Rejected) {
        return Err(DisputeError::InvalidOutcome);
    }
    if purchase.dispute_status != DisputeStatus::Pending {
        return Err(DisputeError::NotPending);
    }
    Ok(())
}

/// The opener withdrawing counts as a mutual resolution
pub fn check_withdraw(purchase: &Purchase, actor: &Actor) -> Result<(), DisputeError> {
    if purchase.dispute_status != DisputeStatus::Pending {
        return Err(DisputeError::NotPending);
    }
    if purchase.dispute_opened_by != Some(actor.user_id) {
        return Err(DisputeError::NotOpener);
    }
    Ok(())
}

pub fn check_close(purchase: &Purchase) -> Result<(), DisputeError> {
    match purchase.dispute_status {
        DisputeStatus::Resolved | DisputeStatus::Rejected => Ok(()),
        _ => Err(DisputeError::NotDecided),
    }
}

pub fn is_escalation_due(purchase: &Purchase, now: DateTime<Utc>) -> bool {
    purchase.dispute_status == DisputeStatus::Pending
        && purchase.dispute_escalated_at.is_none()
        && purchase.dispute_deadline.is_some_and(|deadline| deadline < now)
}

/// Drop internal comments unless the reader is an admin
pub fn visible_comments(comments: Vec<DisputeComment>, actor: &Actor) -> Vec<DisputeComment> {
    if actor.is_admin() {
        return comments;
    }
    comments.into_iter().filter(|c| !c.is_internal).collect()
}
