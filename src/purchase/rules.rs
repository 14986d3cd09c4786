//! Purchase state transitions

use thiserror::Error;

use super::model::{DisputeStatus, Purchase, PurchaseStatus};
use crate::auth::Actor;
use crate::error::ApiError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PurchaseError {
    #[error("Listing is already sold")]
    AlreadySold,

    #[error("Purchase is no longer active")]
    NotActive,

    #[error("Not possible while a dispute is pending")]
    DisputePending,

    #[error("Only the buyer can confirm receipt")]
    NotBuyer,

    #[error("Only the seller or an administrator can cancel a purchase")]
    NotSellerOrAdmin,

    #[error("Not allowed to view this purchase")]
    NotParty,
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        match err {
            PurchaseError::NotBuyer | PurchaseError::NotSellerOrAdmin | PurchaseError::NotParty => {
                ApiError::Forbidden(err.to_string())
            }
            PurchaseError::AlreadySold
            | PurchaseError::NotActive
            | PurchaseError::DisputePending => ApiError::Conflict(err.to_string()),
        }
    }
}

pub fn check_visible(purchase: &Purchase, actor: &Actor) -> Result<(), PurchaseError> {
    if purchase.is_party(actor.user_id) || actor.is_admin() {
        Ok(())
    } else {
        Err(PurchaseError::NotParty)
    }
}

fn check_open(purchase: &Purchase) -> Result<(), PurchaseError> {
    if purchase.status != PurchaseStatus::Active {
        return Err(PurchaseError::NotActive);
    }
    if purchase.dispute_status == DisputeStatus::Pending {
        return Err(PurchaseError::DisputePending);
    }
    Ok(())
}

/// Buyer releases the sale, ending payment protection
pub fn check_confirm_receipt(purchase: &Purchase, actor: &Actor) -> Result<(), PurchaseError> {
    if purchase.buyer_id != actor.user_id {
        return Err(PurchaseError::NotBuyer);
    }
    check_open(purchase)
}

pub fn check_cancel(purchase: &Purchase, actor: &Actor) -> Result<(), PurchaseError> {
    if !actor.owns_or_admin(purchase.seller_id) {
        return Err(PurchaseError::NotSellerOrAdmin);
    }
    check_open(purchase)
}
