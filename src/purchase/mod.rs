//! Purchase domain module
//!
//! A purchase is created by an auction win, buy-now, or accepted-offer
//! checkout. At most one non-cancelled purchase exists per listing.

mod model;
pub mod rules;
mod service;

pub use model::*;
pub use rules::PurchaseError;
pub(crate) use service::{
    active_purchase_exists, create_purchase, lock_purchase, sale_notifications,
};
pub use service::PurchaseService;
