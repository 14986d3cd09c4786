//! Price offer negotiation module
//!
//! Buyers propose a lower price on fixed-price listings; sellers accept or
//! reject, and an accepted offer is bought through checkout.

mod model;
pub mod rules;
mod service;

pub use model::*;
pub use rules::{OfferError, OfferPlan, OfferPolicy};
pub use service::{OfferService, OfferSubmission};
