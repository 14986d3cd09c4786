//! Listing domain module
//!
//! Contains the listing record, its publication and edit rules, and the
//! service that owns the `watches` table.

mod model;
pub mod rules;
mod service;

pub use model::*;
pub use rules::{ListingError, SaleTerms};
pub(crate) use service::{fetch_listing, lock_listing};
pub use service::ListingService;
