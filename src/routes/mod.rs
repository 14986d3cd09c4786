//! Route definitions for the Helvenda API

mod invoice;
mod listing;
mod offer;
mod purchase;

pub use invoice::{invoice_routes, notification_routes};
pub use listing::listing_routes;
pub use offer::offer_routes;
pub use purchase::purchase_routes;
