//! HTTP handlers for the Helvenda API

mod bid;
mod dispute;
mod health;
mod invoice;
mod listing;
mod notification;
mod offer;
mod purchase;

pub use bid::*;
pub use dispute::*;
pub use health::*;
pub use invoice::*;
pub use listing::*;
pub use notification::*;
pub use offer::*;
pub use purchase::*;
