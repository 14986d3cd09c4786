//! Dispute sub-flow
//!
//! A dispute lives on its purchase row and carries a comment thread. Either
//! party opens it, admins decide it, and the reconciler escalates disputes
//! that pass their decision deadline.

mod model;
pub mod rules;
mod service;

pub use model::*;
pub use rules::{DisputeError, MAX_ATTACHMENTS};
pub use service::DisputeService;
