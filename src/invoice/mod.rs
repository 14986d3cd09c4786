//! Invoice / fee accounting module
//!
//! Every finalized sale produces one fee invoice for the seller. Invoices go
//! overdue by time and are settled by the payment processor's webhook.

mod model;
pub mod rules;
mod service;

pub use model::*;
pub use rules::{FeePolicy, InvoiceError, InvoiceTotals};
pub(crate) use service::{insert_sale_invoice, void_sale_invoice};
pub use service::InvoiceService;
