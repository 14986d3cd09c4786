//! Notification domain module
//!
//! In-app notifications and the email side channel.

mod mailer;
mod model;
mod service;

pub use mailer::{MailError, Mailer};
pub use model::*;
pub use service::NotificationService;
