//! Outbound email through the delivery provider's HTTP API

use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::EmailSettings;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Email API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email API rejected the message with status {0}")]
    Rejected(u16),
}

/// Thin client for the email API; a missing `api_url` turns sends into debug logs
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    settings: EmailSettings,
}

impl Mailer {
    pub fn new(settings: EmailSettings) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            settings,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.api_url.is_some()
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailError> {
        let Some(api_url) = self.settings.api_url.as_deref() else {
            tracing::debug!(to, subject, "Email API not configured, skipping delivery");
            return Ok(());
        };

        let mut request = self.client.post(api_url).json(&json!({
            "from": self.settings.from,
            "to": to,
            "subject": subject,
            "text": text,
        }));
        if let Some(key) = self.settings.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(to, subject, "Email handed to delivery API");
        Ok(())
    }
}
