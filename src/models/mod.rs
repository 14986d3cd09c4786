//! Shared data models for the Helvenda backend

use serde::{Deserialize, Serialize};

/// Role carried in the bearer token
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Returns `(limit, offset)` with the page clamped to 1.. and limit to 1..=100
    ///
    /// The offset saturates; a page past the end just comes back empty.
    pub fn limit_offset(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        (limit, (self.page() - 1).saturating_mul(limit))
    }
}

/// Paginated response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

/// Render an amount in Rappen as `CHF 1'250.50`
pub fn format_chf(rappen: i64) -> String {
    let sign = if rappen < 0 { "-" } else { "" };
    let abs = rappen.unsigned_abs();
    let francs = (abs / 100).to_string();
    let mut grouped = String::with_capacity(francs.len() + francs.len() / 3);
    for (i, ch) in francs.chars().enumerate() {
        if i > 0 && (francs.len() - i) % 3 == 0 {
            grouped.push('\'');
        }
        grouped.push(ch);
    }
    format!("CHF {}{}.{:02}", sign, grouped, abs % 100)
}
