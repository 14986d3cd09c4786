//! Fee and VAT arithmetic, all in Rappen and basis points

use chrono::{DateTime, Datelike, Duration, Utc};
use thiserror::Error;

use super::model::InvoiceStatus;
use crate::error::ApiError;

const BPS_DENOMINATOR: i64 = 10_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvoiceError {
    #[error("Invoice is already paid")]
    AlreadyPaid,

    #[error("Invoice was cancelled")]
    Cancelled,

    #[error("Payment amount {received} does not match invoice total {expected}")]
    AmountMismatch { expected: i64, received: i64 },
}

impl From<InvoiceError> for ApiError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::AlreadyPaid | InvoiceError::Cancelled => {
                ApiError::Conflict(err.to_string())
            }
            InvoiceError::AmountMismatch { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

/// How the platform charges sellers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub vat_rate_bps: i64,
    pub fee_bps: i64,
    pub min_fee: i64,
    pub max_fee: i64,
    pub due_days: i64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            vat_rate_bps: 810,
            fee_bps: 1_000,
            min_fee: 0,
            max_fee: 22_000,
            due_days: 14,
        }
    }
}

impl FeePolicy {
    /// Success fee on a sale, clamped to the configured bounds
    pub fn platform_fee(&self, price: i64) -> i64 {
        apply_bps(price, self.fee_bps).clamp(self.min_fee, self.max_fee)
    }

    pub fn due_date(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::days(self.due_days)
    }
}

/// `amount * bps / 10000`, rounded half up
pub fn apply_bps(amount: i64, bps: i64) -> i64 {
    let scaled = i128::from(amount) * i128::from(bps);
    let rounded = (scaled + i128::from(BPS_DENOMINATOR / 2)).div_euclid(i128::from(BPS_DENOMINATOR));
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: i64,
    pub vat_amount: i64,
    pub total: i64,
}

pub fn compute_totals(line_totals: &[i64], vat_rate_bps: i64) -> InvoiceTotals {
    let subtotal: i64 = line_totals.iter().sum();
    let vat_amount = apply_bps(subtotal, vat_rate_bps);
    InvoiceTotals {
        subtotal,
        vat_amount,
        total: subtotal + vat_amount,
    }
}

pub fn is_overdue(status: InvoiceStatus, due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    status == InvoiceStatus::Pending && due_date < now
}

/// A capture may settle a pending or overdue invoice for its exact total
pub fn check_payment(status: InvoiceStatus, total: i64, amount: i64) -> Result<(), InvoiceError> {
    match status {
        InvoiceStatus::Paid => return Err(InvoiceError::AlreadyPaid),
        InvoiceStatus::Cancelled => return Err(InvoiceError::Cancelled),
        InvoiceStatus::Pending | InvoiceStatus::Overdue => {}
    }
    if amount != total {
        return Err(InvoiceError::AmountMismatch {
            expected: total,
            received: amount,
        });
    }
    Ok(())
}

/// Unpaid invoices are voided with their sale; paid ones stay as booked
pub fn is_voidable(status: InvoiceStatus) -> bool {
    matches!(status, InvoiceStatus::Pending | InvoiceStatus::Overdue)
}

/// `HV-2025-000042`
pub fn invoice_number(issued_at: DateTime<Utc>, sequence: i64) -> String {
    format!("HV-{}-{:06}", issued_at.year(), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn vat_rounds_half_up() {
        // 8.1% of CHF 220.00
        assert_eq!(apply_bps(22_000, 810), 1_782);
        // 8.1% of CHF 0.50 is 4.05 Rappen
        assert_eq!(apply_bps(50, 810), 4);
        // 8.1% of CHF 1.50 is 12.15 Rappen
        assert_eq!(apply_bps(150, 810), 12);
        // exactly half a Rappen rounds up
        assert_eq!(apply_bps(5, 1_000), 1);
        assert_eq!(apply_bps(0, 810), 0);
    }

    #[test]
    fn totals_sum_lines_then_add_vat() {
        let totals = compute_totals(&[10_000, 2_500], 810);
        assert_eq!(totals.subtotal, 12_500);
        assert_eq!(totals.vat_amount, 1_013);
        assert_eq!(totals.total, 13_513);
    }

    #[test]
    fn platform_fee_is_clamped() {
        let policy = FeePolicy::default();
        assert_eq!(policy.platform_fee(65_000), 6_500);
        assert_eq!(policy.platform_fee(1_000_000), 22_000);

        let with_floor = FeePolicy {
            min_fee: 500,
            ..policy
        };
        assert_eq!(with_floor.platform_fee(1_000), 500);
    }

    #[test]
    fn only_pending_invoices_become_overdue() {
        let now = Utc::now();
        let yesterday = now - Duration::days(1);
        assert!(is_overdue(InvoiceStatus::Pending, yesterday, now));
        assert!(!is_overdue(InvoiceStatus::Pending, now + Duration::days(1), now));
        assert!(!is_overdue(InvoiceStatus::Paid, yesterday, now));
        assert!(!is_overdue(InvoiceStatus::Overdue, yesterday, now));
        assert!(!is_overdue(InvoiceStatus::Cancelled, yesterday, now));
    }

    #[test]
    fn cancelled_sale_voids_only_unpaid_invoices() {
        assert!(is_voidable(InvoiceStatus::Pending));
        assert!(is_voidable(InvoiceStatus::Overdue));
        assert!(!is_voidable(InvoiceStatus::Paid));
        assert!(!is_voidable(InvoiceStatus::Cancelled));
        assert_eq!(
            check_payment(InvoiceStatus::Cancelled, 7_027, 7_027),
            Err(InvoiceError::Cancelled)
        );
    }

    #[test]
    fn paid_is_terminal() {
        assert_eq!(
            check_payment(InvoiceStatus::Paid, 7_027, 7_027),
            Err(InvoiceError::AlreadyPaid)
        );
        assert!(check_payment(InvoiceStatus::Overdue, 7_027, 7_027).is_ok());
        assert_eq!(
            check_payment(InvoiceStatus::Pending, 7_027, 7_000),
            Err(InvoiceError::AmountMismatch {
                expected: 7_027,
                received: 7_000
            })
        );
    }

    #[test]
    fn invoice_numbers_are_zero_padded() {
        let issued = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        assert_eq!(invoice_number(issued, 42), "HV-2025-000042");
        assert_eq!(invoice_number(issued, 1_234_567), "HV-2025-1234567");
    }
}
