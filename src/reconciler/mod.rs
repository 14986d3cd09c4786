//! Periodic reconciliation
//!
//! Time-driven state changes happen here instead of on read: stale offers
//! expire, ended auctions are awarded, unpaid invoices go overdue, and
//! disputes past their decision deadline are escalated to admins.

use anyhow::Context;
use std::time::Duration;

use crate::middleware::RateLimiter;
use crate::state::AppState;

/// Counts from one reconciliation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub offers_expired: u64,
    pub auctions_closed: usize,
    pub invoices_overdue: usize,
    pub disputes_escalated: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Run every sweep once. Each sweep is independent; the first failure is
/// returned after the others have had their turn.
pub async fn reconcile_once(state: &AppState) -> anyhow::Result<SweepReport> {
    let mut report = SweepReport::default();

    let offers = state
        .offer_service
        .expire_stale_offers()
        .await
        .context("expiring stale offers");
    let auctions = state
        .bid_service
        .close_expired_auctions()
        .await
        .context("closing ended auctions");
    let invoices = state
        .invoice_service
        .check_overdue()
        .await
        .context("marking overdue invoices");
    let disputes = state
        .dispute_service
        .escalate_overdue()
        .await
        .context("escalating overdue disputes");

    let mut first_error = None;
    match offers {
        Ok(n) => report.offers_expired = n,
        Err(e) => first_error = first_error.or(Some(e)),
    }
    match auctions {
        Ok(n) => report.auctions_closed = n,
        Err(e) => first_error = first_error.or(Some(e)),
    }
    match invoices {
        Ok(n) => report.invoices_overdue = n,
        Err(e) => first_error = first_error.or(Some(e)),
    }
    match disputes {
        Ok(n) => report.disputes_escalated = n,
        Err(e) => first_error = first_error.or(Some(e)),
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

/// Background loop; never returns
pub async fn reconciliation_loop(state: AppState, interval: Duration, rate_limiter: RateLimiter) {
    tracing::info!(interval_secs = interval.as_secs(), "Starting reconciliation loop");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match reconcile_once(&state).await {
            Ok(report) if report.is_empty() => {
                tracing::debug!("Reconciliation pass found nothing to do");
            }
            Ok(report) => {
                tracing::info!(
                    offers_expired = report.offers_expired,
                    auctions_closed = report.auctions_closed,
                    invoices_overdue = report.invoices_overdue,
                    disputes_escalated = report.disputes_escalated,
                    "Reconciliation pass complete"
                );
            }
            Err(e) => {
                tracing::error!("Reconciliation pass failed: {:#}", e);
            }
        }

        let pruned = rate_limiter.prune(interval * 10).await;
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned idle rate limit buckets");
        }
    }
}
