//! Invoice service layer - fee invoices, overdue sweep and payment capture

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::model::{Invoice, InvoiceItem, InvoiceStatus, InvoiceWithItems, PaymentWebhook};
use super::rules::{check_payment, compute_totals, invoice_number, is_voidable, FeePolicy};
use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::models::{format_chf, PaginatedResponse, PaginationParams};
use crate::notification::{NewNotification, NotificationKind, NotificationService};
use crate::purchase::Purchase;

/// Issue the seller's fee invoice for a finalized sale
///
/// Runs on the caller's transaction so the purchase and its invoice commit together.
pub(crate) async fn insert_sale_invoice(
    conn: &mut PgConnection,
    purchase: &Purchase,
    listing_title: &str,
    policy: &FeePolicy,
    now: DateTime<Utc>,
) -> ApiResult<Invoice> {
    let fee = policy.platform_fee(purchase.price);
    let totals = compute_totals(&[fee], policy.vat_rate_bps);

    let sequence: i64 = sqlx::query_scalar("SELECT nextval('invoice_number_seq')")
        .fetch_one(&mut *conn)
        .await?;

    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO invoices (
            id, invoice_number, seller_id, subtotal, vat_rate_bps, vat_amount, total,
            status, due_date, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(invoice_number(now, sequence))
    .bind(purchase.seller_id)
    .bind(totals.subtotal)
    .bind(policy.vat_rate_bps)
    .bind(totals.vat_amount)
    .bind(totals.total)
    .bind(InvoiceStatus::Pending)
    .bind(policy.due_date(now))
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO invoice_items (id, invoice_id, description, quantity, unit_price, total, watch_id, purchase_id)
        VALUES ($1, $2, $3, 1, $4, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(invoice.id)
    .bind(format!(
        "Platform fee: {} (sold for {})",
        listing_title,
        format_chf(purchase.price)
    ))
    .bind(fee)
    .bind(purchase.watch_id)
    .bind(purchase.id)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        invoice_number = %invoice.invoice_number,
        purchase_id = %purchase.id,
        total = invoice.total,
        "Fee invoice issued"
    );

    Ok(invoice)
}

/// Void the unpaid fee invoice billed for `purchase_id`
///
/// Runs on the cancelling transaction. Returns the voided invoice, if any.
pub(crate) async fn void_sale_invoice(
    conn: &mut PgConnection,
    purchase_id: Uuid,
) -> ApiResult<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT i.* FROM invoices i
        JOIN invoice_items it ON it.invoice_id = i.id
        WHERE it.purchase_id = $1
        FOR UPDATE OF i
        "#,
    )
    .bind(purchase_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(invoice) = invoice.filter(|invoice| is_voidable(invoice.status)) else {
        return Ok(None);
    };

    let voided = sqlx::query_as::<_, Invoice>(
        "UPDATE invoices SET status = $2 WHERE id = $1 RETURNING *",
    )
    .bind(invoice.id)
    .bind(InvoiceStatus::Cancelled)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        invoice_number = %voided.invoice_number,
        purchase_id = %purchase_id,
        "Fee invoice voided"
    );

    Ok(Some(voided))
}

pub struct InvoiceService {
    db_pool: PgPool,
    notifications: Arc<NotificationService>,
}

impl InvoiceService {
    pub fn new(db_pool: PgPool, notifications: Arc<NotificationService>) -> Self {
        Self {
            db_pool,
            notifications,
        }
    }

    pub async fn list_invoices(
        &self,
        seller_id: Uuid,
        params: &PaginationParams,
    ) -> ApiResult<PaginatedResponse<Invoice>> {
        let (limit, offset) = params.limit_offset();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE seller_id = $1")
            .bind(seller_id)
            .fetch_one(&self.db_pool)
            .await?;

        let data = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE seller_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(seller_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(PaginatedResponse {
            data,
            total,
            page: params.page(),
            limit,
        })
    }

    pub async fn get_invoice(&self, id: Uuid, actor: &Actor) -> ApiResult<InvoiceWithItems> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;

        if !actor.owns_or_admin(invoice.seller_id) {
            return Err(ApiError::Forbidden(
                "Not allowed to view this invoice".to_string(),
            ));
        }

        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = $1 ORDER BY description",
        )
        .bind(id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(InvoiceWithItems { invoice, items })
    }

    /// Move pending invoices past their due date to overdue
    pub async fn check_overdue(&self) -> ApiResult<usize> {
        let now = Utc::now();
        let overdue = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = $1
            WHERE status = $2 AND due_date < $3
            RETURNING *
            "#,
        )
        .bind(InvoiceStatus::Overdue)
        .bind(InvoiceStatus::Pending)
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;

        if !overdue.is_empty() {
            tracing::info!(count = overdue.len(), "Invoices marked overdue");
        }

        for invoice in &overdue {
            self.notifications
                .notify(NewNotification {
                    user_id: invoice.seller_id,
                    kind: NotificationKind::InvoiceOverdue,
                    title: "Invoice overdue".to_string(),
                    message: format!(
                        "Invoice {} over {} is overdue.",
                        invoice.invoice_number,
                        format_chf(invoice.total)
                    ),
                    watch_id: None,
                })
                .await;
        }

        Ok(overdue.len())
    }

    /// Settle an invoice from a payment-processor capture
    pub async fn mark_paid(&self, payment: &PaymentWebhook) -> ApiResult<Invoice> {
        let mut tx = self.db_pool.begin().await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE invoice_number = $1 FOR UPDATE",
        )
        .bind(&payment.invoice_number)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;

        check_payment(invoice.status, invoice.total, payment.amount)?;

        let paid = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = $2, paid_at = $3, payment_reference = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(invoice.id)
        .bind(InvoiceStatus::Paid)
        .bind(Utc::now())
        .bind(&payment.payment_reference)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            invoice_number = %paid.invoice_number,
            payment_reference = %payment.payment_reference,
            "Invoice paid"
        );

        Ok(paid)
    }
}
