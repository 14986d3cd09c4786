//! Database-backed marketplace flows
//!
//! Run against a scratch Postgres with
//! `TEST_DATABASE_URL=... cargo test -- --ignored`.

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use std::sync::Arc;
    use uuid::Uuid;

    use helvenda_server::auth::Actor;
    use helvenda_server::bid::BidService;
    use helvenda_server::config::EmailSettings;
    use helvenda_server::db;
    use helvenda_server::dispute::{AddCommentRequest, DisputeService, OpenDisputeRequest};
    use helvenda_server::error::ApiError;
    use helvenda_server::invoice::{FeePolicy, InvoiceStatus};
    use helvenda_server::listing::ListingService;
    use helvenda_server::notification::{Mailer, NotificationService};
    use helvenda_server::offer::{CreateOfferRequest, OfferPolicy, OfferService, OfferStatus};
    use helvenda_server::purchase::{CancelPurchaseRequest, PurchaseService, PurchaseSource};

    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/helvenda_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&pool).await.expect("migrations");
        pool
    }

    fn notifications(pool: &PgPool) -> Arc<NotificationService> {
        Arc::new(NotificationService::new(
            pool.clone(),
            Mailer::new(EmailSettings::default()),
        ))
    }

    async fn create_user(pool: &PgPool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
            .bind(id)
            .bind(format!("{}@example.ch", id))
            .execute(pool)
            .await
            .expect("insert user");
        id
    }

    async fn create_fixed_price_listing(pool: &PgPool, seller_id: Uuid, price: i64) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO watches (id, seller_id, title, price, moderation_status) VALUES ($1, $2, $3, $4, 'approved')",
        )
        .bind(id)
        .bind(seller_id)
        .bind("Tudor Black Bay 58")
        .bind(price)
        .execute(pool)
        .await
        .expect("insert listing");
        id
    }

    async fn count_for_watch(pool: &PgPool, table: &str, watch_id: Uuid) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE watch_id = $1", table))
            .bind(watch_id)
            .fetch_one(pool)
            .await
            .expect("count")
    }

    fn offer_request(watch_id: Uuid, amount: i64) -> CreateOfferRequest {
        CreateOfferRequest {
            watch_id,
            amount,
            message: None,
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancelled_purchase_does_not_block_offers() {
        let pool = setup_test_db().await;
        let seller = create_user(&pool).await;
        let first_buyer = create_user(&pool).await;
        let buyer = create_user(&pool).await;
        let watch_id = create_fixed_price_listing(&pool, seller, 1000).await;

        sqlx::query(
            "INSERT INTO purchases (id, watch_id, buyer_id, seller_id, status, price, source, cancelled_at)
             VALUES ($1, $2, $3, $4, 'cancelled', 1000, 'buy_now', NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(watch_id)
        .bind(first_buyer)
        .bind(seller)
        .execute(&pool)
        .await
        .expect("insert cancelled purchase");

        let offers = OfferService::new(
            pool.clone(),
            notifications(&pool),
            OfferPolicy::default(),
            FeePolicy::default(),
        );
        let submission = offers
            .create_or_update_offer(&Actor::user(buyer), &offer_request(watch_id, 700))
            .await
            .expect("offer should be accepted");

        assert!(submission.created);
        assert_eq!(submission.offer.status, OfferStatus::Pending);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_offer_checkout_sells_once() {
        let pool = setup_test_db().await;
        let seller = create_user(&pool).await;
        let buyer = create_user(&pool).await;
        let watch_id = create_fixed_price_listing(&pool, seller, 1000).await;

        let offers = OfferService::new(
            pool.clone(),
            notifications(&pool),
            OfferPolicy::default(),
            FeePolicy::default(),
        );
        let submission = offers
            .create_or_update_offer(&Actor::user(buyer), &offer_request(watch_id, 650))
            .await
            .expect("offer");
        let offer_id = submission.offer.id;

        // Same amount again keeps the same record
        let again = offers
            .create_or_update_offer(&Actor::user(buyer), &offer_request(watch_id, 650))
            .await
            .expect("resubmission");
        assert!(!again.created);
        assert_eq!(again.offer.id, offer_id);

        let accepted = offers
            .accept_offer(offer_id, &Actor::user(seller))
            .await
            .expect("accept");
        assert_eq!(accepted.status, OfferStatus::Accepted);

        let purchase = offers
            .checkout_offer(offer_id, &Actor::user(buyer), true)
            .await
            .expect("checkout");
        assert_eq!(purchase.price, 650);
        assert_eq!(purchase.source, PurchaseSource::Offer);

        let second = offers
            .checkout_offer(offer_id, &Actor::user(buyer), true)
            .await;
        assert!(matches!(second, Err(ApiError::Conflict(_))));

        let invoices: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoice_items WHERE purchase_id = $1")
                .bind(purchase.id)
                .fetch_one(&pool)
                .await
                .expect("count invoice items");
        assert_eq!(invoices, 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancelled_offer_sale_cannot_be_checked_out_again() {
        let pool = setup_test_db().await;
        let seller = create_user(&pool).await;
        let buyer = create_user(&pool).await;
        let watch_id = create_fixed_price_listing(&pool, seller, 1000).await;

        let offers = OfferService::new(
            pool.clone(),
            notifications(&pool),
            OfferPolicy::default(),
            FeePolicy::default(),
        );
        let purchases = PurchaseService::new(pool.clone(), notifications(&pool));

        let offer_id = offers
            .create_or_update_offer(&Actor::user(buyer), &offer_request(watch_id, 650))
            .await
            .expect("offer")
            .offer
            .id;
        offers
            .accept_offer(offer_id, &Actor::user(seller))
            .await
            .expect("accept");
        let purchase = offers
            .checkout_offer(offer_id, &Actor::user(buyer), false)
            .await
            .expect("checkout");

        purchases
            .cancel_purchase(
                purchase.id,
                &Actor::user(seller),
                &CancelPurchaseRequest {
                    reason: Some("Strap damaged in storage".to_string()),
                },
            )
            .await
            .expect("seller cancels");

        // The negotiated price does not come back to life with the listing
        let again = offers
            .checkout_offer(offer_id, &Actor::user(buyer), false)
            .await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));

        let sales: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM purchases WHERE watch_id = $1 AND status <> 'cancelled'",
        )
        .bind(watch_id)
        .fetch_one(&pool)
        .await
        .expect("count sales");
        assert_eq!(sales, 0);

        // A fresh offer is still possible on the relisted watch
        let fresh = offers
            .create_or_update_offer(&Actor::user(buyer), &offer_request(watch_id, 700))
            .await
            .expect("new offer");
        assert!(fresh.created);
        assert_ne!(fresh.offer.id, offer_id);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancelled_sale_voids_fee_invoice() {
        let pool = setup_test_db().await;
        let seller = create_user(&pool).await;
        let buyer = create_user(&pool).await;
        let watch_id = create_fixed_price_listing(&pool, seller, 1000).await;

        let offers = OfferService::new(
            pool.clone(),
            notifications(&pool),
            OfferPolicy::default(),
            FeePolicy::default(),
        );
        let purchases = PurchaseService::new(pool.clone(), notifications(&pool));

        let offer_id = offers
            .create_or_update_offer(&Actor::user(buyer), &offer_request(watch_id, 650))
            .await
            .expect("offer")
            .offer
            .id;
        offers
            .accept_offer(offer_id, &Actor::user(seller))
            .await
            .expect("accept");
        let purchase = offers
            .checkout_offer(offer_id, &Actor::user(buyer), false)
            .await
            .expect("checkout");

        purchases
            .cancel_purchase(purchase.id, &Actor::user(seller), &CancelPurchaseRequest::default())
            .await
            .expect("cancel");

        let status: InvoiceStatus = sqlx::query_scalar(
            r#"
            SELECT i.status FROM invoices i
            JOIN invoice_items it ON it.invoice_id = i.id
            WHERE it.purchase_id = $1
            "#,
        )
        .bind(purchase.id)
        .fetch_one(&pool)
        .await
        .expect("fee invoice");
        assert_eq!(status, InvoiceStatus::Cancelled);

        let open_for_seller: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE seller_id = $1 AND status IN ('pending', 'overdue')",
        )
        .bind(seller)
        .fetch_one(&pool)
        .await
        .expect("count open invoices");
        assert_eq!(open_for_seller, 0);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_admin_delete_cascades() {
        let pool = setup_test_db().await;
        let notifier = notifications(&pool);
        let seller = create_user(&pool).await;
        let buyer = create_user(&pool).await;
        let watch_id = create_fixed_price_listing(&pool, seller, 250_000).await;

        let bids = BidService::new(pool.clone(), notifier.clone(), FeePolicy::default());
        let purchase = bids
            .buy_now(watch_id, &Actor::user(buyer), true)
            .await
            .expect("buy now");

        let disputes = DisputeService::new(pool.clone(), notifier.clone(), 7);
        disputes
            .open_dispute(
                purchase.id,
                &Actor::user(buyer),
                &OpenDisputeRequest {
                    reason: "Not as described".to_string(),
                    description: "The bezel insert is a replacement.".to_string(),
                    attachments: vec!["https://cdn.example.ch/bezel.jpg".to_string()],
                },
            )
            .await
            .expect("open dispute");
        disputes
            .add_comment(
                purchase.id,
                &Actor::user(seller),
                &AddCommentRequest {
                    content: "The listing photos show the insert.".to_string(),
                    attachments: Vec::new(),
                    is_internal: false,
                },
            )
            .await
            .expect("comment");

        sqlx::query("INSERT INTO favorites (id, user_id, watch_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(buyer)
            .bind(watch_id)
            .execute(&pool)
            .await
            .expect("favorite");
        sqlx::query("INSERT INTO reports (id, watch_id, reporter_id, reason) VALUES ($1, $2, $3, 'spam')")
            .bind(Uuid::new_v4())
            .bind(watch_id)
            .bind(buyer)
            .execute(&pool)
            .await
            .expect("report");

        let listings = ListingService::new(pool.clone(), notifier, false);
        let summary = listings
            .delete_listing(watch_id, &Actor::admin(Uuid::new_v4()))
            .await
            .expect("delete");
        assert_eq!(summary.purchases, 1);
        assert_eq!(summary.dispute_comments, 1);
        assert_eq!(summary.invoice_items_unlinked, 1);

        for table in [
            "bids",
            "favorites",
            "price_offers",
            "purchases",
            "messages",
            "watch_categories",
            "watch_views",
            "reports",
            "notifications",
            "invoice_items",
        ] {
            assert_eq!(count_for_watch(&pool, table, watch_id).await, 0, "{}", table);
        }

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watches WHERE id = $1")
            .bind(watch_id)
            .fetch_one(&pool)
            .await
            .expect("count listing");
        assert_eq!(remaining, 0);

        // The seller's fee invoice survives the listing
        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE seller_id = $1")
            .bind(seller)
            .fetch_one(&pool)
            .await
            .expect("count invoices");
        assert_eq!(invoices, 1);
    }
}
