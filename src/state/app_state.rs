//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::AuthService;
use crate::bid::BidService;
use crate::config::Config;
use crate::dispute::DisputeService;
use crate::invoice::InvoiceService;
use crate::listing::ListingService;
use crate::notification::{Mailer, NotificationService};
use crate::offer::OfferService;
use crate::purchase::PurchaseService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub listing_service: Arc<ListingService>,
    pub bid_service: Arc<BidService>,
    pub offer_service: Arc<OfferService>,
    pub purchase_service: Arc<PurchaseService>,
    pub dispute_service: Arc<DisputeService>,
    pub invoice_service: Arc<InvoiceService>,
    pub notification_service: Arc<NotificationService>,
    pub auth_service: Arc<AuthService>,
    pub webhook_secret: Option<String>,
}

impl AppState {
    /// Wire every service onto one pool
    pub fn new(db_pool: PgPool, config: &Config) -> Self {
        let market = &config.market;
        let notification_service = Arc::new(NotificationService::new(
            db_pool.clone(),
            Mailer::new(config.email.clone()),
        ));

        Self {
            listing_service: Arc::new(ListingService::new(
                db_pool.clone(),
                notification_service.clone(),
                market.listing_review_required,
            )),
            bid_service: Arc::new(BidService::new(
                db_pool.clone(),
                notification_service.clone(),
                market.fees,
            )),
            offer_service: Arc::new(OfferService::new(
                db_pool.clone(),
                notification_service.clone(),
                market.offers,
                market.fees,
            )),
            purchase_service: Arc::new(PurchaseService::new(
                db_pool.clone(),
                notification_service.clone(),
            )),
            dispute_service: Arc::new(DisputeService::new(
                db_pool.clone(),
                notification_service.clone(),
                market.dispute_window_days,
            )),
            invoice_service: Arc::new(InvoiceService::new(
                db_pool.clone(),
                notification_service.clone(),
            )),
            notification_service,
            auth_service: Arc::new(AuthService::new(config.jwt_secret.clone())),
            webhook_secret: config.webhook_secret.clone(),
            db_pool,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<ListingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.listing_service.clone()
    }
}

impl FromRef<AppState> for Arc<BidService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.bid_service.clone()
    }
}

impl FromRef<AppState> for Arc<OfferService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.offer_service.clone()
    }
}

impl FromRef<AppState> for Arc<PurchaseService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.purchase_service.clone()
    }
}

impl FromRef<AppState> for Arc<DisputeService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.dispute_service.clone()
    }
}

impl FromRef<AppState> for Arc<InvoiceService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.invoice_service.clone()
    }
}

impl FromRef<AppState> for Arc<NotificationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.notification_service.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}
