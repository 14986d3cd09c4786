//! Helvenda marketplace backend
//!
//! Rule engine and HTTP surface for the Swiss watch marketplace: listings,
//! bidding and buy-now, price offers, purchases with disputes, and the
//! platform-fee invoices raised on every sale.

pub mod auth;
pub mod bid;
pub mod config;
pub mod db;
pub mod dispute;
pub mod error;
pub mod handlers;
pub mod invoice;
pub mod listing;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod offer;
pub mod purchase;
pub mod reconciler;
pub mod routes;
pub mod state;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use middleware::RateLimiter;
use state::AppState;

/// Assemble the full API with its middleware stack
pub fn build_router(state: AppState, rate_limiter: RateLimiter, cors_origins: Option<&str>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .merge(routes::listing_routes())
        .merge(routes::offer_routes())
        .merge(routes::purchase_routes())
        .merge(routes::invoice_routes())
        .merge(routes::notification_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit,
        ))
        .layer(configure_cors(cors_origins))
}

async fn root() -> &'static str {
    "Helvenda API Server"
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let allowed_origins = allowed_origins.unwrap_or_default();

    if allowed_origins.trim().is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(Any)
}
