//! Listing and bidding route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn listing_routes() -> Router<AppState> {
    Router::new()
        .route("/api/watches", post(create_listing).get(list_listings))
        .route(
            "/api/watches/:id",
            get(get_listing).patch(update_listing).delete(delete_listing),
        )
        .route("/api/watches/:id/moderation", post(moderate_listing))
        .route("/api/watches/:id/bids", get(bid_history).post(place_bid))
        .route("/api/watches/:id/buy-now", post(buy_now))
        .route("/api/bids/mine", get(my_bids))
        .route("/api/admin/watches", get(list_listings_admin))
}
