pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::commission::handlers as commission;
use crate::market::handlers as market;
use crate::state::AppState;
use crate::valuation::handlers as valuation;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Market data
        .route("/api/v1/market/stats", post(market::handle_upsert_stat))
        .route("/api/v1/market/resolve", post(market::handle_resolve))
        // Valuation
        .route("/api/v1/valuations", post(valuation::handle_create_valuation))
        // Commission
        .route(
            "/api/v1/commission/sale",
            post(commission::handle_sale_commission),
        )
        .route(
            "/api/v1/commission/default-tiers",
            get(commission::handle_default_tiers),
        )
        .route(
            "/api/v1/commission/rental",
            post(commission::handle_rental_commission),
        )
        .route(
            "/api/v1/commission/transactions",
            post(commission::handle_create_transaction),
        )
        .route(
            "/api/v1/agents/:id/commission-settings",
            get(commission::handle_get_settings).put(commission::handle_put_settings),
        )
        .with_state(state)
}
