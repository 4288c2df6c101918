//! Axum route handlers for the Market API.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::errors::AppError;
use crate::market::repository::{
    load_candidates, upsert_market_stat, CandidateFilter, NewMarketStat,
};
use crate::market::resolver::{resolve, MatchResult, ValuationQuery};
use crate::models::market::MarketStat;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    #[serde(rename = "match")]
    pub matched: Option<MatchResult>,
    /// "found" | "not_found"
    pub status: &'static str,
    pub candidates_considered: usize,
}

pub fn validate_query(query: &ValuationQuery) -> Result<(), AppError> {
    if query.property_type.trim().is_empty() {
        return Err(AppError::Validation(
            "property_type cannot be empty".to_string(),
        ));
    }
    if let Some(area) = query.area_m2 {
        if !area.is_finite() || area <= 0.0 {
            return Err(AppError::Validation(
                "area_m2 must be a positive number".to_string(),
            ));
        }
    }
    Ok(())
}

/// POST /api/v1/market/stats
///
/// Write side of the periodic market job: upserts one statistic and drops the
/// cached candidate list for its property type.
pub async fn handle_upsert_stat(
    State(state): State<AppState>,
    Json(request): Json<NewMarketStat>,
) -> Result<Json<MarketStat>, AppError> {
    request.validate().map_err(AppError::Validation)?;

    let stat = upsert_market_stat(&state.db, &request)
        .await
        .map_err(AppError::Internal)?;
    state.market_cache.invalidate(&stat.property_type).await;

    Ok(Json(stat))
}

/// POST /api/v1/market/resolve
///
/// Returns the best comparable for the query. A miss is a normal 200 response
/// with `status = "not_found"`.
pub async fn handle_resolve(
    State(state): State<AppState>,
    Json(query): Json<ValuationQuery>,
) -> Result<Json<ResolveResponse>, AppError> {
    validate_query(&query)?;

    let candidates = load_candidates(
        &state.db,
        &state.market_cache,
        &CandidateFilter::from_query(&query),
    )
    .await
    .map_err(AppError::Internal)?;
    let matched = resolve(&query, &candidates);

    Ok(Json(ResolveResponse {
        status: if matched.is_some() { "found" } else { "not_found" },
        matched,
        candidates_considered: candidates.len(),
    }))
}
