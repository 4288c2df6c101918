//! Axum route handlers for the Valuation API.
//!
//! Flow: validate → load candidates (cache, then DB) → resolve comparable →
//!       estimate → upload markdown report → persist row.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::market::handlers::validate_query;
use crate::market::repository::{load_candidates, CandidateFilter};
use crate::market::resolver::{resolve, MatchResult, ValuationQuery};
use crate::models::market::ValuationRow;
use crate::state::AppState;
use crate::valuation::estimator::Valuation;
use crate::valuation::report::{render_valuation_to_md, upload_report};

#[derive(Debug, Deserialize)]
pub struct ValuationRequest {
    pub agent_id: Option<Uuid>,
    #[serde(flatten)]
    pub query: ValuationQuery,
}

#[derive(Debug, Serialize)]
pub struct ValuationResponse {
    pub valuation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub valuation: Valuation,
    pub comparable: Option<MatchResult>,
    pub report_key: Option<String>,
}

/// POST /api/v1/valuations
pub async fn handle_create_valuation(
    State(state): State<AppState>,
    Json(request): Json<ValuationRequest>,
) -> Result<Json<ValuationResponse>, AppError> {
    let query = request.query;
    validate_query(&query)?;

    let candidates = load_candidates(
        &state.db,
        &state.market_cache,
        &CandidateFilter::from_query(&query),
    )
    .await
    .map_err(AppError::Internal)?;
    let comparable = resolve(&query, &candidates);
    match &comparable {
        Some(m) => info!(
            "Valuation comparable: {} match {} from {} candidates",
            m.kind.as_str(),
            m.stat.id,
            candidates.len()
        ),
        None => info!(
            "No comparable among {} candidates; estimating without market data",
            candidates.len()
        ),
    }

    let valuation = state.estimator.estimate(&query, comparable.as_ref()).await?;

    let valuation_id = Uuid::new_v4();
    let markdown = render_valuation_to_md(valuation_id, &query, comparable.as_ref(), &valuation);

    // A failed upload loses only the report, not the valuation.
    let report_key =
        match upload_report(&state.s3, &state.config.s3_bucket, valuation_id, markdown).await {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Valuation report upload failed for {valuation_id}: {e}");
                None
            }
        };

    let query_value = serde_json::to_value(&query)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize query: {e}")))?;

    let row = sqlx::query_as::<_, ValuationRow>(
        r#"
        INSERT INTO valuations
            (id, agent_id, query, estimated_value, low_value, high_value,
             match_kind, market_stat_id, estimator_backend, s3_report_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(valuation_id)
    .bind(request.agent_id)
    .bind(query_value)
    .bind(valuation.estimated_value)
    .bind(valuation.low_value)
    .bind(valuation.high_value)
    .bind(valuation.match_kind.map(|k| k.as_str()))
    .bind(valuation.comparable_id)
    .bind(&valuation.estimator_backend)
    .bind(&report_key)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ValuationResponse {
        valuation_id: row.id,
        created_at: row.created_at,
        valuation,
        comparable,
        report_key: row.s3_report_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_flattens_query() {
        let req: ValuationRequest = serde_json::from_str(
            r#"{
                "agent_id": "00000000-0000-0000-0000-000000000001",
                "city": "Muğla",
                "district": "Bodrum",
                "property_type": "villa",
                "room_count": "4+1",
                "area_m2": 220,
                "features": ["havuz"]
            }"#,
        )
        .unwrap();
        assert_eq!(req.query.city, "Muğla");
        assert_eq!(req.query.room_count.as_deref(), Some("4+1"));
        assert_eq!(req.query.area_m2, Some(220.0));
        assert!(req.agent_id.is_some());
    }

    #[test]
    fn test_request_without_optional_fields() {
        let req: ValuationRequest = serde_json::from_str(
            r#"{"city": "Ankara", "district": "Çankaya", "property_type": "office"}"#,
        )
        .unwrap();
        assert!(req.agent_id.is_none());
        assert!(req.query.room_count.is_none());
        assert!(req.query.features.is_empty());
    }
}
