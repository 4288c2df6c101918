use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Statistical snapshot for one (city, district, property_type, room_count, age_range) key.
/// Written by the periodic market job, read-only for valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MarketStat {
    pub id: Uuid,
    pub city: String,
    pub district: String,
    pub property_type: String,
    /// e.g. "3+1"; `None` aggregates every room count.
    pub room_count: Option<String>,
    pub age_range: Option<String>,
    pub average_price: f64,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_per_area: f64,
    pub sample_size: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ValuationRow {
    pub id: Uuid,
    pub agent_id: Option<Uuid>,
    pub query: serde_json::Value,
    pub estimated_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    pub match_kind: Option<String>,
    pub market_stat_id: Option<Uuid>,
    pub estimator_backend: String,
    pub s3_report_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
