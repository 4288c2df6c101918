//! Valuation estimators — turn a query plus an optional market comparable into a price range.
//!
//! Default: `HeuristicEstimator` (pure-Rust, deterministic, no network).
//! Optional: `LlmEstimator`, enabled with `ENABLE_LLM_VALUATION`.
//!
//! `AppState` holds an `Arc<dyn ValuationEstimator>`, chosen at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::prompts::json_system;
use crate::llm_client::{LlmClient, LlmError};
use crate::market::normalize::normalize_category;
use crate::market::resolver::{MatchKind, MatchResult, ValuationQuery};
use crate::money::{format_try, round_currency};
use crate::valuation::prompts::{VALUATION_PROMPT_TEMPLATE, VALUATION_SYSTEM};

/// Area assumed when the query omits it and no comparable price is available.
const DEFAULT_AREA_M2: f64 = 100.0;

/// Sample size at which an exact comparable counts as high confidence.
const HIGH_CONFIDENCE_SAMPLES: i32 = 10;

/// Premium features, each worth +2%, capped at +10%.
const FEATURE_PREMIUM: f64 = 0.02;
const MAX_FEATURE_PREMIUM: f64 = 0.10;

const PREMIUM_FEATURES: &[&str] = &[
    "sea view",
    "sea_view",
    "deniz manzarasi",
    "pool",
    "havuz",
    "parking",
    "otopark",
    "elevator",
    "asansor",
    "security",
    "guvenlik",
    "garden",
    "bahce",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Valuation {
    pub estimated_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    pub confidence: Confidence,
    pub match_kind: Option<MatchKind>,
    pub comparable_id: Option<Uuid>,
    pub rationale: Vec<String>,
    pub estimator_backend: String, // "heuristic" | "llm"
}

#[async_trait]
pub trait ValuationEstimator: Send + Sync {
    async fn estimate(
        &self,
        query: &ValuationQuery,
        comparable: Option<&MatchResult>,
    ) -> Result<Valuation, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HeuristicEstimator
// ────────────────────────────────────────────────────────────────────────────

pub struct HeuristicEstimator;

#[async_trait]
impl ValuationEstimator for HeuristicEstimator {
    async fn estimate(
        &self,
        query: &ValuationQuery,
        comparable: Option<&MatchResult>,
    ) -> Result<Valuation, AppError> {
        Ok(heuristic_valuation(query, comparable))
    }
}

/// Baseline TRY/m² per property type, used only when no comparable exists.
fn baseline_price_per_area(property_type: &str) -> f64 {
    match normalize_category(property_type).as_str() {
        "apartment" | "daire" => 35_000.0,
        "villa" => 55_000.0,
        "land" | "arsa" => 6_000.0,
        "commercial" | "ticari" => 45_000.0,
        "office" | "ofis" | "buro" => 40_000.0,
        "shop" | "dukkan" => 50_000.0,
        _ => 30_000.0,
    }
}

fn age_factor(building_age: Option<u32>) -> f64 {
    match building_age {
        None => 1.0,
        Some(0..=5) => 1.05,
        Some(6..=15) => 1.0,
        Some(16..=30) => 0.92,
        Some(_) => 0.85,
    }
}

fn floor_factor(floor: Option<i32>, total_floors: Option<i32>) -> f64 {
    match (floor, total_floors) {
        (Some(f), _) if f < 0 => 0.90,
        (Some(0), _) => 0.95,
        (Some(f), Some(total)) if total > 1 && f >= total => 0.97,
        _ => 1.0,
    }
}

fn feature_factor(features: &[String]) -> f64 {
    let premium = features
        .iter()
        .filter(|f| PREMIUM_FEATURES.contains(&normalize_category(f).as_str()))
        .count() as f64
        * FEATURE_PREMIUM;
    1.0 + premium.min(MAX_FEATURE_PREMIUM)
}

/// Half-width of the price range, as a fraction of the estimate.
fn band_width(kind: Option<MatchKind>) -> f64 {
    match kind {
        Some(MatchKind::Exact) => 0.10,
        Some(MatchKind::Relaxed) => 0.15,
        Some(MatchKind::Fallback) => 0.20,
        None => 0.30,
    }
}

pub fn confidence_for(comparable: Option<&MatchResult>) -> Confidence {
    match comparable {
        Some(m) if m.kind == MatchKind::Exact && m.stat.sample_size >= HIGH_CONFIDENCE_SAMPLES => {
            Confidence::High
        }
        Some(m) if m.kind != MatchKind::Fallback => Confidence::Medium,
        _ => Confidence::Low,
    }
}

pub fn heuristic_valuation(query: &ValuationQuery, comparable: Option<&MatchResult>) -> Valuation {
    let mut rationale = Vec::new();

    let base = match (comparable, query.area_m2) {
        (Some(m), Some(area)) => {
            rationale.push(format!(
                "{} comparable in {} / {}: {} per m² over {} samples",
                m.kind.as_str(),
                m.stat.city,
                m.stat.district,
                format_try(m.stat.price_per_area),
                m.stat.sample_size
            ));
            m.stat.price_per_area * area
        }
        (Some(m), None) => {
            rationale.push(format!(
                "No area given; using the {} comparable's median price {}",
                m.kind.as_str(),
                format_try(m.stat.median_price)
            ));
            m.stat.median_price
        }
        (None, area) => {
            let ppa = baseline_price_per_area(&query.property_type);
            let area = area.unwrap_or_else(|| {
                rationale.push(format!("No area given; assuming {DEFAULT_AREA_M2} m²"));
                DEFAULT_AREA_M2
            });
            rationale.push(format!(
                "No market comparable; using the {} baseline of {} per m²",
                query.property_type,
                format_try(ppa)
            ));
            ppa * area
        }
    };

    let age = age_factor(query.building_age);
    let floor = floor_factor(query.floor, query.total_floors);
    let features = feature_factor(&query.features);
    if age != 1.0 {
        rationale.push(format!("Building age adjustment x{age:.2}"));
    }
    if floor != 1.0 {
        rationale.push(format!("Floor position adjustment x{floor:.2}"));
    }
    if features != 1.0 {
        rationale.push(format!("Feature premium x{features:.2}"));
    }

    let estimate = base * age * floor * features;
    let kind = comparable.map(|m| m.kind);
    let width = band_width(kind);

    Valuation {
        estimated_value: round_currency(estimate),
        low_value: round_currency(estimate * (1.0 - width)),
        high_value: round_currency(estimate * (1.0 + width)),
        confidence: confidence_for(comparable),
        match_kind: kind,
        comparable_id: comparable.map(|m| m.stat.id),
        rationale,
        estimator_backend: "heuristic".to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmEstimator
// ────────────────────────────────────────────────────────────────────────────

/// Raw JSON shape requested from the model.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmValuation {
    pub estimated_value: f64,
    pub low_value: f64,
    pub high_value: f64,
    #[serde(default)]
    pub rationale: Vec<String>,
}

/// Semantic estimator via Claude. The client is passed in, never a global.
/// Falls back to the heuristic when the model's reply is unusable or the API
/// stays unavailable; only non-retryable API errors (auth, bad request) fail.
pub struct LlmEstimator {
    llm: LlmClient,
}

impl LlmEstimator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

/// True when the model returned a positive, ordered range.
pub fn is_usable(v: &LlmValuation) -> bool {
    [v.low_value, v.estimated_value, v.high_value]
        .iter()
        .all(|x| x.is_finite() && *x > 0.0)
        && v.low_value <= v.estimated_value
        && v.estimated_value <= v.high_value
}

pub fn build_valuation_prompt(
    query: &ValuationQuery,
    comparable: Option<&MatchResult>,
) -> Result<String, AppError> {
    let query_json = serde_json::to_string_pretty(query)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize query: {e}")))?;
    let (match_kind, comparable_json) = match comparable {
        Some(m) => (
            m.kind.as_str(),
            serde_json::to_string_pretty(&m.stat).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to serialize comparable: {e}"))
            })?,
        ),
        None => ("none", "null".to_string()),
    };

    Ok(VALUATION_PROMPT_TEMPLATE
        .replace("{query_json}", &query_json)
        .replace("{match_kind}", match_kind)
        .replace("{comparable_json}", &comparable_json))
}

#[async_trait]
impl ValuationEstimator for LlmEstimator {
    async fn estimate(
        &self,
        query: &ValuationQuery,
        comparable: Option<&MatchResult>,
    ) -> Result<Valuation, AppError> {
        let prompt = build_valuation_prompt(query, comparable)?;
        let raw: LlmValuation = match self
            .llm
            .call_json(&prompt, &json_system(VALUATION_SYSTEM))
            .await
        {
            Ok(raw) => raw,
            // Unparseable output, or an outage that outlasted the retries.
            Err(e @ (LlmError::Parse(_) | LlmError::EmptyContent)) => {
                warn!("LLM valuation output unusable ({e}), falling back to heuristic");
                return Ok(heuristic_valuation(query, comparable));
            }
            Err(e) if e.is_retryable() => {
                warn!("LLM unavailable ({e}), falling back to heuristic");
                return Ok(heuristic_valuation(query, comparable));
            }
            Err(e) => return Err(AppError::Llm(format!("Valuation failed: {e}"))),
        };

        if !is_usable(&raw) {
            warn!(
                "LLM valuation unusable ({} / {} / {}), falling back to heuristic",
                raw.low_value, raw.estimated_value, raw.high_value
            );
            return Ok(heuristic_valuation(query, comparable));
        }
        debug!("LLM valuation accepted: {}", raw.estimated_value);

        Ok(Valuation {
            estimated_value: round_currency(raw.estimated_value),
            low_value: round_currency(raw.low_value),
            high_value: round_currency(raw.high_value),
            confidence: confidence_for(comparable),
            match_kind: comparable.map(|m| m.kind),
            comparable_id: comparable.map(|m| m.stat.id),
            rationale: raw.rationale,
            estimator_backend: "llm".to_string(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
