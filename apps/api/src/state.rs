use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::market::cache::MarketCache;
use crate::valuation::estimator::ValuationEstimator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Redis-backed cache of resolver candidates.
    pub market_cache: MarketCache,
    pub s3: S3Client,
    pub config: Config,
    /// Pluggable estimator. Default: HeuristicEstimator. Swap via ENABLE_LLM_VALUATION.
    pub estimator: Arc<dyn ValuationEstimator>,
}
