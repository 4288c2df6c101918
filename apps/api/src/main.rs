mod commission;
mod config;
mod db;
mod errors;
mod llm_client;
mod market;
mod models;
mod money;
mod routes;
mod state;
mod valuation;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::llm_client::LlmClient;
use crate::market::cache::MarketCache;
use crate::routes::build_router;
use crate::state::AppState;
use crate::valuation::estimator::{HeuristicEstimator, LlmEstimator, ValuationEstimator};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Emlak API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Initialize Redis market cache
    let redis = redis::Client::open(config.redis_url.clone())?;
    let market_cache = MarketCache::new(redis, config.market_cache_ttl_secs);
    info!(
        "Market cache initialized (ttl {}s)",
        config.market_cache_ttl_secs
    );

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize valuation estimator; the LLM client is only built when used
    let estimator: Arc<dyn ValuationEstimator> = if config.enable_llm_valuation {
        let llm = LlmClient::new(config.anthropic_api_key.clone())?
            .with_model(&config.anthropic_model)
            .with_api_url(&config.anthropic_api_url);
        info!("LLM valuation enabled (model: {})", llm.model());
        Arc::new(LlmEstimator::new(llm))
    } else {
        info!("Heuristic valuation enabled");
        Arc::new(HeuristicEstimator)
    };

    info!(
        "Default commission rate: {}",
        money::format_rate(config.default_commission_rate)
    );

    let state = AppState {
        db,
        market_cache,
        s3,
        config: config.clone(),
        estimator,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the CRM frontend host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "emlak-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("eu-central-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
