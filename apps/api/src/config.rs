use anyhow::{bail, Context, Result};

use crate::llm_client::{DEFAULT_API_URL, DEFAULT_MODEL};
use crate::money::is_valid_rate;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_api_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Use the LLM estimator instead of the heuristic one.
    pub enable_llm_valuation: bool,
    /// Flat sale rate when neither the request nor the agent specifies one.
    pub default_commission_rate: f64,
    pub market_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let default_commission_rate: f64 = optional_env("DEFAULT_COMMISSION_RATE", "0.05")
            .parse()
            .context("DEFAULT_COMMISSION_RATE must be a number")?;
        if !is_valid_rate(default_commission_rate) {
            bail!("DEFAULT_COMMISSION_RATE must be between 0 and 1");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            anthropic_model: optional_env("ANTHROPIC_MODEL", DEFAULT_MODEL),
            anthropic_api_url: optional_env("ANTHROPIC_API_URL", DEFAULT_API_URL),
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
            enable_llm_valuation: parse_flag(&optional_env("ENABLE_LLM_VALUATION", "false")),
            default_commission_rate,
            market_cache_ttl_secs: optional_env("MARKET_CACHE_TTL_SECS", "600")
                .parse()
                .context("MARKET_CACHE_TTL_SECS must be a whole number of seconds")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
