use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Tables owned by this service. Idempotent; run once at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS market_stats (
        id              UUID PRIMARY KEY,
        city            TEXT NOT NULL,
        district        TEXT NOT NULL,
        city_key        TEXT NOT NULL,
        district_key    TEXT NOT NULL,
        property_type   TEXT NOT NULL,
        room_count      TEXT,
        age_range       TEXT,
        average_price   DOUBLE PRECISION NOT NULL,
        median_price    DOUBLE PRECISION NOT NULL,
        min_price       DOUBLE PRECISION NOT NULL,
        max_price       DOUBLE PRECISION NOT NULL,
        price_per_area  DOUBLE PRECISION NOT NULL,
        sample_size     INTEGER NOT NULL,
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        UNIQUE NULLS NOT DISTINCT (city_key, district_key, property_type, room_count, age_range)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS market_stats_type_idx ON market_stats (property_type, updated_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS valuations (
        id                 UUID PRIMARY KEY,
        agent_id           UUID,
        query              JSONB NOT NULL,
        estimated_value    DOUBLE PRECISION NOT NULL,
        low_value          DOUBLE PRECISION NOT NULL,
        high_value         DOUBLE PRECISION NOT NULL,
        match_kind         TEXT,
        market_stat_id     UUID,
        estimator_backend  TEXT NOT NULL,
        s3_report_key      TEXT,
        created_at         TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS agent_commission_settings (
        agent_id    UUID PRIMARY KEY,
        flat_rate   DOUBLE PRECISION,
        tiers       JSONB,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id              UUID PRIMARY KEY,
        agent_id        UUID NOT NULL,
        listing_id      UUID,
        kind            TEXT NOT NULL CHECK (kind IN ('sale', 'rental')),
        amount          DOUBLE PRECISION NOT NULL,
        gross_amount    DOUBLE PRECISION NOT NULL,
        tax             DOUBLE PRECISION NOT NULL,
        net_amount      DOUBLE PRECISION NOT NULL,
        effective_rate  DOUBLE PRECISION NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Schema statement failed: {}", statement.trim()))?;
    }
    info!("Schema ready ({} statements)", SCHEMA.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent_sql() {
        for statement in SCHEMA {
            assert!(statement.contains("IF NOT EXISTS"), "{statement}");
        }
    }

    #[test]
    fn test_market_stats_key_treats_null_as_wildcard_row() {
        // Upserts of room_count/age_range = NULL must hit the same row.
        assert!(SCHEMA[0].contains("UNIQUE NULLS NOT DISTINCT"));
    }
}
