use anyhow::Result;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::market::cache::{CacheLookup, MarketCache};
use crate::market::normalize::{normalize_category, normalize_location};
use crate::market::resolver::ValuationQuery;
use crate::models::market::MarketStat;

/// One market statistic as produced by the periodic market job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMarketStat {
    pub city: String,
    pub district: String,
    pub property_type: String,
    pub room_count: Option<String>,
    pub age_range: Option<String>,
    pub average_price: f64,
    pub median_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_per_area: f64,
    pub sample_size: i32,
}

impl NewMarketStat {
    /// Returns a human-readable reason when the statistic is unusable.
    /// Price ordering (min <= median <= max) is not checked; scraped snapshots
    /// are often internally inconsistent.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("city", &self.city),
            ("district", &self.district),
            ("property_type", &self.property_type),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} cannot be empty"));
            }
        }
        for (field, value) in [
            ("average_price", self.average_price),
            ("median_price", self.median_price),
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("price_per_area", self.price_per_area),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{field} must be a positive number"));
            }
        }
        if self.sample_size < 0 {
            return Err("sample_size cannot be negative".to_string());
        }
        Ok(())
    }
}

/// Inserts or refreshes the statistic for its
/// (city, district, property_type, room_count, age_range) key.
/// Location and type are keyed on their folded forms, so "Muğla" and "MUGLA"
/// land on the same row and candidate lookups can filter in SQL.
pub async fn upsert_market_stat(pool: &PgPool, stat: &NewMarketStat) -> Result<MarketStat> {
    let row = sqlx::query_as::<_, MarketStat>(
        r#"
        INSERT INTO market_stats
            (id, city, district, city_key, district_key, property_type, room_count,
             age_range, average_price, median_price, min_price, max_price,
             price_per_area, sample_size, updated_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, now())
        ON CONFLICT (city_key, district_key, property_type, room_count, age_range) DO UPDATE
            SET city = EXCLUDED.city,
                district = EXCLUDED.district,
                average_price = EXCLUDED.average_price,
                median_price = EXCLUDED.median_price,
                min_price = EXCLUDED.min_price,
                max_price = EXCLUDED.max_price,
                price_per_area = EXCLUDED.price_per_area,
                sample_size = EXCLUDED.sample_size,
                updated_at = now()
        RETURNING id, city, district, property_type, room_count, age_range,
                  average_price, median_price, min_price, max_price, price_per_area,
                  sample_size, updated_at
        "#,
    )
    .bind(stat.city.trim())
    .bind(stat.district.trim())
    .bind(normalize_location(&stat.city))
    .bind(normalize_location(&stat.district))
    .bind(normalize_category(&stat.property_type))
    .bind(stat.room_count.as_deref().map(str::trim))
    .bind(stat.age_range.as_deref().map(str::trim))
    .bind(stat.average_price)
    .bind(stat.median_price)
    .bind(stat.min_price)
    .bind(stat.max_price)
    .bind(stat.price_per_area)
    .bind(stat.sample_size)
    .fetch_one(pool)
    .await?;

    info!(
        "Upserted market stat {} ({} / {} / {} / {:?})",
        row.id, row.city, row.district, row.property_type, row.room_count
    );
    Ok(row)
}

/// Folded lookup needles for one query. Every record any resolver stage could
/// pick has `district_key` containing the district or the city needle.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFilter {
    pub property_type: String,
    pub city: String,
    pub district: String,
}

impl CandidateFilter {
    pub fn from_query(query: &ValuationQuery) -> Self {
        Self {
            property_type: normalize_category(&query.property_type),
            city: normalize_location(&query.city),
            district: normalize_location(&query.district),
        }
    }

    /// Empty needles match nothing, so a filter without either one needs no query.
    pub fn has_location(&self) -> bool {
        !self.city.is_empty() || !self.district.is_empty()
    }
}

const CANDIDATES_SQL: &str = r#"
    SELECT id, city, district, property_type, room_count, age_range,
           average_price, median_price, min_price, max_price, price_per_area,
           sample_size, updated_at
    FROM market_stats
    WHERE property_type = $1
      AND (($2 <> '' AND strpos(district_key, $2) > 0)
        OR ($3 <> '' AND strpos(district_key, $3) > 0))
    ORDER BY updated_at DESC
"#;

/// Every stored record that could satisfy a resolver stage for `filter`, newest
/// first. Final ranking is left to the resolver.
pub async fn fetch_candidates(pool: &PgPool, filter: &CandidateFilter) -> Result<Vec<MarketStat>> {
    Ok(sqlx::query_as::<_, MarketStat>(CANDIDATES_SQL)
        .bind(&filter.property_type)
        .bind(&filter.district)
        .bind(&filter.city)
        .fetch_all(pool)
        .await?)
}

/// `fetch_candidates` behind the Redis cache.
pub async fn load_candidates(
    pool: &PgPool,
    cache: &MarketCache,
    filter: &CandidateFilter,
) -> Result<Vec<MarketStat>> {
    if !filter.has_location() {
        return Ok(Vec::new());
    }

    // No generation means Redis is down; skip the write-back too.
    let generation = match cache.lookup(filter).await {
        Some(CacheLookup {
            stats: Some(cached),
            ..
        }) => return Ok(cached),
        Some(CacheLookup { generation, .. }) => Some(generation),
        None => None,
    };

    let stats = fetch_candidates(pool, filter).await?;
    if let Some(generation) = generation {
        cache.put(filter, generation, &stats).await;
    }
    Ok(stats)
}
