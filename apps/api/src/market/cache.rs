//! Redis cache for resolver candidate lists, keyed by folded property type and
//! location.
//!
//! Each property type has a generation counter that is part of every candidate
//! key; bumping it on upsert retires all cached lists for that type at once.
//! The cache is best-effort: every Redis fault is logged and treated as a miss,
//! so a dead Redis only costs an extra database query.

use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::market::normalize::normalize_category;
use crate::market::repository::CandidateFilter;
use crate::models::market::MarketStat;

const KEY_PREFIX: &str = "market_stats";

#[derive(Clone)]
pub struct MarketCache {
    client: redis::Client,
    ttl_secs: u64,
}

/// Result of a cache read while Redis is reachable.
#[derive(Debug)]
pub struct CacheLookup {
    /// Generation the entry was looked up under; pass it back to `put`.
    pub generation: u64,
    pub stats: Option<Vec<MarketStat>>,
}

pub fn generation_key(property_type: &str) -> String {
    format!("{KEY_PREFIX}:{}:generation", normalize_category(property_type))
}

/// Needles are already folded in `CandidateFilter`.
pub fn candidates_key(filter: &CandidateFilter, generation: u64) -> String {
    format!(
        "{KEY_PREFIX}:{}:{generation}:{}|{}",
        filter.property_type, filter.city, filter.district
    )
}

fn decode(payload: &str) -> Option<Vec<MarketStat>> {
    serde_json::from_str(payload).ok()
}

impl MarketCache {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    /// `None` when Redis is unreachable.
    pub async fn lookup(&self, filter: &CandidateFilter) -> Option<CacheLookup> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Redis unavailable, skipping market cache read: {e}");
                return None;
            }
        };

        let generation = match conn
            .get::<_, Option<u64>>(generation_key(&filter.property_type))
            .await
        {
            Ok(g) => g.unwrap_or(0),
            Err(e) => {
                warn!("Market cache generation read failed: {e}");
                return None;
            }
        };

        let key = candidates_key(filter, generation);
        let stats = match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(payload)) => {
                let stats = decode(&payload);
                if stats.is_none() {
                    warn!("Discarding undecodable market cache entry {key}");
                }
                stats
            }
            Ok(None) => {
                debug!("Market cache miss for {key}");
                None
            }
            Err(e) => {
                warn!("Market cache read failed for {key}: {e}");
                None
            }
        };

        Some(CacheLookup { generation, stats })
    }

    pub async fn put(&self, filter: &CandidateFilter, generation: u64, stats: &[MarketStat]) {
        let key = candidates_key(filter, generation);
        let payload = match serde_json::to_string(stats) {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not encode market stats for cache: {e}");
                return;
            }
        };

        let result = match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                conn.set_ex::<_, _, ()>(&key, payload, self.ttl_secs)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Market cache write failed for {key}: {e}");
        }
    }

    /// Retires every cached candidate list for `property_type`. Entries written
    /// under the old generation expire through their TTL.
    pub async fn invalidate(&self, property_type: &str) {
        let key = generation_key(property_type);
        let result = match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => conn.incr::<_, _, ()>(&key, 1u64).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Market cache invalidation failed for {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::market::resolver::ValuationQuery;

    fn filter(city: &str, district: &str, property_type: &str) -> CandidateFilter {
        CandidateFilter::from_query(&ValuationQuery {
            city: city.to_string(),
            district: district.to_string(),
            property_type: property_type.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_generation_key_is_normalized() {
        assert_eq!(generation_key(" Apartment "), "market_stats:apartment:generation");
        assert_eq!(generation_key("DÜKKAN"), generation_key("dukkan"));
    }

    #[test]
    fn test_candidates_key_scopes_location_and_generation() {
        let bodrum = filter("Muğla", "Bodrum", "Villa");
        assert_eq!(candidates_key(&bodrum, 3), "market_stats:villa:3:mugla|bodrum");
        assert_eq!(
            candidates_key(&bodrum, 3),
            candidates_key(&filter("MUGLA", " bodrum ", "villa"), 3)
        );
        assert_ne!(candidates_key(&bodrum, 3), candidates_key(&bodrum, 4));
        assert_ne!(
            candidates_key(&bodrum, 3),
            candidates_key(&filter("Muğla", "Fethiye", "villa"), 3)
        );
    }

    #[test]
    fn test_decode_round_trips_and_rejects_garbage() {
        let stat = MarketStat {
            id: Uuid::new_v4(),
            city: "Muğla".to_string(),
            district: "Bodrum".to_string(),
            property_type: "villa".to_string(),
            room_count: Some("4+1".to_string()),
            age_range: Some("0-5".to_string()),
            average_price: 18_000_000.0,
            median_price: 16_500_000.0,
            min_price: 9_000_000.0,
            max_price: 45_000_000.0,
            price_per_area: 75_000.0,
            sample_size: 14,
            updated_at: Utc::now(),
        };
        let payload = serde_json::to_string(&vec![stat.clone()]).unwrap();
        assert_eq!(decode(&payload), Some(vec![stat]));
        assert_eq!(decode("not json"), None);
    }
}
