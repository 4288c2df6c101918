//! Market Comparable Resolver — picks the single best `MarketStat` for a valuation query.
//!
//! Three confidence tiers, tried in order until one yields a candidate:
//! 1. `Exact`: city, district, property type and room count all equal.
//! 2. `Relaxed`: district contains the queried district OR the queried city
//!    (catches swapped city/district input); type and room count still filtered.
//! 3. `Fallback`: same location test as `Relaxed`, room count ignored.
//!
//! Within a tier the most recently updated record wins. All text comparisons run
//! on normalized values (see `normalize`). An empty needle never matches anything.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market::normalize::{normalize_category, normalize_location, normalize_room_count};
use crate::models::market::MarketStat;

/// Which resolver tier produced the comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Relaxed,
    Fallback,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Relaxed => "relaxed",
            MatchKind::Fallback => "fallback",
        }
    }
}

/// The caller's valuation request. Only the location/type/room fields drive the
/// resolver; the property attributes are passed through to the estimator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValuationQuery {
    pub city: String,
    pub district: String,
    pub property_type: String,
    /// `None` (or blank) means "any room count".
    #[serde(default)]
    pub room_count: Option<String>,
    #[serde(default)]
    pub area_m2: Option<f64>,
    #[serde(default)]
    pub building_age: Option<u32>,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub total_floors: Option<i32>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub kind: MatchKind,
    pub stat: MarketStat,
}

/// Query fields folded once up front.
struct Needles<'a> {
    city: String,
    district: String,
    property_type: String,
    room_count: Option<&'a str>,
}

impl<'a> Needles<'a> {
    fn from_query(query: &'a ValuationQuery) -> Self {
        Self {
            city: normalize_location(&query.city),
            district: normalize_location(&query.district),
            property_type: normalize_category(&query.property_type),
            room_count: query
                .room_count
                .as_deref()
                .map(normalize_room_count)
                .filter(|rooms| !rooms.is_empty()),
        }
    }

    fn type_matches(&self, stat: &MarketStat) -> bool {
        !self.property_type.is_empty()
            && normalize_category(&stat.property_type) == self.property_type
    }

    fn room_matches(&self, stat: &MarketStat) -> bool {
        match self.room_count {
            None => true,
            Some(wanted) => stat
                .room_count
                .as_deref()
                .map(normalize_room_count)
                .is_some_and(|have| have == wanted),
        }
    }

    fn location_equals(&self, stat: &MarketStat) -> bool {
        equals_non_empty(&normalize_location(&stat.city), &self.city)
            && equals_non_empty(&normalize_location(&stat.district), &self.district)
    }

    fn location_contains(&self, stat: &MarketStat) -> bool {
        let district = normalize_location(&stat.district);
        contains_non_empty(&district, &self.district) || contains_non_empty(&district, &self.city)
    }
}

fn equals_non_empty(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack == needle
}

fn contains_non_empty(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.contains(needle)
}

/// Newest record satisfying `predicate`. Ties keep the earliest in input order.
fn most_recent<'s, F>(stats: &'s [MarketStat], predicate: F) -> Option<&'s MarketStat>
where
    F: Fn(&MarketStat) -> bool,
{
    stats.iter().filter(|&s| predicate(s)).fold(None, |best, s| match best {
        Some(b) if b.updated_at >= s.updated_at => Some(b),
        _ => Some(s),
    })
}

/// Resolves the best comparable for `query` among `all_stats`.
///
/// Returns `None` when no tier matches; callers treat that as "insufficient
/// market data", not as an error.
pub fn resolve(query: &ValuationQuery, all_stats: &[MarketStat]) -> Option<MatchResult> {
    let needles = Needles::from_query(query);

    let stages: [(MatchKind, &dyn Fn(&MarketStat) -> bool); 3] = [
        (MatchKind::Exact, &|s: &MarketStat| {
            needles.location_equals(s) && needles.type_matches(s) && needles.room_matches(s)
        }),
        (MatchKind::Relaxed, &|s: &MarketStat| {
            needles.location_contains(s) && needles.type_matches(s) && needles.room_matches(s)
        }),
        (MatchKind::Fallback, &|s: &MarketStat| {
            needles.location_contains(s) && needles.type_matches(s)
        }),
    ];

    for (kind, predicate) in stages {
        if let Some(stat) = most_recent(all_stats, predicate) {
            debug!(
                "Resolved comparable {} ({} / {} / {}) at stage {}",
                stat.id,
                stat.city,
                stat.district,
                stat.property_type,
                kind.as_str()
            );
            return Some(MatchResult {
                kind,
                stat: stat.clone(),
            });
        }
    }

    debug!(
        "No comparable for {} / {} / {}",
        query.city, query.district, query.property_type
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn make_stat(
        city: &str,
        district: &str,
        property_type: &str,
        room_count: Option<&str>,
        days_old: i64,
    ) -> MarketStat {
        MarketStat {
            id: Uuid::new_v4(),
            city: city.to_string(),
            district: district.to_string(),
            property_type: property_type.to_string(),
            room_count: room_count.map(String::from),
            age_range: None,
            average_price: 4_000_000.0,
            median_price: 3_800_000.0,
            min_price: 2_500_000.0,
            max_price: 6_000_000.0,
            price_per_area: 40_000.0,
            sample_size: 25,
            updated_at: base_time() - Duration::days(days_old),
        }
    }

    fn make_query(city: &str, district: &str, property_type: &str, rooms: Option<&str>) -> ValuationQuery {
        ValuationQuery {
            city: city.to_string(),
            district: district.to_string(),
            property_type: property_type.to_string(),
            room_count: rooms.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_stats_returns_none() {
        let query = make_query("İstanbul", "Kadıköy", "apartment", Some("3+1"));
        assert!(resolve(&query, &[]).is_none());
    }

    #[test]
    fn test_exact_match_prefers_most_recent() {
        let stale = make_stat("İstanbul", "Kadıköy", "apartment", Some("3+1"), 30);
        let fresh = make_stat("istanbul", "KADIKÖY", "Apartment", Some("3+1"), 2);
        let middle = make_stat("İstanbul", "Kadıköy", "apartment", Some("3+1"), 10);
        let stats = vec![stale, fresh.clone(), middle];

        let query = make_query("İstanbul", "Kadıköy", "apartment", Some("3+1"));
        let result = resolve(&query, &stats).unwrap();

        assert_eq!(result.kind, MatchKind::Exact);
        assert_eq!(result.stat.id, fresh.id);
        for s in &stats {
            assert!(result.stat.updated_at >= s.updated_at);
        }
    }

    #[test]
    fn test_exact_match_ignores_other_room_counts() {
        let other_rooms = make_stat("İzmir", "Karşıyaka", "apartment", Some("2+1"), 0);
        let wanted = make_stat("İzmir", "Karşıyaka", "apartment", Some("3+1"), 40);
        let stats = vec![other_rooms, wanted.clone()];

        let query = make_query("İzmir", "Karşıyaka", "apartment", Some("3+1"));
        let result = resolve(&query, &stats).unwrap();
        assert_eq!(result.kind, MatchKind::Exact);
        assert_eq!(result.stat.id, wanted.id);
    }

    #[test]
    fn test_relaxed_when_district_is_substring() {
        let stat = make_stat("Muğla", "Bodrum Merkez", "villa", Some("4+1"), 5);
        let stats = vec![stat.clone()];

        let query = make_query("Muğla", "Bodrum", "villa", Some("4+1"));
        let result = resolve(&query, &stats).unwrap();
        assert_eq!(result.kind, MatchKind::Relaxed);
        assert_eq!(result.stat.id, stat.id);
    }

    #[test]
    fn test_relaxed_handles_swapped_city_and_district() {
        // User typed the district into the city field.
        let stat = make_stat("Antalya", "Alanya", "apartment", Some("2+1"), 1);
        let stats = vec![stat.clone()];

        let query = make_query("Alanya", "Antalya", "apartment", Some("2+1"));
        let result = resolve(&query, &stats).unwrap();
        assert_eq!(result.kind, MatchKind::Relaxed);
    }

    #[test]
    fn test_relaxed_preferred_over_fallback() {
        // A newer record without the wanted room count must not win over an older relaxed hit.
        let relaxed = make_stat("Muğla", "Bodrum Yalıkavak", "villa", Some("4+1"), 60);
        let fallback_only = make_stat("Muğla", "Bodrum Gümbet", "villa", Some("6+2"), 0);
        let stats = vec![fallback_only, relaxed.clone()];

        let query = make_query("Muğla", "Bodrum", "villa", Some("4+1"));
        let result = resolve(&query, &stats).unwrap();
        assert_eq!(result.kind, MatchKind::Relaxed);
        assert_eq!(result.stat.id, relaxed.id);
    }

    #[test]
    fn test_fallback_drops_room_filter() {
        let older = make_stat("Muğla", "Bodrum", "villa", Some("6+2"), 20);
        let newer = make_stat("Muğla", "Bodrum", "villa", Some("5+1"), 3);
        let stats = vec![older, newer.clone()];

        let query = make_query("Muğla", "Bodrum", "villa", Some("3+1"));
        let result = resolve(&query, &stats).unwrap();
        assert_eq!(result.kind, MatchKind::Fallback);
        assert_eq!(result.stat.id, newer.id);
    }

    #[test]
    fn test_property_type_is_never_relaxed() {
        let stat = make_stat("Muğla", "Bodrum", "land", Some("3+1"), 0);
        let query = make_query("Muğla", "Bodrum", "villa", Some("3+1"));
        assert!(resolve(&query, &[stat]).is_none());
    }

    #[test]
    fn test_empty_location_matches_nothing() {
        let stats = vec![
            make_stat("İstanbul", "Beşiktaş", "apartment", Some("3+1"), 0),
            make_stat("", "", "apartment", Some("3+1"), 0),
            make_stat("Ankara", "Çankaya", "apartment", None, 0),
        ];
        let query = make_query("", "", "apartment", Some("3+1"));
        assert!(resolve(&query, &stats).is_none());

        let whitespace = make_query("   ", " ", "apartment", None);
        assert!(resolve(&whitespace, &stats).is_none());
    }

    #[test]
    fn test_empty_district_still_matches_via_city() {
        let stat = make_stat("İstanbul", "Kadıköy Moda", "apartment", Some("2+1"), 0);
        let query = make_query("Kadıköy", "", "apartment", Some("2+1"));
        let result = resolve(&query, &[stat]).unwrap();
        assert_eq!(result.kind, MatchKind::Relaxed);
    }

    #[test]
    fn test_accent_folding_matches_ascii_input() {
        let stat = make_stat("Muğla", "Fethiye", "apartment", Some("2+1"), 0);
        let query = make_query("mugla", "FETHIYE", "Apartment", Some("2+1"));
        let result = resolve(&query, &[stat]).unwrap();
        assert_eq!(result.kind, MatchKind::Exact);
    }

    #[test]
    fn test_missing_room_count_is_wildcard() {
        let stat = make_stat("Ankara", "Çankaya", "office", Some("5+0"), 0);
        let query = make_query("Ankara", "Çankaya", "office", None);
        let result = resolve(&query, &[stat]).unwrap();
        assert_eq!(result.kind, MatchKind::Exact);
    }

    #[test]
    fn test_blank_room_count_is_wildcard() {
        let stat = make_stat("Ankara", "Çankaya", "apartment", Some("3+1"), 0);
        for rooms in ["", "   "] {
            let query = make_query("Ankara", "Çankaya", "apartment", Some(rooms));
            let result = resolve(&query, &[stat.clone()]).unwrap();
            assert_eq!(result.kind, MatchKind::Exact, "rooms {rooms:?}");
        }
    }

    #[test]
    fn test_record_without_room_count_only_matches_fallback() {
        let aggregate = make_stat("Ankara", "Çankaya", "apartment", None, 0);
        let query = make_query("Ankara", "Çankaya", "apartment", Some("3+1"));
        let result = resolve(&query, &[aggregate]).unwrap();
        assert_eq!(result.kind, MatchKind::Fallback);
    }

    #[test]
    fn test_equal_timestamps_keep_first_in_input_order() {
        let first = make_stat("İzmir", "Bornova", "apartment", Some("3+1"), 1);
        let mut second = make_stat("İzmir", "Bornova", "apartment", Some("3+1"), 1);
        second.updated_at = first.updated_at;
        let stats = vec![first.clone(), second];

        let query = make_query("İzmir", "Bornova", "apartment", Some("3+1"));
        assert_eq!(resolve(&query, &stats).unwrap().stat.id, first.id);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let stats = vec![
            make_stat("Muğla", "Bodrum", "villa", Some("4+1"), 9),
            make_stat("Muğla", "Bodrum Merkez", "villa", Some("4+1"), 3),
            make_stat("Muğla", "Marmaris", "villa", Some("3+1"), 1),
        ];
        let query = make_query("Muğla", "Bodrum", "villa", Some("4+1"));
        assert_eq!(resolve(&query, &stats), resolve(&query, &stats));
    }

    #[test]
    fn test_match_kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&MatchKind::Fallback).unwrap(), "\"fallback\"");
    }
}
