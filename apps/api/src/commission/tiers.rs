//! Graduated commission bands.
//!
//! A table is an ordered list of half-open price bands `[min, max)` covering
//! `[0, ∞)`. Invariants are checked once in `CommissionTierTable::new`; the
//! calculator relies on them and never re-validates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::is_valid_rate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionTier {
    pub min: f64,
    /// `None` for the open-ended top band.
    pub max: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum TierTableError {
    #[error("tier table must contain at least one band")]
    Empty,

    #[error("first band must start at 0, got {0}")]
    FirstBandNotZero(f64),

    #[error("band {index} has a gap or overlap: starts at {min}, previous ended at {previous_max}")]
    NotContiguous {
        index: usize,
        min: f64,
        previous_max: f64,
    },

    #[error("band {index} is empty or inverted: [{min}, {max})")]
    EmptyBand { index: usize, min: f64, max: f64 },

    #[error("band {0} is open-ended but is not the last band")]
    OpenEndedBeforeLast(usize),

    #[error("last band must be open-ended")]
    LastBandBounded,

    #[error("band {index} rate {rate} is outside [0, 1]")]
    InvalidRate { index: usize, rate: f64 },

    #[error("band {0} has a non-finite bound")]
    NonFiniteBound(usize),
}

/// Validated, ordered tier table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CommissionTierTable {
    bands: Vec<CommissionTier>,
}

impl CommissionTierTable {
    pub fn new(bands: Vec<CommissionTier>) -> Result<Self, TierTableError> {
        let first = bands.first().ok_or(TierTableError::Empty)?;
        if first.min != 0.0 {
            return Err(TierTableError::FirstBandNotZero(first.min));
        }

        let last_index = bands.len() - 1;
        let mut previous_max: Option<f64> = None;

        for (index, band) in bands.iter().enumerate() {
            if !band.min.is_finite() || band.max.is_some_and(|m| !m.is_finite()) {
                return Err(TierTableError::NonFiniteBound(index));
            }
            if !is_valid_rate(band.rate) {
                return Err(TierTableError::InvalidRate {
                    index,
                    rate: band.rate,
                });
            }
            if let Some(prev) = previous_max {
                if band.min != prev {
                    return Err(TierTableError::NotContiguous {
                        index,
                        min: band.min,
                        previous_max: prev,
                    });
                }
            }
            match band.max {
                Some(max) if max <= band.min => {
                    return Err(TierTableError::EmptyBand {
                        index,
                        min: band.min,
                        max,
                    });
                }
                Some(max) => {
                    if index == last_index {
                        return Err(TierTableError::LastBandBounded);
                    }
                    previous_max = Some(max);
                }
                None if index != last_index => {
                    return Err(TierTableError::OpenEndedBeforeLast(index));
                }
                None => {}
            }
        }

        Ok(Self { bands })
    }

    /// Brokerage default: 5% up to 1M, 4% up to 3M, 3% above.
    pub fn standard() -> Self {
        Self {
            bands: vec![
                CommissionTier {
                    min: 0.0,
                    max: Some(1_000_000.0),
                    rate: 0.05,
                },
                CommissionTier {
                    min: 1_000_000.0,
                    max: Some(3_000_000.0),
                    rate: 0.04,
                },
                CommissionTier {
                    min: 3_000_000.0,
                    max: None,
                    rate: 0.03,
                },
            ],
        }
    }

    pub fn bands(&self) -> &[CommissionTier] {
        &self.bands
    }

    pub fn max_rate(&self) -> f64 {
        self.bands.iter().map(|b| b.rate).fold(0.0, f64::max)
    }

    /// Rate reported for degenerate prices: the first band's rate.
    pub fn nominal_rate(&self) -> f64 {
        self.bands[0].rate
    }
}

impl<'de> Deserialize<'de> for CommissionTierTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bands = Vec::<CommissionTier>::deserialize(deserializer)?;
        CommissionTierTable::new(bands).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(min: f64, max: Option<f64>, rate: f64) -> CommissionTier {
        CommissionTier { min, max, rate }
    }

    #[test]
    fn test_standard_table_is_valid() {
        let table = CommissionTierTable::standard();
        assert_eq!(
            CommissionTierTable::new(table.bands().to_vec()).unwrap(),
            table
        );
    }

    #[test]
    fn test_single_open_band_is_valid() {
        assert!(CommissionTierTable::new(vec![tier(0.0, None, 0.02)]).is_ok());
    }

    #[test]
    fn test_empty_table_rejected() {
        assert_eq!(CommissionTierTable::new(vec![]), Err(TierTableError::Empty));
    }

    #[test]
    fn test_first_band_must_start_at_zero() {
        let err = CommissionTierTable::new(vec![tier(100.0, None, 0.05)]).unwrap_err();
        assert_eq!(err, TierTableError::FirstBandNotZero(100.0));
    }

    #[test]
    fn test_gap_rejected() {
        let err = CommissionTierTable::new(vec![
            tier(0.0, Some(1_000.0), 0.05),
            tier(1_500.0, None, 0.04),
        ])
        .unwrap_err();
        assert!(matches!(err, TierTableError::NotContiguous { index: 1, .. }));
    }

    #[test]
    fn test_overlap_rejected() {
        let err = CommissionTierTable::new(vec![
            tier(0.0, Some(1_000.0), 0.05),
            tier(900.0, None, 0.04),
        ])
        .unwrap_err();
        assert!(matches!(err, TierTableError::NotContiguous { .. }));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let err = CommissionTierTable::new(vec![
            tier(0.0, Some(0.0), 0.05),
            tier(0.0, None, 0.04),
        ])
        .unwrap_err();
        assert!(matches!(err, TierTableError::EmptyBand { index: 0, .. }));
    }

    #[test]
    fn test_last_band_must_be_open() {
        let err = CommissionTierTable::new(vec![tier(0.0, Some(1_000.0), 0.05)]).unwrap_err();
        assert_eq!(err, TierTableError::LastBandBounded);
    }

    #[test]
    fn test_open_band_must_be_last() {
        let err = CommissionTierTable::new(vec![
            tier(0.0, None, 0.05),
            tier(1_000.0, None, 0.04),
        ])
        .unwrap_err();
        assert_eq!(err, TierTableError::OpenEndedBeforeLast(0));
    }

    #[test]
    fn test_rate_out_of_range_rejected() {
        let err = CommissionTierTable::new(vec![tier(0.0, None, 1.5)]).unwrap_err();
        assert!(matches!(err, TierTableError::InvalidRate { index: 0, .. }));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: CommissionTierTable = serde_json::from_str(
            r#"[{"min":0,"max":500000,"rate":0.06},{"min":500000,"max":null,"rate":0.04}]"#,
        )
        .unwrap();
        assert_eq!(ok.bands().len(), 2);

        let bad = serde_json::from_str::<CommissionTierTable>(
            r#"[{"min":0,"max":500000,"rate":0.06}]"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_serializes_as_plain_band_list() {
        let json = serde_json::to_value(CommissionTierTable::standard()).unwrap();
        assert!(json.is_array());
        assert_eq!(json[2]["max"], serde_json::Value::Null);
    }
}
