//! Commission Calculator — sale (flat or graduated) and rental commission.
//!
//! All monetary outputs are whole lira. Tax is a fixed VAT on the rounded
//! gross amount and `net = gross - tax`, so the three figures always reconcile.

use serde::{Deserialize, Serialize};

use crate::commission::tiers::CommissionTierTable;
use crate::money::round_currency;

pub const DEFAULT_RATE: f64 = 0.05;
pub const VAT_RATE: f64 = 0.18;

/// One band's share of a graduated commission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandContribution {
    pub min: f64,
    pub max: Option<f64>,
    pub rate: f64,
    /// Portion of the price that fell inside this band.
    pub covered: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionResult {
    pub gross_amount: f64,
    pub tax: f64,
    pub net_amount: f64,
    pub effective_rate: f64,
    /// Contributing bands, only populated for graduated sale commission.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<BandContribution>,
}

/// How rental commission is charged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RentalPolicy {
    /// One month's rent.
    OneMonth,
    /// A fraction of the annual rent.
    Percentage { rate: f64 },
}

impl CommissionResult {
    fn from_gross(commission: f64, effective_rate: f64, breakdown: Vec<BandContribution>) -> Self {
        let gross_amount = round_currency(commission);
        let tax = round_currency(gross_amount * VAT_RATE);
        Self {
            gross_amount,
            tax,
            net_amount: gross_amount - tax,
            effective_rate,
            breakdown,
        }
    }

    fn zero(nominal_rate: f64) -> Self {
        Self {
            gross_amount: 0.0,
            tax: 0.0,
            net_amount: 0.0,
            effective_rate: nominal_rate,
            breakdown: vec![],
        }
    }
}

fn is_degenerate(amount: f64) -> bool {
    !amount.is_finite() || amount <= 0.0
}

/// Walks the bands in ascending order and charges each band's rate on the part
/// of `price` inside it. Returns the unrounded total and per-band shares.
fn graduated_commission(price: f64, table: &CommissionTierTable) -> (f64, Vec<BandContribution>) {
    let mut commission = 0.0;
    let mut breakdown = Vec::new();

    for band in table.bands() {
        if price <= band.min {
            break;
        }
        let upper = band.max.map_or(price, |max| max.min(price));
        let covered = upper - band.min;
        let amount = covered * band.rate;
        commission += amount;
        breakdown.push(BandContribution {
            min: band.min,
            max: band.max,
            rate: band.rate,
            covered,
            amount,
        });
        if upper >= price {
            break;
        }
    }

    (commission, breakdown)
}

/// Sale commission. A tier table, when given, takes precedence over `flat_rate`;
/// with neither, `DEFAULT_RATE` applies.
pub fn calculate_sale_commission(
    price: f64,
    flat_rate: Option<f64>,
    tiers: Option<&CommissionTierTable>,
) -> CommissionResult {
    match tiers {
        Some(table) => {
            if is_degenerate(price) {
                return CommissionResult::zero(table.nominal_rate());
            }
            let (commission, breakdown) = graduated_commission(price, table);
            debug_assert!(commission <= price * table.max_rate() + 1e-6);
            CommissionResult::from_gross(commission, commission / price, breakdown)
        }
        None => {
            let rate = flat_rate.unwrap_or(DEFAULT_RATE);
            if is_degenerate(price) {
                return CommissionResult::zero(rate);
            }
            CommissionResult::from_gross(price * rate, rate, vec![])
        }
    }
}

/// Rental commission. `OneMonth` reports `1/12` as its effective rate: one month
/// of the annual rent.
pub fn calculate_rental_commission(monthly_rent: f64, policy: RentalPolicy) -> CommissionResult {
    let (commission, rate) = match policy {
        RentalPolicy::OneMonth => (monthly_rent, 1.0 / 12.0),
        RentalPolicy::Percentage { rate } => (monthly_rent * 12.0 * rate, rate),
    };
    if is_degenerate(monthly_rent) {
        return CommissionResult::zero(rate);
    }
    CommissionResult::from_gross(commission, rate, vec![])
}
