//! Axum route handlers for the Commission API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commission::calculator::{
    calculate_rental_commission, calculate_sale_commission, CommissionResult, RentalPolicy,
};
use crate::commission::settings::{
    get_agent_settings, insert_transaction, upsert_agent_settings, AgentCommissionSettings,
    TransactionKind,
};
use crate::commission::tiers::{CommissionTier, CommissionTierTable};
use crate::errors::AppError;
use crate::models::transaction::TransactionRow;
use crate::money::{is_valid_amount, is_valid_rate};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SaleCommissionRequest {
    pub price: f64,
    pub flat_rate: Option<f64>,
    pub tiers: Option<Vec<CommissionTier>>,
    /// Falls back to this agent's stored settings when no rate or tiers are given.
    pub agent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RentalCommissionRequest {
    pub monthly_rent: f64,
    #[serde(flatten)]
    pub policy: RentalPolicy,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub agent_id: Uuid,
    pub listing_id: Option<Uuid>,
    pub kind: TransactionKind,
    /// Sale price, or monthly rent for rentals.
    pub amount: f64,
    pub flat_rate: Option<f64>,
    pub tiers: Option<Vec<CommissionTier>>,
    /// Rentals only. Defaults to one month's rent.
    pub rental_policy: Option<RentalPolicy>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub transaction: TransactionRow,
    pub commission: CommissionResult,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub flat_rate: Option<f64>,
    pub tiers: Option<Vec<CommissionTier>>,
}

/// Rate source chosen for a sale.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleTerms {
    pub flat_rate: Option<f64>,
    pub tiers: Option<CommissionTierTable>,
}

// ────────────────────────────────────────────────────────────────────────────
// Validation and term selection
// ────────────────────────────────────────────────────────────────────────────

fn validate_amount(field: &str, value: f64) -> Result<(), AppError> {
    if is_valid_amount(value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} must be a finite, non-negative number"
        )))
    }
}

fn validate_rate(field: &str, value: Option<f64>) -> Result<(), AppError> {
    match value {
        Some(rate) if !is_valid_rate(rate) => Err(AppError::Validation(format!(
            "{field} must be between 0 and 1"
        ))),
        _ => Ok(()),
    }
}

fn validate_policy(policy: &RentalPolicy) -> Result<(), AppError> {
    match policy {
        RentalPolicy::OneMonth => Ok(()),
        RentalPolicy::Percentage { rate } => validate_rate("rate", Some(*rate)),
    }
}

fn parse_tiers(tiers: Option<Vec<CommissionTier>>) -> Result<Option<CommissionTierTable>, AppError> {
    Ok(tiers.map(CommissionTierTable::new).transpose()?)
}

/// Precedence: request tiers, request flat rate, agent tiers, agent flat rate,
/// then the service default.
pub fn select_sale_terms(
    flat_rate: Option<f64>,
    tiers: Option<CommissionTierTable>,
    agent: Option<AgentCommissionSettings>,
    default_rate: f64,
) -> SaleTerms {
    if tiers.is_some() || flat_rate.is_some() {
        return SaleTerms { flat_rate, tiers };
    }
    match agent {
        Some(AgentCommissionSettings {
            tiers: Some(table), ..
        }) => SaleTerms {
            flat_rate: None,
            tiers: Some(table),
        },
        Some(AgentCommissionSettings {
            flat_rate: Some(rate),
            ..
        }) => SaleTerms {
            flat_rate: Some(rate),
            tiers: None,
        },
        _ => SaleTerms {
            flat_rate: Some(default_rate),
            tiers: None,
        },
    }
}

async fn sale_terms_for(
    state: &AppState,
    agent_id: Option<Uuid>,
    flat_rate: Option<f64>,
    tiers: Option<Vec<CommissionTier>>,
) -> Result<SaleTerms, AppError> {
    validate_rate("flat_rate", flat_rate)?;
    let tiers = parse_tiers(tiers)?;

    let agent = match agent_id {
        Some(id) if flat_rate.is_none() && tiers.is_none() => get_agent_settings(&state.db, id)
            .await
            .map_err(AppError::Internal)?,
        _ => None,
    };

    Ok(select_sale_terms(
        flat_rate,
        tiers,
        agent,
        state.config.default_commission_rate,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/commission/sale
pub async fn handle_sale_commission(
    State(state): State<AppState>,
    Json(request): Json<SaleCommissionRequest>,
) -> Result<Json<CommissionResult>, AppError> {
    validate_amount("price", request.price)?;
    let terms = sale_terms_for(&state, request.agent_id, request.flat_rate, request.tiers).await?;

    Ok(Json(calculate_sale_commission(
        request.price,
        terms.flat_rate,
        terms.tiers.as_ref(),
    )))
}

/// GET /api/v1/commission/default-tiers
///
/// The brokerage's standard graduated table, offered as a starting point for
/// agent settings.
pub async fn handle_default_tiers() -> Json<CommissionTierTable> {
    Json(CommissionTierTable::standard())
}

/// POST /api/v1/commission/rental
pub async fn handle_rental_commission(
    Json(request): Json<RentalCommissionRequest>,
) -> Result<Json<CommissionResult>, AppError> {
    validate_amount("monthly_rent", request.monthly_rent)?;
    validate_policy(&request.policy)?;

    Ok(Json(calculate_rental_commission(
        request.monthly_rent,
        request.policy,
    )))
}

/// POST /api/v1/commission/transactions
///
/// Computes the commission for a closed deal and records both.
pub async fn handle_create_transaction(
    State(state): State<AppState>,
    Json(request): Json<TransactionRequest>,
) -> Result<Json<TransactionResponse>, AppError> {
    validate_amount("amount", request.amount)?;

    let commission = match request.kind {
        TransactionKind::Sale => {
            if request.rental_policy.is_some() {
                return Err(AppError::Validation(
                    "rental_policy applies to rentals only".to_string(),
                ));
            }
            let terms = sale_terms_for(
                &state,
                Some(request.agent_id),
                request.flat_rate,
                request.tiers,
            )
            .await?;
            calculate_sale_commission(request.amount, terms.flat_rate, terms.tiers.as_ref())
        }
        TransactionKind::Rental => {
            if request.flat_rate.is_some() || request.tiers.is_some() {
                return Err(AppError::Validation(
                    "flat_rate and tiers apply to sales; use rental_policy for rentals"
                        .to_string(),
                ));
            }
            let policy = request.rental_policy.unwrap_or(RentalPolicy::OneMonth);
            validate_policy(&policy)?;
            calculate_rental_commission(request.amount, policy)
        }
    };

    let transaction = insert_transaction(
        &state.db,
        request.agent_id,
        request.listing_id,
        request.kind,
        request.amount,
        &commission,
    )
    .await
    .map_err(AppError::Internal)?;

    Ok(Json(TransactionResponse {
        transaction,
        commission,
    }))
}

/// GET /api/v1/agents/:id/commission-settings
pub async fn handle_get_settings(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<AgentCommissionSettings>, AppError> {
    get_agent_settings(&state.db, agent_id)
        .await
        .map_err(AppError::Internal)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No commission settings for agent {agent_id}")))
}

/// PUT /api/v1/agents/:id/commission-settings
pub async fn handle_put_settings(
    State(state): State<AppState>,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<SettingsRequest>,
) -> Result<Json<AgentCommissionSettings>, AppError> {
    validate_rate("flat_rate", request.flat_rate)?;
    let settings = AgentCommissionSettings {
        flat_rate: request.flat_rate,
        tiers: parse_tiers(request.tiers)?,
    };

    let stored = upsert_agent_settings(&state.db, agent_id, &settings)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(stored))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tiers_win() {
        let terms = select_sale_terms(
            Some(0.02),
            Some(CommissionTierTable::standard()),
            Some(AgentCommissionSettings {
                flat_rate: Some(0.01),
                tiers: None,
            }),
            0.05,
        );
        assert_eq!(terms.tiers, Some(CommissionTierTable::standard()));
    }

    #[test]
    fn test_request_flat_rate_beats_agent_settings() {
        let terms = select_sale_terms(
            Some(0.02),
            None,
            Some(AgentCommissionSettings {
                flat_rate: None,
                tiers: Some(CommissionTierTable::standard()),
            }),
            0.05,
        );
        assert_eq!(terms.flat_rate, Some(0.02));
        assert!(terms.tiers.is_none());
    }

    #[test]
    fn test_agent_tiers_beat_agent_flat_rate() {
        let terms = select_sale_terms(
            None,
            None,
            Some(AgentCommissionSettings {
                flat_rate: Some(0.03),
                tiers: Some(CommissionTierTable::standard()),
            }),
            0.05,
        );
        assert!(terms.tiers.is_some());
        assert!(terms.flat_rate.is_none());
    }

    #[test]
    fn test_agent_flat_rate_used() {
        let terms = select_sale_terms(
            None,
            None,
            Some(AgentCommissionSettings {
                flat_rate: Some(0.03),
                tiers: None,
            }),
            0.05,
        );
        assert_eq!(terms.flat_rate, Some(0.03));
    }

    #[test]
    fn test_default_rate_when_nothing_configured() {
        let terms = select_sale_terms(None, None, None, 0.04);
        assert_eq!(
            terms,
            SaleTerms {
                flat_rate: Some(0.04),
                tiers: None
            }
        );
    }

    #[test]
    fn test_validate_amount_rejects_negative_and_nan() {
        assert!(validate_amount("price", 1_000.0).is_ok());
        assert!(validate_amount("price", -1.0).is_err());
        assert!(validate_amount("price", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_policy_rate() {
        assert!(validate_policy(&RentalPolicy::OneMonth).is_ok());
        assert!(validate_policy(&RentalPolicy::Percentage { rate: 0.1 }).is_ok());
        assert!(validate_policy(&RentalPolicy::Percentage { rate: 2.0 }).is_err());
    }

    #[test]
    fn test_parse_tiers_surfaces_table_errors() {
        let err = parse_tiers(Some(vec![])).unwrap_err();
        assert!(matches!(err, AppError::InvalidTiers(_)));
        assert!(parse_tiers(None).unwrap().is_none());
    }

    #[test]
    fn test_rental_request_flattens_policy() {
        let req: RentalCommissionRequest =
            serde_json::from_str(r#"{"monthly_rent":20000,"policy":"percentage","rate":0.05}"#)
                .unwrap();
        assert_eq!(req.policy, RentalPolicy::Percentage { rate: 0.05 });
    }
}
