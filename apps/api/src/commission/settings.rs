//! Agent-level commission configuration and transaction persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::commission::calculator::CommissionResult;
use crate::commission::tiers::CommissionTierTable;
use crate::models::transaction::{AgentCommissionSettingsRow, TransactionRow};

/// Parsed form of `AgentCommissionSettingsRow`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCommissionSettings {
    pub flat_rate: Option<f64>,
    pub tiers: Option<CommissionTierTable>,
}

impl TryFrom<AgentCommissionSettingsRow> for AgentCommissionSettings {
    type Error = anyhow::Error;

    fn try_from(row: AgentCommissionSettingsRow) -> Result<Self> {
        let tiers = row
            .tiers
            .map(serde_json::from_value::<CommissionTierTable>)
            .transpose()
            .with_context(|| format!("Stored tier table for agent {} is invalid", row.agent_id))?;
        Ok(Self {
            flat_rate: row.flat_rate,
            tiers,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Rental,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Rental => "rental",
        }
    }
}

pub async fn get_agent_settings(
    pool: &PgPool,
    agent_id: Uuid,
) -> Result<Option<AgentCommissionSettings>> {
    let row: Option<AgentCommissionSettingsRow> =
        sqlx::query_as("SELECT * FROM agent_commission_settings WHERE agent_id = $1")
            .bind(agent_id)
            .fetch_optional(pool)
            .await?;
    row.map(AgentCommissionSettings::try_from).transpose()
}

pub async fn upsert_agent_settings(
    pool: &PgPool,
    agent_id: Uuid,
    settings: &AgentCommissionSettings,
) -> Result<AgentCommissionSettings> {
    let tiers = settings
        .tiers
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;

    let row: AgentCommissionSettingsRow = sqlx::query_as(
        r#"
        INSERT INTO agent_commission_settings (agent_id, flat_rate, tiers, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (agent_id) DO UPDATE
            SET flat_rate = EXCLUDED.flat_rate,
                tiers = EXCLUDED.tiers,
                updated_at = now()
        RETURNING *
        "#,
    )
    .bind(agent_id)
    .bind(settings.flat_rate)
    .bind(tiers)
    .fetch_one(pool)
    .await?;

    info!("Updated commission settings for agent {agent_id}");
    row.try_into()
}

/// Records a completed transaction together with its computed commission.
pub async fn insert_transaction(
    pool: &PgPool,
    agent_id: Uuid,
    listing_id: Option<Uuid>,
    kind: TransactionKind,
    amount: f64,
    result: &CommissionResult,
) -> Result<TransactionRow> {
    let row: TransactionRow = sqlx::query_as(
        r#"
        INSERT INTO transactions
            (id, agent_id, listing_id, kind, amount,
             gross_amount, tax, net_amount, effective_rate)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(agent_id)
    .bind(listing_id)
    .bind(kind.as_str())
    .bind(amount)
    .bind(result.gross_amount)
    .bind(result.tax)
    .bind(result.net_amount)
    .bind(result.effective_rate)
    .fetch_one(pool)
    .await?;

    info!(
        "Recorded {} transaction {} for agent {agent_id}: gross {}",
        kind.as_str(),
        row.id,
        result.gross_amount
    );
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn make_row(tiers: Option<serde_json::Value>) -> AgentCommissionSettingsRow {
        AgentCommissionSettingsRow {
            agent_id: Uuid::new_v4(),
            flat_rate: Some(0.03),
            tiers,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_without_tiers_parses() {
        let settings = AgentCommissionSettings::try_from(make_row(None)).unwrap();
        assert_eq!(settings.flat_rate, Some(0.03));
        assert!(settings.tiers.is_none());
    }

    #[test]
    fn test_row_with_valid_tiers_parses() {
        let tiers = serde_json::to_value(CommissionTierTable::standard()).unwrap();
        let settings = AgentCommissionSettings::try_from(make_row(Some(tiers))).unwrap();
        assert_eq!(settings.tiers, Some(CommissionTierTable::standard()));
    }

    #[test]
    fn test_row_with_broken_tiers_is_an_error() {
        let tiers = json!([{"min": 0, "max": 1000, "rate": 0.05}]);
        assert!(AgentCommissionSettings::try_from(make_row(Some(tiers))).is_err());
    }

    #[test]
    fn test_transaction_kind_labels() {
        assert_eq!(TransactionKind::Sale.as_str(), "sale");
        assert_eq!(TransactionKind::Rental.as_str(), "rental");
    }
}
