use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub listing_id: Option<Uuid>,
    /// "sale" | "rental"
    pub kind: String,
    /// Sale price, or monthly rent for rentals.
    pub amount: f64,
    pub gross_amount: f64,
    pub tax: f64,
    pub net_amount: f64,
    pub effective_rate: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentCommissionSettingsRow {
    pub agent_id: Uuid,
    pub flat_rate: Option<f64>,
    /// Serialized `CommissionTierTable` bands.
    pub tiers: Option<Value>,
    pub updated_at: DateTime<Utc>,
}
