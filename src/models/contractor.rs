//! # Contractor DTOs
//!
//! Read-only view types over the collaborator-owned `contractor_tier_view`.
//! Tier is captured as an immutable snapshot at selection time; tier
//! promotion (3→2→1) is owned by the external onboarding flow and never
//! written from this engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::constants::ContractorTier;

/// One row of the contractor tier view, as read at selection time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ContractorTierRow {
    pub contractor_id: i64,
    pub company_name: String,
    pub tier: i32,
    pub rating: f64,
    pub historical_response_rate: f64,
    pub specialties: Option<serde_json::Value>,
    pub service_area: Option<String>,
    pub last_contacted_at: Option<NaiveDateTime>,
    pub contacts_this_week: i64,
    pub contacts_this_month: i64,
}

impl ContractorTierRow {
    pub fn contractor_tier(&self) -> Option<ContractorTier> {
        ContractorTier::from_i32(self.tier)
    }
}

/// Immutable contractor reference handed to callers after selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorRef {
    pub contractor_id: i64,
    pub tier: ContractorTier,
    pub historical_response_rate: f64,
}

impl From<&ContractorTierRow> for ContractorRef {
    fn from(row: &ContractorTierRow) -> Self {
        Self {
            contractor_id: row.contractor_id,
            tier: ContractorTier::from_i32(row.tier).unwrap_or(ContractorTier::Tier3),
            historical_response_rate: row.historical_response_rate,
        }
    }
}
