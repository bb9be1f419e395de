//! # Escalation Model
//!
//! Audit record for every escalation action taken at a check-in: the level,
//! the triggering ratio, contractors added per tier, and whether the
//! escalation later proved successful. `escalation_successful` stays null
//! until the next evaluated check-in back-fills it; once `resolved_at` is set
//! the row is never mutated again.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::{OutreachError, Result};
use crate::state_machine::states::{CampaignPriority, EscalationLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Escalation {
    pub escalation_id: i64,
    pub campaign_id: i64,
    pub check_in_id: i64,
    pub escalation_level: String,
    pub performance_ratio: f64,
    pub contractors_added_tier1: i32,
    pub contractors_added_tier2: i32,
    pub contractors_added_tier3: i32,
    pub priority_raised_to: Option<String>,
    pub filters_relaxed: bool,
    pub human_review_flagged: bool,
    pub escalation_successful: Option<bool>,
    pub resolved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEscalation {
    pub campaign_id: i64,
    pub check_in_id: i64,
    pub escalation_level: EscalationLevel,
    pub performance_ratio: f64,
    pub contractors_added_tier1: i32,
    pub contractors_added_tier2: i32,
    pub contractors_added_tier3: i32,
    pub priority_raised_to: Option<CampaignPriority>,
    pub filters_relaxed: bool,
    pub human_review_flagged: bool,
}

impl Escalation {
    pub async fn create(pool: &PgPool, new_escalation: NewEscalation) -> Result<Escalation> {
        let escalation = sqlx::query_as::<_, Escalation>(
            r#"
            INSERT INTO campaign_escalations (
                campaign_id, check_in_id, escalation_level, performance_ratio,
                contractors_added_tier1, contractors_added_tier2, contractors_added_tier3,
                priority_raised_to, filters_relaxed, human_review_flagged, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING *
            "#,
        )
        .bind(new_escalation.campaign_id)
        .bind(new_escalation.check_in_id)
        .bind(new_escalation.escalation_level.to_string())
        .bind(new_escalation.performance_ratio)
        .bind(new_escalation.contractors_added_tier1)
        .bind(new_escalation.contractors_added_tier2)
        .bind(new_escalation.contractors_added_tier3)
        .bind(new_escalation.priority_raised_to.map(|p| p.to_string()))
        .bind(new_escalation.filters_relaxed)
        .bind(new_escalation.human_review_flagged)
        .fetch_one(pool)
        .await
        .map_err(|e| OutreachError::database("escalation create", e))?;

        Ok(escalation)
    }

    /// Escalation history for a campaign, newest last, for audit/reporting
    pub async fn for_campaign(pool: &PgPool, campaign_id: i64) -> Result<Vec<Escalation>> {
        let escalations = sqlx::query_as::<_, Escalation>(
            "SELECT * FROM campaign_escalations WHERE campaign_id = $1 ORDER BY created_at",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("escalation for_campaign", e))?;

        Ok(escalations)
    }

    /// Unresolved escalations for a campaign, awaiting success back-fill
    pub async fn unresolved_for_campaign(
        pool: &PgPool,
        campaign_id: i64,
    ) -> Result<Vec<Escalation>> {
        let escalations = sqlx::query_as::<_, Escalation>(
            r#"
            SELECT * FROM campaign_escalations
            WHERE campaign_id = $1 AND resolved_at IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("escalation unresolved_for_campaign", e))?;

        Ok(escalations)
    }

    /// Back-fill the success signal. A row can only be resolved once; an
    /// escalation that added zero contractors can never be marked successful.
    pub async fn resolve(pool: &PgPool, escalation_id: i64, successful: bool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaign_escalations
            SET escalation_successful = $2
                AND (contractors_added_tier1 + contractors_added_tier2 + contractors_added_tier3) > 0,
                resolved_at = NOW()
            WHERE escalation_id = $1 AND resolved_at IS NULL
            "#,
        )
        .bind(escalation_id)
        .bind(successful)
        .execute(pool)
        .await
        .map_err(|e| OutreachError::database("escalation resolve", e))?;

        Ok(())
    }

    pub fn total_contractors_added(&self) -> i32 {
        self.contractors_added_tier1 + self.contractors_added_tier2 + self.contractors_added_tier3
    }

    pub fn level(&self) -> EscalationLevel {
        self.escalation_level.parse().unwrap_or(EscalationLevel::None)
    }
}
