//! # CheckIn Model
//!
//! Pre-computed evaluation points along a campaign's timeline. The full set is
//! created when the campaign is scheduled; each row is mutated exactly once at
//! evaluation time (or marked skipped) and is immutable afterward.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::{OutreachError, Result};
use crate::state_machine::states::EscalationLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CheckIn {
    pub check_in_id: i64,
    pub campaign_id: i64,
    pub check_in_number: i32,
    pub check_in_percentage: i32,
    pub scheduled_at: NaiveDateTime,
    pub expected_bids: i32,
    pub actual_bids: Option<i32>,
    pub performance_ratio: Option<f64>,
    pub on_track: Option<bool>,
    pub escalation_level: Option<String>,
    pub skipped: bool,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// New check-in row, pre-populated at schedule time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCheckIn {
    pub campaign_id: i64,
    pub check_in_number: i32,
    pub check_in_percentage: i32,
    pub scheduled_at: NaiveDateTime,
    pub expected_bids: i32,
}

impl CheckIn {
    pub async fn create(pool: &PgPool, new_check_in: NewCheckIn) -> Result<CheckIn> {
        let check_in = sqlx::query_as::<_, CheckIn>(
            r#"
            INSERT INTO campaign_check_ins (
                campaign_id, check_in_number, check_in_percentage,
                scheduled_at, expected_bids, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(new_check_in.campaign_id)
        .bind(new_check_in.check_in_number)
        .bind(new_check_in.check_in_percentage)
        .bind(new_check_in.scheduled_at)
        .bind(new_check_in.expected_bids)
        .fetch_one(pool)
        .await
        .map_err(|e| OutreachError::database("check_in create", e))?;

        Ok(check_in)
    }

    pub async fn find_by_id(pool: &PgPool, check_in_id: i64) -> Result<Option<CheckIn>> {
        let check_in =
            sqlx::query_as::<_, CheckIn>("SELECT * FROM campaign_check_ins WHERE check_in_id = $1")
                .bind(check_in_id)
                .fetch_optional(pool)
                .await
                .map_err(|e| OutreachError::database("check_in find_by_id", e))?;

        Ok(check_in)
    }

    /// All check-ins for a campaign in evaluation order
    pub async fn for_campaign(pool: &PgPool, campaign_id: i64) -> Result<Vec<CheckIn>> {
        let check_ins = sqlx::query_as::<_, CheckIn>(
            "SELECT * FROM campaign_check_ins WHERE campaign_id = $1 ORDER BY check_in_number",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("check_in for_campaign", e))?;

        Ok(check_ins)
    }

    /// Check-ins due as of `now` that have not yet been evaluated or skipped,
    /// ordered by campaign then percentage so callers see in-campaign order
    pub async fn due(pool: &PgPool, now: NaiveDateTime) -> Result<Vec<CheckIn>> {
        let check_ins = sqlx::query_as::<_, CheckIn>(
            r#"
            SELECT ci.* FROM campaign_check_ins ci
            JOIN outreach_campaigns c ON c.campaign_id = ci.campaign_id
            WHERE ci.scheduled_at <= $1
              AND ci.completed_at IS NULL
              AND c.status = 'running'
            ORDER BY ci.campaign_id, ci.check_in_number
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("check_in due", e))?;

        Ok(check_ins)
    }

    /// Record the evaluation outcome. Refuses to touch an already-completed
    /// row, preserving check-in immutability after evaluation.
    pub async fn record_evaluation(
        pool: &PgPool,
        check_in_id: i64,
        actual_bids: i32,
        performance_ratio: f64,
        on_track: bool,
        escalation_level: EscalationLevel,
    ) -> Result<CheckIn> {
        let check_in = sqlx::query_as::<_, CheckIn>(
            r#"
            UPDATE campaign_check_ins
            SET actual_bids = $2,
                performance_ratio = $3,
                on_track = $4,
                escalation_level = $5,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE check_in_id = $1 AND completed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(check_in_id)
        .bind(actual_bids)
        .bind(performance_ratio)
        .bind(on_track)
        .bind(escalation_level.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("check_in record_evaluation", e))?;

        check_in.ok_or_else(|| OutreachError::Database {
            operation: "check_in record_evaluation".to_string(),
            message: format!("check-in {check_in_id} already completed or missing"),
        })
    }

    /// Mark a stale check-in skipped without evaluating it
    pub async fn mark_skipped(pool: &PgPool, check_in_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaign_check_ins
            SET skipped = TRUE, completed_at = NOW(), updated_at = NOW()
            WHERE check_in_id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(check_in_id)
        .execute(pool)
        .await
        .map_err(|e| OutreachError::database("check_in mark_skipped", e))?;

        Ok(())
    }

    /// The evaluated check-in immediately following this one, if any
    pub async fn next_evaluated(pool: &PgPool, check_in: &CheckIn) -> Result<Option<CheckIn>> {
        let next = sqlx::query_as::<_, CheckIn>(
            r#"
            SELECT * FROM campaign_check_ins
            WHERE campaign_id = $1
              AND check_in_number > $2
              AND completed_at IS NOT NULL
              AND skipped = FALSE
            ORDER BY check_in_number
            LIMIT 1
            "#,
        )
        .bind(check_in.campaign_id)
        .bind(check_in.check_in_number)
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("check_in next_evaluated", e))?;

        Ok(next)
    }
}
