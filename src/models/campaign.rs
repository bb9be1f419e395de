//! # Campaign Model
//!
//! The campaign is the primary orchestration unit: one campaign sources bids
//! for one bid card under a strategy (target bid count, timeline, expected
//! responses, confidence). Lifecycle status moves only through
//! [`crate::state_machine::CampaignStateMachine`]; escalation side effects
//! (priority bumps, the `escalated` flag) are written by the escalation engine.
//!
//! ## Database Schema
//!
//! Maps to the `outreach_campaigns` table. Key columns:
//! - `campaign_id`: Primary key (BIGINT)
//! - `campaign_uuid`: External identity (UUID)
//! - `bid_card_id`: The project being sourced
//! - `status` / `priority` / `escalated`: Lifecycle and escalation state
//! - `deadline_at`: Fixed at creation; pausing never extends it

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{OutreachError, Result};
use crate::state_machine::states::{CampaignPriority, CampaignState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub campaign_id: i64,
    pub campaign_uuid: Uuid,
    pub bid_card_id: i64,
    pub bids_needed: i32,
    pub timeline_hours: i32,
    pub expected_responses: i32,
    pub confidence_score: f64,
    pub status: String,
    pub priority: String,
    pub escalated: bool,
    pub location: Option<String>,
    pub specialties: Option<serde_json::Value>,
    pub started_at: Option<NaiveDateTime>,
    pub deadline_at: NaiveDateTime,
    pub final_bid_count: Option<i32>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Campaign sourcing strategy supplied by the bid-card source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStrategy {
    pub bids_needed: i32,
    pub timeline_hours: i32,
    pub expected_responses: i32,
    pub confidence_score: f64,
}

impl CampaignStrategy {
    /// Validate strategy inputs; the only hard-failure path at creation
    pub fn validate(&self) -> Result<()> {
        if self.bids_needed <= 0 {
            return Err(OutreachError::invalid_strategy(format!(
                "bids_needed must be positive, got {}",
                self.bids_needed
            )));
        }
        if self.timeline_hours <= 0 {
            return Err(OutreachError::invalid_strategy(format!(
                "timeline_hours must be positive, got {}",
                self.timeline_hours
            )));
        }
        if self.confidence_score <= 0.0 || self.confidence_score > 1.0 {
            return Err(OutreachError::invalid_strategy(format!(
                "confidence_score must be in (0, 1], got {}",
                self.confidence_score
            )));
        }
        Ok(())
    }
}

/// New campaign for creation (without generated fields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub bid_card_id: i64,
    pub strategy: CampaignStrategy,
    pub location: Option<String>,
    pub specialties: Option<serde_json::Value>,
}

impl Campaign {
    /// Create a campaign in `draft` status.
    ///
    /// `deadline_at` is derived from the same `NOW()` as `created_at`, inside
    /// the insert, so the deadline and the check-in schedule anchored at
    /// `created_at` agree to the microsecond.
    pub async fn create(pool: &PgPool, new_campaign: NewCampaign) -> Result<Campaign> {
        new_campaign.strategy.validate()?;

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO outreach_campaigns (
                campaign_uuid, bid_card_id, bids_needed, timeline_hours,
                expected_responses, confidence_score, status, priority,
                location, specialties, deadline_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'draft', 'normal', $7, $8,
                    NOW() + make_interval(hours => $4), NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_campaign.bid_card_id)
        .bind(new_campaign.strategy.bids_needed)
        .bind(new_campaign.strategy.timeline_hours)
        .bind(new_campaign.strategy.expected_responses)
        .bind(new_campaign.strategy.confidence_score)
        .bind(new_campaign.location)
        .bind(new_campaign.specialties)
        .fetch_one(pool)
        .await
        .map_err(|e| OutreachError::database("campaign create", e))?;

        Ok(campaign)
    }

    pub async fn find_by_id(pool: &PgPool, campaign_id: i64) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM outreach_campaigns WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("campaign find_by_id", e))?;

        Ok(campaign)
    }

    pub async fn find_by_bid_card(pool: &PgPool, bid_card_id: i64) -> Result<Vec<Campaign>> {
        let campaigns = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM outreach_campaigns WHERE bid_card_id = $1 ORDER BY created_at",
        )
        .bind(bid_card_id)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("campaign find_by_bid_card", e))?;

        Ok(campaigns)
    }

    /// Persist a lifecycle status change as a compare-and-swap on the current
    /// status. Returns `None` when the row is no longer in `from`, so a
    /// transition built from a stale read can never move the campaign (in
    /// particular, never out of a terminal state).
    ///
    /// `started_at` is stamped the first time the campaign enters `running`;
    /// `completed_at` is stamped when entering a terminal state.
    pub async fn update_status(
        pool: &PgPool,
        campaign_id: i64,
        from: CampaignState,
        to: CampaignState,
    ) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE outreach_campaigns
            SET status = $3,
                started_at = CASE WHEN $3 = 'running' AND started_at IS NULL
                                  THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $3 IN ('completed', 'cancelled') AND completed_at IS NULL
                                    THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE campaign_id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("campaign update_status", e))?;

        Ok(campaign)
    }

    /// Raise priority (never lowers it) and optionally set the escalated flag
    pub async fn escalate(
        pool: &PgPool,
        campaign_id: i64,
        priority: CampaignPriority,
        mark_escalated: bool,
    ) -> Result<Campaign> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE outreach_campaigns
            SET priority = CASE
                    WHEN ARRAY_POSITION(ARRAY['low','normal','high','urgent'], $2)
                         > ARRAY_POSITION(ARRAY['low','normal','high','urgent'], priority)
                    THEN $2 ELSE priority END,
                escalated = escalated OR $3,
                updated_at = NOW()
            WHERE campaign_id = $1
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(priority.to_string())
        .bind(mark_escalated)
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("campaign escalate", e))?;

        campaign.ok_or(OutreachError::CampaignNotFound { campaign_id })
    }

    pub async fn set_final_bid_count(
        pool: &PgPool,
        campaign_id: i64,
        final_bid_count: i32,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE outreach_campaigns SET final_bid_count = $2, updated_at = NOW() WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .bind(final_bid_count)
        .execute(pool)
        .await
        .map_err(|e| OutreachError::database("campaign set_final_bid_count", e))?;

        Ok(())
    }

    /// All campaigns currently in `running` status
    pub async fn running(pool: &PgPool) -> Result<Vec<Campaign>> {
        let campaigns = sqlx::query_as::<_, Campaign>(
            "SELECT * FROM outreach_campaigns WHERE status = 'running' ORDER BY campaign_id",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("campaign running", e))?;

        Ok(campaigns)
    }

    pub fn state(&self) -> Result<CampaignState> {
        self.status.parse().map_err(|_| OutreachError::Database {
            operation: "campaign state".to_string(),
            message: format!("invalid status in database: {}", self.status),
        })
    }

    pub fn current_priority(&self) -> CampaignPriority {
        self.priority.parse().unwrap_or_default()
    }

    pub fn strategy(&self) -> CampaignStrategy {
        CampaignStrategy {
            bids_needed: self.bids_needed,
            timeline_hours: self.timeline_hours,
            expected_responses: self.expected_responses,
            confidence_score: self.confidence_score,
        }
    }

    /// Hours elapsed since the campaign started, as of `now`
    pub fn elapsed_hours(&self, now: NaiveDateTime) -> f64 {
        match self.started_at {
            Some(started_at) => (now - started_at).num_seconds() as f64 / 3600.0,
            None => 0.0,
        }
    }

    pub fn deadline_passed(&self, now: NaiveDateTime) -> bool {
        now >= self.deadline_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn strategy(bids_needed: i32, timeline_hours: i32) -> CampaignStrategy {
        CampaignStrategy {
            bids_needed,
            timeline_hours,
            expected_responses: 8,
            confidence_score: 0.8,
        }
    }

    #[test]
    fn test_strategy_validation() {
        assert!(strategy(10, 24).validate().is_ok());
        assert!(strategy(0, 24).validate().is_err());
        assert!(strategy(10, 0).validate().is_err());
        assert!(strategy(-1, -1).validate().is_err());

        let mut s = strategy(10, 24);
        s.confidence_score = 1.5;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_elapsed_hours() {
        let now = Utc::now().naive_utc();
        let campaign = Campaign {
            campaign_id: 1,
            campaign_uuid: Uuid::new_v4(),
            bid_card_id: 7,
            bids_needed: 10,
            timeline_hours: 24,
            expected_responses: 8,
            confidence_score: 0.8,
            status: "running".to_string(),
            priority: "normal".to_string(),
            escalated: false,
            location: None,
            specialties: None,
            started_at: Some(now - Duration::hours(12)),
            deadline_at: now + Duration::hours(12),
            final_bid_count: None,
            completed_at: None,
            created_at: now - Duration::hours(12),
            updated_at: now,
        };

        let elapsed = campaign.elapsed_hours(now);
        assert!((elapsed - 12.0).abs() < 0.01);
        assert!(!campaign.deadline_passed(now));
        assert!(campaign.deadline_passed(now + Duration::hours(13)));
    }
}
