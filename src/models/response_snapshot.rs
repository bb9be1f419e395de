//! # Response Snapshot Model
//!
//! Append-only time series of campaign engagement: contacted / opened /
//! clicked / responded / bid counts, overall and per tier. Rows are written by
//! the response tracker on each evaluation pass and never updated.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::{OutreachError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResponseSnapshot {
    pub snapshot_id: i64,
    pub campaign_id: i64,
    pub contacted: i32,
    pub opened: i32,
    pub clicked: i32,
    pub responded: i32,
    pub bids_submitted: i32,
    pub tier1_contacted: i32,
    pub tier1_responded: i32,
    pub tier1_bids: i32,
    pub tier2_contacted: i32,
    pub tier2_responded: i32,
    pub tier2_bids: i32,
    pub tier3_contacted: i32,
    pub tier3_responded: i32,
    pub tier3_bids: i32,
    pub overall_response_rate: f64,
    pub captured_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewResponseSnapshot {
    pub campaign_id: i64,
    pub contacted: i32,
    pub opened: i32,
    pub clicked: i32,
    pub responded: i32,
    pub bids_submitted: i32,
    pub tier1_contacted: i32,
    pub tier1_responded: i32,
    pub tier1_bids: i32,
    pub tier2_contacted: i32,
    pub tier2_responded: i32,
    pub tier2_bids: i32,
    pub tier3_contacted: i32,
    pub tier3_responded: i32,
    pub tier3_bids: i32,
    pub overall_response_rate: f64,
}

impl ResponseSnapshot {
    pub async fn create(pool: &PgPool, snapshot: NewResponseSnapshot) -> Result<ResponseSnapshot> {
        let row = sqlx::query_as::<_, ResponseSnapshot>(
            r#"
            INSERT INTO response_snapshots (
                campaign_id, contacted, opened, clicked, responded, bids_submitted,
                tier1_contacted, tier1_responded, tier1_bids,
                tier2_contacted, tier2_responded, tier2_bids,
                tier3_contacted, tier3_responded, tier3_bids,
                overall_response_rate, captured_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW())
            RETURNING *
            "#,
        )
        .bind(snapshot.campaign_id)
        .bind(snapshot.contacted)
        .bind(snapshot.opened)
        .bind(snapshot.clicked)
        .bind(snapshot.responded)
        .bind(snapshot.bids_submitted)
        .bind(snapshot.tier1_contacted)
        .bind(snapshot.tier1_responded)
        .bind(snapshot.tier1_bids)
        .bind(snapshot.tier2_contacted)
        .bind(snapshot.tier2_responded)
        .bind(snapshot.tier2_bids)
        .bind(snapshot.tier3_contacted)
        .bind(snapshot.tier3_responded)
        .bind(snapshot.tier3_bids)
        .bind(snapshot.overall_response_rate)
        .fetch_one(pool)
        .await
        .map_err(|e| OutreachError::database("response_snapshot create", e))?;

        Ok(row)
    }

    /// Snapshot history for a campaign, oldest first
    pub async fn for_campaign(pool: &PgPool, campaign_id: i64) -> Result<Vec<ResponseSnapshot>> {
        let rows = sqlx::query_as::<_, ResponseSnapshot>(
            "SELECT * FROM response_snapshots WHERE campaign_id = $1 ORDER BY captured_at",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("response_snapshot for_campaign", e))?;

        Ok(rows)
    }

    /// Per-tier response rate for dashboards; 0 when nothing was contacted
    pub fn tier_response_rate(&self, tier: i32) -> f64 {
        let (contacted, responded) = match tier {
            1 => (self.tier1_contacted, self.tier1_responded),
            2 => (self.tier2_contacted, self.tier2_responded),
            3 => (self.tier3_contacted, self.tier3_responded),
            _ => return 0.0,
        };
        if contacted == 0 {
            0.0
        } else {
            f64::from(responded) / f64::from(contacted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_tier_response_rate() {
        let snapshot = ResponseSnapshot {
            snapshot_id: 1,
            campaign_id: 1,
            contacted: 10,
            opened: 6,
            clicked: 4,
            responded: 5,
            bids_submitted: 2,
            tier1_contacted: 4,
            tier1_responded: 3,
            tier1_bids: 1,
            tier2_contacted: 6,
            tier2_responded: 2,
            tier2_bids: 1,
            tier3_contacted: 0,
            tier3_responded: 0,
            tier3_bids: 0,
            overall_response_rate: 0.5,
            captured_at: Utc::now().naive_utc(),
        };

        assert!((snapshot.tier_response_rate(1) - 0.75).abs() < f64::EPSILON);
        assert!((snapshot.tier_response_rate(2) - (2.0 / 6.0)).abs() < f64::EPSILON);
        // Zero contacted yields zero, not NaN
        assert_eq!(snapshot.tier_response_rate(3), 0.0);
    }
}
