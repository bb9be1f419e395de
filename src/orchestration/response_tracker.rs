//! # Response Tracker
//!
//! Point-in-time performance snapshots for a campaign: contacted / opened /
//! clicked / responded / bid counts, overall and per tier. Pure aggregation
//! over outreach item status, externally reported engagement events and bid
//! submissions; the tracker holds no state beyond the append-only snapshot
//! rows it writes.
//!
//! Contacted counts include failed-but-attempted sends. A failed send still
//! consumed a contact-cap slot, and escalation sizing must see it.

use chrono::NaiveDateTime;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::error::{OutreachError, Result};
use crate::models::{Campaign, NewResponseSnapshot, ResponseSnapshot};

pub struct ResponseTracker {
    pool: PgPool,
    projection_max_multiple: f64,
}

#[derive(Debug, sqlx::FromRow)]
struct EngagementCounts {
    contacted: i64,
    opened: i64,
    clicked: i64,
    responded: i64,
    tier1_contacted: i64,
    tier1_responded: i64,
    tier2_contacted: i64,
    tier2_responded: i64,
    tier3_contacted: i64,
    tier3_responded: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct BidCounts {
    bids: i64,
    tier1_bids: i64,
    tier2_bids: i64,
    tier3_bids: i64,
}

impl ResponseTracker {
    pub fn new(pool: PgPool, projection_max_multiple: f64) -> Self {
        Self {
            pool,
            projection_max_multiple,
        }
    }

    /// Aggregate a snapshot as of now and persist it (append-only)
    #[instrument(skip(self, campaign), fields(campaign_id = campaign.campaign_id))]
    pub async fn snapshot(&self, campaign: &Campaign) -> Result<ResponseSnapshot> {
        let engagement = sqlx::query_as::<_, EngagementCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE oqi.status IN ('sending','sent','failed')) AS contacted,
                COUNT(*) FILTER (WHERE oqi.opened_at IS NOT NULL) AS opened,
                COUNT(*) FILTER (WHERE oqi.clicked_at IS NOT NULL) AS clicked,
                COUNT(*) FILTER (WHERE oqi.responded_at IS NOT NULL) AS responded,
                COUNT(*) FILTER (WHERE c.tier = 1 AND oqi.status IN ('sending','sent','failed')) AS tier1_contacted,
                COUNT(*) FILTER (WHERE c.tier = 1 AND oqi.responded_at IS NOT NULL) AS tier1_responded,
                COUNT(*) FILTER (WHERE c.tier = 2 AND oqi.status IN ('sending','sent','failed')) AS tier2_contacted,
                COUNT(*) FILTER (WHERE c.tier = 2 AND oqi.responded_at IS NOT NULL) AS tier2_responded,
                COUNT(*) FILTER (WHERE c.tier = 3 AND oqi.status IN ('sending','sent','failed')) AS tier3_contacted,
                COUNT(*) FILTER (WHERE c.tier = 3 AND oqi.responded_at IS NOT NULL) AS tier3_responded
            FROM outreach_queue_items oqi
            LEFT JOIN contractors c ON c.contractor_id = oqi.contractor_id
            WHERE oqi.campaign_id = $1
            "#,
        )
        .bind(campaign.campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OutreachError::database("response_tracker engagement counts", e))?;

        let bids = sqlx::query_as::<_, BidCounts>(
            r#"
            SELECT
                COUNT(*) AS bids,
                COUNT(*) FILTER (WHERE c.tier = 1) AS tier1_bids,
                COUNT(*) FILTER (WHERE c.tier = 2) AS tier2_bids,
                COUNT(*) FILTER (WHERE c.tier = 3) AS tier3_bids
            FROM campaign_bids cb
            LEFT JOIN contractors c ON c.contractor_id = cb.contractor_id
            WHERE cb.campaign_id = $1
            "#,
        )
        .bind(campaign.campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OutreachError::database("response_tracker bid counts", e))?;

        let overall_response_rate = if engagement.contacted == 0 {
            0.0
        } else {
            engagement.responded as f64 / engagement.contacted as f64
        };

        let snapshot = ResponseSnapshot::create(
            &self.pool,
            NewResponseSnapshot {
                campaign_id: campaign.campaign_id,
                contacted: engagement.contacted as i32,
                opened: engagement.opened as i32,
                clicked: engagement.clicked as i32,
                responded: engagement.responded as i32,
                bids_submitted: bids.bids as i32,
                tier1_contacted: engagement.tier1_contacted as i32,
                tier1_responded: engagement.tier1_responded as i32,
                tier1_bids: bids.tier1_bids as i32,
                tier2_contacted: engagement.tier2_contacted as i32,
                tier2_responded: engagement.tier2_responded as i32,
                tier2_bids: bids.tier2_bids as i32,
                tier3_contacted: engagement.tier3_contacted as i32,
                tier3_responded: engagement.tier3_responded as i32,
                tier3_bids: bids.tier3_bids as i32,
                overall_response_rate,
            },
        )
        .await?;

        debug!(
            campaign_id = campaign.campaign_id,
            contacted = snapshot.contacted,
            responded = snapshot.responded,
            bids = snapshot.bids_submitted,
            "Response snapshot captured"
        );

        Ok(snapshot)
    }

    /// Current bid count for a campaign
    pub async fn current_bid_count(&self, campaign_id: i64) -> Result<i32> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM campaign_bids WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| OutreachError::database("response_tracker current_bid_count", e))?;

        Ok(row.0 as i32)
    }

    /// Linear extrapolation of final bids as of `now`
    pub async fn project_final_bids(&self, campaign: &Campaign, now: NaiveDateTime) -> Result<i32> {
        let current_bids = self.current_bid_count(campaign.campaign_id).await?;
        Ok(project_final_bids(
            current_bids,
            campaign.elapsed_hours(now),
            f64::from(campaign.timeline_hours),
            self.projection_max_multiple,
        ))
    }
}

/// Linear bid projection: `current_bids / elapsed_hours * timeline_hours`,
/// floored at the current count and capped at a multiple of it. Campaigns
/// less than an hour in return the current count unchanged; that early, rate
/// data is all noise.
pub fn project_final_bids(
    current_bids: i32,
    elapsed_hours: f64,
    timeline_hours: f64,
    max_multiple: f64,
) -> i32 {
    if current_bids <= 0 {
        return 0;
    }
    if elapsed_hours < 1.0 {
        return current_bids;
    }

    let projected = f64::from(current_bids) / elapsed_hours * timeline_hours;
    let capped = projected.min(f64::from(current_bids) * max_multiple);
    capped.max(f64::from(current_bids)).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_linear() {
        // 2 bids at 12h of a 24h timeline projects to 4
        assert_eq!(project_final_bids(2, 12.0, 24.0, 10.0), 4);
        // 5 bids at 25% elapsed projects to 20
        assert_eq!(project_final_bids(5, 6.0, 24.0, 10.0), 20);
    }

    #[test]
    fn test_projection_floored_at_current() {
        // Past the deadline the projection cannot drop below what exists
        assert_eq!(project_final_bids(8, 30.0, 24.0, 10.0), 8);
    }

    #[test]
    fn test_projection_capped() {
        // 1 bid at the very start of a long timeline would project absurdly;
        // the cap keeps it at current * max_multiple
        assert_eq!(project_final_bids(1, 1.0, 240.0, 10.0), 10);
    }

    #[test]
    fn test_projection_early_noise_guard() {
        assert_eq!(project_final_bids(3, 0.5, 48.0, 10.0), 3);
    }

    #[test]
    fn test_projection_zero_bids() {
        assert_eq!(project_final_bids(0, 12.0, 24.0, 10.0), 0);
    }
}
