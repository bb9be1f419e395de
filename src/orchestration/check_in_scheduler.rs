//! # Check-In Scheduler
//!
//! Computes the check-in timetable for a campaign and detects which check-ins
//! are due. Scheduling is deterministic: configured percentages of
//! `timeline_hours`, each pre-populated with its expected bid count under a
//! linear progress assumption. Due-detection is a pure read; all mutation
//! happens in the evaluation path owned by the campaign manager.

use chrono::{Duration, NaiveDateTime};
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::{Campaign, CheckIn, NewCheckIn};

pub struct CheckInScheduler {
    pool: PgPool,
    percentages: Vec<u32>,
}

/// One planned evaluation point, before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePoint {
    pub check_in_number: i32,
    pub check_in_percentage: i32,
    pub offset_hours: f64,
    pub expected_bids: i32,
}

impl CheckInScheduler {
    pub fn new(pool: PgPool, percentages: Vec<u32>) -> Self {
        Self { pool, percentages }
    }

    /// Persist the full check-in set for a freshly scheduled campaign
    #[instrument(skip(self, campaign), fields(campaign_id = campaign.campaign_id))]
    pub async fn build_schedule(
        &self,
        campaign: &Campaign,
        start: NaiveDateTime,
    ) -> Result<Vec<CheckIn>> {
        let points = schedule_points(
            campaign.bids_needed,
            campaign.timeline_hours,
            &self.percentages,
        );

        let mut check_ins = Vec::with_capacity(points.len());
        for point in points {
            let scheduled_at = start + Duration::seconds((point.offset_hours * 3600.0) as i64);
            let check_in = CheckIn::create(
                &self.pool,
                NewCheckIn {
                    campaign_id: campaign.campaign_id,
                    check_in_number: point.check_in_number,
                    check_in_percentage: point.check_in_percentage,
                    scheduled_at,
                    expected_bids: point.expected_bids,
                },
            )
            .await?;
            check_ins.push(check_in);
        }

        debug!(
            campaign_id = campaign.campaign_id,
            check_ins = check_ins.len(),
            "Check-in schedule built"
        );

        Ok(check_ins)
    }

    /// Check-ins due as of `now` across all running campaigns. Pure read;
    /// never mutates scheduling state.
    pub async fn due_check_ins(&self, now: NaiveDateTime) -> Result<Vec<CheckIn>> {
        CheckIn::due(&self.pool, now).await
    }
}

/// Deterministic schedule computation, separated from persistence so policy
/// tests need no database.
pub fn schedule_points(bids_needed: i32, timeline_hours: i32, percentages: &[u32]) -> Vec<SchedulePoint> {
    percentages
        .iter()
        .enumerate()
        .map(|(index, &pct)| {
            let fraction = f64::from(pct) / 100.0;
            SchedulePoint {
                check_in_number: (index + 1) as i32,
                check_in_percentage: pct as i32,
                offset_hours: f64::from(timeline_hours) * fraction,
                expected_bids: (f64::from(bids_needed) * fraction).round() as i32,
            }
        })
        .collect()
}

/// Partition a campaign's due check-ins into the one to evaluate (the most
/// recent) and the stale ones to skip. The engine always catches up to the
/// latest due check-in rather than replaying older ones, so a single lagging
/// window cannot trigger multiple escalations.
pub fn split_stale(mut due_for_campaign: Vec<CheckIn>) -> Option<(CheckIn, Vec<CheckIn>)> {
    due_for_campaign.sort_by_key(|ci| ci.check_in_number);
    let latest = due_for_campaign.pop()?;
    Some((latest, due_for_campaign))
}
