//! # Escalation Engine
//!
//! Compares expected vs. actual progress at each check-in and decides
//! whether, and how hard, to escalate. The ratio→level mapping is a pure
//! function of the performance ratio at evaluation time; the actions per
//! level (contractor additions, priority bumps, filter relaxation) are a pure
//! plan executed against the pool and the queue.
//!
//! Escalation success is back-filled at the next evaluated check-in: an
//! escalation counts as successful when the subsequent ratio improved over
//! the one that triggered it. That signal is captured for later threshold
//! tuning; the tuning loop itself lives elsewhere.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{EscalationThresholds, PolicyConfig};
use crate::constants::events as system_events;
use crate::constants::ContractorTier;
use crate::error::Result;
use crate::events::publisher::EventPublisher;
use crate::models::{
    Campaign, CheckIn, Escalation, NewEscalation, NewOutreachItem, OutreachChannel,
    OutreachQueueItem,
};
use crate::orchestration::contractor_pool::{
    filters_for_campaign, ContractorPool, TierRequest,
};
use crate::orchestration::outreach_queue::OutreachQueue;
use crate::state_machine::states::{CampaignPriority, EscalationLevel};

/// Planned actions for one escalation level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationPlan {
    /// Tier-1 contractors to add (severe and critical)
    pub tier1_additions: usize,
    /// Contractors to add from tiers 2/3 combined, tier 2 first
    pub tier23_additions: usize,
    /// Tier-3-only additions (mild)
    pub tier3_additions: usize,
    pub raise_priority_to: Option<CampaignPriority>,
    pub mark_escalated: bool,
    /// Critical only: widen filters and drop the contacted-exclusion
    pub relax_filters: bool,
    /// Critical only: notify the human-review collaborator
    pub flag_human_review: bool,
}

impl EscalationPlan {
    pub fn is_empty(&self) -> bool {
        self.tier1_additions == 0 && self.tier23_additions == 0 && self.tier3_additions == 0
    }
}

/// Result of evaluating one check-in
#[derive(Debug, Clone)]
pub struct CheckInEvaluation {
    pub check_in: CheckIn,
    pub performance_ratio: f64,
    pub on_track: bool,
    pub level: EscalationLevel,
    pub escalation: Option<Escalation>,
    /// True when the pool could not satisfy the planned additions
    pub pool_exhausted: bool,
}

/// `actual / expected`; zero expected bids means nothing was owed yet, which
/// evaluates as ratio 0 and on-track
pub fn performance_ratio(actual_bids: i32, expected_bids: i32) -> f64 {
    if expected_bids <= 0 {
        0.0
    } else {
        f64::from(actual_bids) / f64::from(expected_bids)
    }
}

/// Pure ratio→level policy. Re-running with the same ratio always yields the
/// same level.
pub fn level_for_ratio(ratio: f64, thresholds: &EscalationThresholds) -> EscalationLevel {
    if ratio >= thresholds.none {
        EscalationLevel::None
    } else if ratio >= thresholds.mild {
        EscalationLevel::Mild
    } else if ratio >= thresholds.moderate {
        EscalationLevel::Moderate
    } else if ratio >= thresholds.severe {
        EscalationLevel::Severe
    } else {
        EscalationLevel::Critical
    }
}

/// Actions per level (spec'd policy; amounts are "up to", clamped later by
/// remaining per-campaign tier caps)
pub fn plan_for_level(level: EscalationLevel) -> EscalationPlan {
    match level {
        EscalationLevel::None => EscalationPlan::default(),
        EscalationLevel::Mild => EscalationPlan {
            tier3_additions: 2,
            ..EscalationPlan::default()
        },
        EscalationLevel::Moderate => EscalationPlan {
            tier23_additions: 4,
            raise_priority_to: Some(CampaignPriority::High),
            ..EscalationPlan::default()
        },
        EscalationLevel::Severe => EscalationPlan {
            tier1_additions: 4,
            tier23_additions: 4,
            raise_priority_to: Some(CampaignPriority::Urgent),
            mark_escalated: true,
            ..EscalationPlan::default()
        },
        EscalationLevel::Critical => EscalationPlan {
            tier1_additions: 4,
            tier23_additions: 4,
            raise_priority_to: Some(CampaignPriority::Urgent),
            mark_escalated: true,
            relax_filters: true,
            flag_human_review: true,
            ..EscalationPlan::default()
        },
    }
}

pub struct EscalationEngine {
    pool: PgPool,
    policy: PolicyConfig,
    contractor_pool: Arc<ContractorPool>,
    outreach_queue: Arc<OutreachQueue>,
    event_publisher: EventPublisher,
}

impl EscalationEngine {
    pub fn new(
        pool: PgPool,
        policy: PolicyConfig,
        contractor_pool: Arc<ContractorPool>,
        outreach_queue: Arc<OutreachQueue>,
        event_publisher: EventPublisher,
    ) -> Self {
        Self {
            pool,
            policy,
            contractor_pool,
            outreach_queue,
            event_publisher,
        }
    }

    /// Evaluate one due check-in for a campaign.
    ///
    /// Records the evaluation on the check-in row, back-fills success on any
    /// unresolved earlier escalations, and performs the escalation actions
    /// this moment's ratio calls for. The caller serializes evaluations per
    /// campaign.
    #[instrument(skip(self, campaign, check_in), fields(campaign_id = campaign.campaign_id, check_in_number = check_in.check_in_number))]
    pub async fn evaluate_check_in(
        &self,
        campaign: &Campaign,
        check_in: &CheckIn,
        actual_bids: i32,
    ) -> Result<CheckInEvaluation> {
        let ratio = performance_ratio(actual_bids, check_in.expected_bids);
        let (level, on_track) = if check_in.expected_bids <= 0 {
            (EscalationLevel::None, true)
        } else {
            let level = level_for_ratio(ratio, &self.policy.escalation_thresholds);
            (level, level == EscalationLevel::None)
        };

        let check_in = CheckIn::record_evaluation(
            &self.pool,
            check_in.check_in_id,
            actual_bids,
            ratio,
            on_track,
            level,
        )
        .await?;

        self.backfill_escalation_success(campaign.campaign_id, ratio)
            .await?;

        let mut escalation = None;
        let mut pool_exhausted = false;

        if level.requires_action() {
            let (created, exhausted) = self.escalate(campaign, &check_in, level, ratio).await?;
            escalation = Some(created);
            pool_exhausted = exhausted;
        }

        self.event_publisher
            .publish(
                system_events::CHECK_IN_EVALUATED,
                json!({
                    "campaign_id": campaign.campaign_id,
                    "check_in_number": check_in.check_in_number,
                    "performance_ratio": ratio,
                    "level": level.to_string(),
                }),
            )
            .await;

        Ok(CheckInEvaluation {
            check_in,
            performance_ratio: ratio,
            on_track,
            level,
            escalation,
            pool_exhausted,
        })
    }

    /// Mark open escalations successful or not based on the latest ratio.
    /// Improvement relative to trend means the new ratio beats the one that
    /// triggered the escalation.
    async fn backfill_escalation_success(&self, campaign_id: i64, current_ratio: f64) -> Result<()> {
        let unresolved = Escalation::unresolved_for_campaign(&self.pool, campaign_id).await?;
        for open in unresolved {
            let improved = current_ratio > open.performance_ratio;
            debug!(
                campaign_id,
                escalation_id = open.escalation_id,
                triggering_ratio = open.performance_ratio,
                current_ratio,
                improved,
                "Back-filling escalation success"
            );
            Escalation::resolve(&self.pool, open.escalation_id, improved).await?;
        }
        Ok(())
    }

    async fn escalate(
        &self,
        campaign: &Campaign,
        check_in: &CheckIn,
        level: EscalationLevel,
        ratio: f64,
    ) -> Result<(Escalation, bool)> {
        let plan = plan_for_level(level);

        // Raise priority before enqueueing so the new items carry it
        let campaign = if plan.raise_priority_to.is_some() || plan.mark_escalated {
            Campaign::escalate(
                &self.pool,
                campaign.campaign_id,
                plan.raise_priority_to.unwrap_or_else(|| campaign.current_priority()),
                plan.mark_escalated,
            )
            .await?
        } else {
            campaign.clone()
        };

        let (added, pool_exhausted) = self.execute_additions(&campaign, &plan).await?;

        let escalation = Escalation::create(
            &self.pool,
            NewEscalation {
                campaign_id: campaign.campaign_id,
                check_in_id: check_in.check_in_id,
                escalation_level: level,
                performance_ratio: ratio,
                contractors_added_tier1: added.0,
                contractors_added_tier2: added.1,
                contractors_added_tier3: added.2,
                priority_raised_to: plan.raise_priority_to,
                filters_relaxed: plan.relax_filters,
                human_review_flagged: plan.flag_human_review,
            },
        )
        .await?;

        info!(
            campaign_id = campaign.campaign_id,
            level = %level,
            ratio,
            added_tier1 = added.0,
            added_tier2 = added.1,
            added_tier3 = added.2,
            pool_exhausted,
            "Escalation executed"
        );

        self.event_publisher
            .publish(
                system_events::ESCALATION_TRIGGERED,
                json!({
                    "campaign_id": campaign.campaign_id,
                    "escalation_id": escalation.escalation_id,
                    "level": level.to_string(),
                    "performance_ratio": ratio,
                    "contractors_added": escalation.total_contractors_added(),
                }),
            )
            .await;

        if plan.flag_human_review {
            warn!(
                campaign_id = campaign.campaign_id,
                ratio, "Critical escalation, flagging for human review"
            );
            self.event_publisher
                .publish(
                    system_events::ESCALATION_HUMAN_REVIEW,
                    json!({
                        "campaign_id": campaign.campaign_id,
                        "escalation_id": escalation.escalation_id,
                        "performance_ratio": ratio,
                    }),
                )
                .await;
        }

        Ok((escalation, pool_exhausted))
    }

    /// Select and enqueue the planned additions, respecting remaining
    /// per-campaign tier caps. Returns contractors actually enqueued per tier
    /// and whether the pool came up short anywhere.
    async fn execute_additions(
        &self,
        campaign: &Campaign,
        plan: &EscalationPlan,
    ) -> Result<((i32, i32, i32), bool)> {
        if plan.is_empty() {
            return Ok(((0, 0, 0), false));
        }

        let caps = &self.policy.tier_caps;
        let current = OutreachQueueItem::tier_counts(&self.pool, campaign.campaign_id).await?;
        let remaining = TierRequest {
            tier1: caps.tier1.saturating_sub(current.tier1 as usize),
            tier2: caps.tier2.saturating_sub(current.tier2 as usize),
            tier3: caps.tier3.saturating_sub(current.tier3 as usize),
        };

        let filters = filters_for_campaign(campaign, plan.relax_filters);
        let mut added = (0i32, 0i32, 0i32);
        let mut pool_exhausted = false;

        // Tier 1 additions
        let want1 = plan.tier1_additions.min(remaining.tier1);
        if want1 > 0 {
            let (count, exhausted) = self
                .select_and_enqueue(campaign, ContractorTier::Tier1, want1, &filters)
                .await?;
            added.0 += count;
            pool_exhausted |= exhausted;
        }

        // Tier 2/3 combined additions, tier 2 first, shortfall to tier 3
        let want23 = plan.tier23_additions;
        if want23 > 0 {
            let want2 = want23.min(remaining.tier2);
            let (count2, _) = self
                .select_and_enqueue(campaign, ContractorTier::Tier2, want2, &filters)
                .await?;
            added.1 += count2;

            let shortfall = want23.saturating_sub(count2 as usize).min(remaining.tier3);
            if shortfall > 0 {
                let (count3, exhausted) = self
                    .select_and_enqueue(campaign, ContractorTier::Tier3, shortfall, &filters)
                    .await?;
                added.2 += count3;
                pool_exhausted |= exhausted;
            }
        }

        // Tier-3-only additions (mild)
        let want3 = plan.tier3_additions.min(remaining.tier3);
        if want3 > 0 {
            let (count, exhausted) = self
                .select_and_enqueue(campaign, ContractorTier::Tier3, want3, &filters)
                .await?;
            added.2 += count;
            pool_exhausted |= exhausted;
        }

        Ok((added, pool_exhausted))
    }

    async fn select_and_enqueue(
        &self,
        campaign: &Campaign,
        tier: ContractorTier,
        wanted: usize,
        filters: &crate::orchestration::contractor_pool::SelectionFilters,
    ) -> Result<(i32, bool)> {
        let mut request = TierRequest::default();
        match tier {
            ContractorTier::Tier1 => request.tier1 = wanted,
            ContractorTier::Tier2 => request.tier2 = wanted,
            ContractorTier::Tier3 => request.tier3 = wanted,
        }

        let caps = &self.policy.contact_caps;
        let selection = self
            .contractor_pool
            .select_contractors(
                campaign.bid_card_id,
                request,
                filters,
                caps.max_per_week,
                caps.max_per_month,
            )
            .await?;

        let mut enqueued = 0i32;
        for contractor in &selection.contractors {
            let outcome = self
                .outreach_queue
                .enqueue(NewOutreachItem {
                    campaign_id: campaign.campaign_id,
                    contractor_id: contractor.contractor_id,
                    bid_card_id: campaign.bid_card_id,
                    channel: OutreachChannel::Email,
                    priority: campaign.current_priority(),
                    max_retries: crate::constants::dispatch::MAX_RETRIES,
                })
                .await?;
            if outcome.is_enqueued() {
                enqueued += 1;
            }
        }

        let exhausted = selection.partial || (enqueued as usize) < wanted;
        Ok((enqueued, exhausted))
    }
}
