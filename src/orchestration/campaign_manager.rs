//! # Campaign Manager
//!
//! Top-level orchestrator for outreach campaigns: creation with a
//! pre-computed check-in schedule, initial tier selection and enqueue, the
//! bid-submission entry point, the due-check-in evaluation driver, and the
//! operator-facing status surface.
//!
//! ## Concurrency
//!
//! Check-ins for different campaigns may be evaluated concurrently, but
//! evaluation within one campaign is serialized through a per-campaign async
//! mutex: escalation decisions and tier-cap math are not idempotent under
//! interleaving. The contact ledger guards the one resource shared across
//! campaigns.

use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::OutreachConfig;
use crate::constants::events as system_events;
use crate::constants::ContractorTier;
use crate::error::{OutreachError, Result};
use crate::events::publisher::EventPublisher;
use crate::models::{
    Campaign, CampaignStrategy, CheckIn, Escalation, NewCampaign, NewOutreachItem, OutreachChannel,
    OutreachQueueItem,
};
use crate::orchestration::check_in_scheduler::{split_stale, CheckInScheduler};
use crate::orchestration::contractor_pool::{filters_for_campaign, ContractorPool, TierRequest};
use crate::orchestration::escalation_engine::{CheckInEvaluation, EscalationEngine};
use crate::orchestration::outreach_queue::OutreachQueue;
use crate::orchestration::response_tracker::ResponseTracker;
use crate::state_machine::states::{CampaignState, PerformanceStatus};
use crate::state_machine::{CampaignEvent, CampaignStateMachine};

/// Outcome of a bid-submission report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidRecording {
    Recorded,
    /// Idempotency guard: this contractor already has a bid on this campaign
    Duplicate,
}

/// Outcome of a completion attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Target met within the timeline
    Completed { final_bid_count: i32 },
    /// Deadline passed below target; reported, not an error
    DeadlineCompleted { final_bid_count: i32 },
    /// Neither target met nor deadline passed yet
    NotDue,
}

/// Operator-facing status for dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStatusSummary {
    pub campaign_id: i64,
    pub performance_status: PerformanceStatus,
    pub contacted: i32,
    pub responded: i32,
    pub bids_submitted: i32,
    pub projected_final_bids: i32,
    pub escalation_count: usize,
}

pub struct CampaignManager {
    pool: PgPool,
    config: OutreachConfig,
    contractor_pool: Arc<ContractorPool>,
    outreach_queue: Arc<OutreachQueue>,
    scheduler: CheckInScheduler,
    tracker: ResponseTracker,
    escalation_engine: EscalationEngine,
    event_publisher: EventPublisher,
    evaluation_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl CampaignManager {
    pub fn new(pool: PgPool, config: OutreachConfig) -> Self {
        let event_publisher = EventPublisher::new(config.events.channel_capacity);
        Self::with_event_publisher(pool, config, event_publisher)
    }

    pub fn with_event_publisher(
        pool: PgPool,
        config: OutreachConfig,
        event_publisher: EventPublisher,
    ) -> Self {
        let contractor_pool = Arc::new(ContractorPool::new(pool.clone()));
        let outreach_queue = Arc::new(OutreachQueue::new(
            pool.clone(),
            config.dispatch.clone(),
            config.policy.contact_caps.clone(),
            event_publisher.clone(),
        ));
        let scheduler =
            CheckInScheduler::new(pool.clone(), config.policy.check_in_percentages.clone());
        let tracker = ResponseTracker::new(pool.clone(), config.policy.projection_max_multiple);
        let escalation_engine = EscalationEngine::new(
            pool.clone(),
            config.policy.clone(),
            contractor_pool.clone(),
            outreach_queue.clone(),
            event_publisher.clone(),
        );

        Self {
            pool,
            config,
            contractor_pool,
            outreach_queue,
            scheduler,
            tracker,
            escalation_engine,
            event_publisher,
            evaluation_locks: DashMap::new(),
        }
    }

    /// The queue surface for the external dispatch collaborator
    pub fn outreach_queue(&self) -> &OutreachQueue {
        &self.outreach_queue
    }

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    /// Create a campaign with its full check-in schedule, in `scheduled`
    /// status. The only hard-failure path: invalid strategies are rejected
    /// immediately and never retried.
    #[instrument(skip(self, new_campaign), fields(bid_card_id = new_campaign.bid_card_id))]
    pub async fn create_campaign(&self, new_campaign: NewCampaign) -> Result<Campaign> {
        let campaign = Campaign::create(&self.pool, new_campaign).await?;

        // Schedule is anchored at creation; pausing never shifts it
        self.scheduler
            .build_schedule(&campaign, campaign.created_at)
            .await?;

        let mut sm =
            CampaignStateMachine::new(campaign, self.pool.clone(), self.event_publisher.clone());
        sm.transition(CampaignEvent::Schedule).await?;
        let campaign = sm.campaign().clone();

        info!(
            campaign_id = campaign.campaign_id,
            bid_card_id = campaign.bid_card_id,
            bids_needed = campaign.bids_needed,
            timeline_hours = campaign.timeline_hours,
            "Campaign created and scheduled"
        );

        Ok(campaign)
    }

    /// Transition `scheduled → running` and enqueue the initial outreach,
    /// sized by the strategy's confidence and the tier response priors.
    #[instrument(skip(self))]
    pub async fn start_campaign(&self, campaign_id: i64) -> Result<Campaign> {
        let campaign = self.require_campaign(campaign_id).await?;

        if campaign.state()? == CampaignState::Running {
            return Err(OutreachError::AlreadyRunning { campaign_id });
        }

        let mut sm =
            CampaignStateMachine::new(campaign, self.pool.clone(), self.event_publisher.clone());
        sm.transition(CampaignEvent::Start).await?;
        let campaign = sm.campaign().clone();

        let request = initial_tier_request(&campaign.strategy(), &self.config.policy.tier_caps);
        let filters = filters_for_campaign(&campaign, false);
        let caps = &self.config.policy.contact_caps;

        let selection = self
            .contractor_pool
            .select_contractors(
                campaign.bid_card_id,
                request,
                &filters,
                caps.max_per_week,
                caps.max_per_month,
            )
            .await?;

        let mut enqueued = 0usize;
        for contractor in &selection.contractors {
            let outcome = self
                .outreach_queue
                .enqueue(NewOutreachItem {
                    campaign_id: campaign.campaign_id,
                    contractor_id: contractor.contractor_id,
                    bid_card_id: campaign.bid_card_id,
                    channel: OutreachChannel::Email,
                    priority: campaign.current_priority(),
                    max_retries: self.config.dispatch.max_retries,
                })
                .await?;
            if outcome.is_enqueued() {
                enqueued += 1;
            }
        }

        info!(
            campaign_id,
            requested = request.total(),
            selected = selection.contractors.len(),
            enqueued,
            partial = selection.partial,
            "Campaign started with initial outreach"
        );

        Ok(campaign)
    }

    /// Entry point for the external bid-collection collaborator. Idempotent
    /// per (campaign, contractor); the duplicate case is a non-fatal signal.
    #[instrument(skip(self))]
    pub async fn record_bid_submitted(
        &self,
        campaign_id: i64,
        contractor_id: i64,
    ) -> Result<BidRecording> {
        let campaign = self.require_campaign(campaign_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO campaign_bids (campaign_id, contractor_id, submitted_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (campaign_id, contractor_id) DO NOTHING
            "#,
        )
        .bind(campaign_id)
        .bind(contractor_id)
        .execute(&self.pool)
        .await
        .map_err(|e| OutreachError::database("record_bid_submitted", e))?;

        if result.rows_affected() == 0 {
            debug!(campaign_id, contractor_id, "Duplicate bid ignored");
            self.event_publisher
                .publish(
                    system_events::BID_DUPLICATE,
                    json!({ "campaign_id": campaign_id, "contractor_id": contractor_id }),
                )
                .await;
            return Ok(BidRecording::Duplicate);
        }

        self.event_publisher
            .publish(
                system_events::BID_SUBMITTED,
                json!({ "campaign_id": campaign_id, "contractor_id": contractor_id }),
            )
            .await;

        // Completion is opportunistic here; the check-in driver also checks
        if campaign.state()? == CampaignState::Running {
            self.complete_campaign(campaign_id).await?;
        }

        Ok(BidRecording::Recorded)
    }

    /// Complete the campaign once the target is met or the deadline has
    /// passed. Below-target completion at the deadline is reported as
    /// deadline-completed, never as an error.
    #[instrument(skip(self))]
    pub async fn complete_campaign(&self, campaign_id: i64) -> Result<CompletionOutcome> {
        let campaign = self.require_campaign(campaign_id).await?;
        if campaign.state()? != CampaignState::Running {
            return Ok(CompletionOutcome::NotDue);
        }

        let now = chrono::Utc::now().naive_utc();
        let bids = self.tracker.current_bid_count(campaign_id).await?;
        let target_met = bids >= campaign.bids_needed;
        let deadline_passed = campaign.deadline_passed(now);

        if !target_met && !deadline_passed {
            return Ok(CompletionOutcome::NotDue);
        }

        Campaign::set_final_bid_count(&self.pool, campaign_id, bids).await?;

        let mut sm =
            CampaignStateMachine::new(campaign, self.pool.clone(), self.event_publisher.clone());
        match sm
            .transition(CampaignEvent::Complete {
                deadline_passed: !target_met,
            })
            .await
        {
            Ok(_) => {}
            // Lost the status compare-and-swap: someone else already closed
            // the campaign out
            Err(OutreachError::InvalidTransition { .. }) => {
                return Ok(CompletionOutcome::NotDue)
            }
            Err(e) => return Err(e),
        }

        let cancelled = OutreachQueueItem::cancel_pending_for_campaign(&self.pool, campaign_id).await?;
        self.evaluation_locks.remove(&campaign_id);

        info!(
            campaign_id,
            final_bid_count = bids,
            target_met,
            pending_cancelled = cancelled,
            "Campaign completed"
        );

        if target_met {
            Ok(CompletionOutcome::Completed {
                final_bid_count: bids,
            })
        } else {
            Ok(CompletionOutcome::DeadlineCompleted {
                final_bid_count: bids,
            })
        }
    }

    /// Pause a running campaign. Due check-ins are skipped while paused; the
    /// deadline stays where it was.
    pub async fn pause_campaign(&self, campaign_id: i64) -> Result<Campaign> {
        self.transition(campaign_id, CampaignEvent::Pause).await
    }

    /// Resume a paused campaign against its original deadline
    pub async fn resume_campaign(&self, campaign_id: i64) -> Result<Campaign> {
        self.transition(campaign_id, CampaignEvent::Resume).await
    }

    /// Cancel a campaign and its still-pending outreach
    pub async fn cancel_campaign(&self, campaign_id: i64) -> Result<Campaign> {
        let campaign = self.transition(campaign_id, CampaignEvent::Cancel).await?;
        OutreachQueueItem::cancel_pending_for_campaign(&self.pool, campaign_id).await?;
        // Terminal campaigns never evaluate again; drop their lock entry
        self.evaluation_locks.remove(&campaign_id);
        Ok(campaign)
    }

    /// Evaluate all due check-ins as of `now`.
    ///
    /// Campaigns are processed independently; within a campaign only the most
    /// recent due check-in is evaluated and earlier ones are marked skipped,
    /// so a lagging evaluation loop never escalates twice for one staleness
    /// window. Paused or completed campaigns are skipped entirely.
    #[instrument(skip(self))]
    pub async fn process_due_check_ins(&self, now: NaiveDateTime) -> Result<Vec<CheckInEvaluation>> {
        let due = self.scheduler.due_check_ins(now).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_campaign: std::collections::BTreeMap<i64, Vec<CheckIn>> =
            std::collections::BTreeMap::new();
        for check_in in due {
            by_campaign.entry(check_in.campaign_id).or_default().push(check_in);
        }

        // Campaigns evaluate concurrently; the per-campaign mutex inside
        // evaluate_campaign_check_ins serializes within each one
        let results = futures::future::join_all(
            by_campaign
                .into_iter()
                .map(|(campaign_id, check_ins)| self.evaluate_campaign_check_ins(campaign_id, check_ins)),
        )
        .await;

        let mut evaluations = Vec::new();
        for result in results {
            if let Some(evaluation) = result? {
                evaluations.push(evaluation);
            }
        }

        Ok(evaluations)
    }

    async fn evaluate_campaign_check_ins(
        &self,
        campaign_id: i64,
        check_ins: Vec<CheckIn>,
    ) -> Result<Option<CheckInEvaluation>> {
        // Serialize evaluation within one campaign
        let lock = self
            .evaluation_locks
            .entry(campaign_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-read under the lock; the campaign may have been paused,
        // cancelled or completed since due-detection
        let campaign = self.require_campaign(campaign_id).await?;
        if !campaign.state()?.is_active() {
            debug!(
                campaign_id,
                status = %campaign.status,
                "Skipping due check-ins for inactive campaign"
            );
            return Ok(None);
        }

        let Some((latest, stale)) = split_stale(check_ins) else {
            return Ok(None);
        };

        for stale_check_in in stale {
            warn!(
                campaign_id,
                check_in_number = stale_check_in.check_in_number,
                "Skipping stale check-in"
            );
            CheckIn::mark_skipped(&self.pool, stale_check_in.check_in_id).await?;
            self.event_publisher
                .publish(
                    system_events::CHECK_IN_SKIPPED,
                    json!({
                        "campaign_id": campaign_id,
                        "check_in_number": stale_check_in.check_in_number,
                    }),
                )
                .await;
        }

        // Snapshot first so the evaluation works from freshly captured data
        let snapshot = self.tracker.snapshot(&campaign).await?;
        let evaluation = self
            .escalation_engine
            .evaluate_check_in(&campaign, &latest, snapshot.bids_submitted)
            .await?;

        // The final check-in or a passed deadline closes the campaign out
        let now = chrono::Utc::now().naive_utc();
        if evaluation.check_in.check_in_percentage >= 100 || campaign.deadline_passed(now) {
            self.complete_campaign(campaign_id).await?;
        }

        Ok(Some(evaluation))
    }

    /// Status surface for dashboards: performance status plus the headline
    /// counts and projection
    pub async fn campaign_status(&self, campaign_id: i64) -> Result<CampaignStatusSummary> {
        let campaign = self.require_campaign(campaign_id).await?;
        let now = chrono::Utc::now().naive_utc();

        let snapshot = self.tracker.snapshot(&campaign).await?;
        let projected = self.tracker.project_final_bids(&campaign, now).await?;
        let escalations = Escalation::for_campaign(&self.pool, campaign_id).await?;
        let check_ins = CheckIn::for_campaign(&self.pool, campaign_id).await?;

        let performance_status =
            determine_performance_status(&campaign, snapshot.bids_submitted, &escalations, &check_ins);

        Ok(CampaignStatusSummary {
            campaign_id,
            performance_status,
            contacted: snapshot.contacted,
            responded: snapshot.responded,
            bids_submitted: snapshot.bids_submitted,
            projected_final_bids: projected,
            escalation_count: escalations.len(),
        })
    }

    /// Escalation history for audit/reporting UIs
    pub async fn escalation_history(&self, campaign_id: i64) -> Result<Vec<Escalation>> {
        Escalation::for_campaign(&self.pool, campaign_id).await
    }

    async fn transition(&self, campaign_id: i64, event: CampaignEvent) -> Result<Campaign> {
        let campaign = self.require_campaign(campaign_id).await?;
        let mut sm =
            CampaignStateMachine::new(campaign, self.pool.clone(), self.event_publisher.clone());
        sm.transition(event).await?;
        Ok(sm.campaign().clone())
    }

    async fn require_campaign(&self, campaign_id: i64) -> Result<Campaign> {
        Campaign::find_by_id(&self.pool, campaign_id)
            .await?
            .ok_or(OutreachError::CampaignNotFound { campaign_id })
    }
}

/// Size the initial selection from the strategy: contact enough contractors,
/// tier 1 first, that the tier response priors predict the needed bids, with
/// lower confidence contacting proportionally more. Clamped to tier caps.
pub fn initial_tier_request(
    strategy: &CampaignStrategy,
    caps: &crate::config::TierCaps,
) -> TierRequest {
    let confidence = strategy.confidence_score.clamp(0.1, 1.0);
    let needed = f64::from(strategy.bids_needed.max(strategy.expected_responses)) / confidence;

    let mut request = TierRequest::default();
    let mut expected = 0.0;

    for tier in ContractorTier::all() {
        let cap = caps.for_tier(tier);
        let mut count = 0usize;
        while count < cap && expected < needed {
            count += 1;
            expected += tier.response_prior();
        }
        match tier {
            ContractorTier::Tier1 => request.tier1 = count,
            ContractorTier::Tier2 => request.tier2 = count,
            ContractorTier::Tier3 => request.tier3 = count,
        }
    }

    request
}

/// Pure status policy, separated for testability. Success beats everything;
/// an escalation pass that could add nobody marks the campaign at risk for
/// human attention even when the escalated flag is set.
pub fn determine_performance_status(
    campaign: &Campaign,
    bids_submitted: i32,
    escalations: &[Escalation],
    check_ins: &[CheckIn],
) -> PerformanceStatus {
    if bids_submitted >= campaign.bids_needed {
        return PerformanceStatus::Success;
    }

    if let Some(last) = escalations.last() {
        if last.total_contractors_added() == 0 {
            return PerformanceStatus::AtRisk;
        }
    }

    if campaign.escalated {
        return PerformanceStatus::Escalated;
    }

    let last_evaluated = check_ins
        .iter()
        .rev()
        .find(|ci| ci.completed_at.is_some() && !ci.skipped);
    if let Some(check_in) = last_evaluated {
        if check_in.on_track == Some(false) {
            return PerformanceStatus::AtRisk;
        }
    }

    PerformanceStatus::OnTrack
}
