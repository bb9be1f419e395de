//! # Campaign State Machine
//!
//! Validates and persists campaign lifecycle transitions. The transition table
//! is the single place that knows which lifecycle moves are legal; callers
//! (CampaignManager, external pause/cancel surfaces) go through `transition`
//! rather than writing the status column directly.

use super::events::CampaignEvent;
use super::states::CampaignState;
use crate::constants::events as system_events;
use crate::error::{OutreachError, Result};
use crate::events::publisher::EventPublisher;
use crate::models::Campaign;
use serde_json::json;
use sqlx::PgPool;
use tracing::debug;

pub struct CampaignStateMachine {
    campaign: Campaign,
    pool: PgPool,
    event_publisher: EventPublisher,
}

impl CampaignStateMachine {
    pub fn new(campaign: Campaign, pool: PgPool, event_publisher: EventPublisher) -> Self {
        Self {
            campaign,
            pool,
            event_publisher,
        }
    }

    /// Get the current state of the campaign
    pub fn current_state(&self) -> Result<CampaignState> {
        self.campaign.state()
    }

    /// Attempt to transition the campaign, persisting the new status
    pub async fn transition(&mut self, event: CampaignEvent) -> Result<CampaignState> {
        let current_state = self.current_state()?;
        let target_state = Self::determine_target_state(current_state, &event)?;

        debug!(
            campaign_id = self.campaign.campaign_id,
            from = %current_state,
            to = %target_state,
            event = event.name(),
            "Campaign state transition"
        );

        // The write compares-and-swaps on the status we read; losing the race
        // to a concurrent transition is an invalid transition, not a retry
        self.campaign = Campaign::update_status(
            &self.pool,
            self.campaign.campaign_id,
            current_state,
            target_state,
        )
        .await?
        .ok_or_else(|| OutreachError::InvalidTransition {
            from: current_state.to_string(),
            event: event.name().to_string(),
        })?;

        let event_name = match &event {
            CampaignEvent::Start => system_events::CAMPAIGN_STARTED,
            CampaignEvent::Pause => system_events::CAMPAIGN_PAUSED,
            CampaignEvent::Resume => system_events::CAMPAIGN_RESUMED,
            CampaignEvent::Complete { .. } => system_events::CAMPAIGN_COMPLETED,
            CampaignEvent::Cancel => system_events::CAMPAIGN_CANCELLED,
            CampaignEvent::Schedule => system_events::CAMPAIGN_CREATED,
        };
        self.event_publisher
            .publish(
                event_name,
                json!({
                    "campaign_id": self.campaign.campaign_id,
                    "from_state": current_state.to_string(),
                    "to_state": target_state.to_string(),
                }),
            )
            .await;

        Ok(target_state)
    }

    /// Determine the target state based on current state and event
    pub fn determine_target_state(
        current_state: CampaignState,
        event: &CampaignEvent,
    ) -> Result<CampaignState> {
        let target = match (current_state, event) {
            (CampaignState::Draft, CampaignEvent::Schedule) => CampaignState::Scheduled,
            (CampaignState::Scheduled, CampaignEvent::Start) => CampaignState::Running,

            (CampaignState::Running, CampaignEvent::Pause) => CampaignState::Paused,
            (CampaignState::Paused, CampaignEvent::Resume) => CampaignState::Running,

            (CampaignState::Running, CampaignEvent::Complete { .. }) => CampaignState::Completed,

            // Cancellation is allowed from any non-terminal state
            (state, CampaignEvent::Cancel) if !state.is_terminal() => CampaignState::Cancelled,

            (from_state, event) => {
                return Err(OutreachError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.name().to_string(),
                })
            }
        };

        Ok(target)
    }

    pub fn campaign(&self) -> &Campaign {
        &self.campaign
    }

    pub fn campaign_id(&self) -> i64 {
        self.campaign.campaign_id
    }
}
