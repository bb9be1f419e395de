//! # Outreach Queue
//!
//! Durable, priority-ordered queue of outreach work awaiting dispatch. The
//! engine only enqueues; the external dispatch collaborator drains batches and
//! reports outcomes back. Contact caps are validated again at enqueue time as
//! a second line against races with the pool's earlier check, and failed
//! deliveries are retried with exponential backoff until `max_retries`.

use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use crate::config::{ContactCaps, DispatchConfig};
use crate::constants::events as system_events;
use crate::error::Result;
use crate::events::publisher::EventPublisher;
use crate::models::{NewOutreachItem, OutreachQueueItem};
use crate::orchestration::contact_ledger::ContactLedger;
use crate::state_machine::states::OutreachItemState;

/// Outcome of an enqueue attempt; none of these are errors
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// Item queued for dispatch
    Enqueued(OutreachQueueItem),
    /// This contractor already has an item for this bid card
    DuplicateSuppressed,
    /// Contractor is at a weekly/monthly contact cap
    CapExceeded,
}

impl EnqueueOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued(_))
    }
}

/// Delivery outcome reported by the dispatch collaborator
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Sent,
    Failed { error: String },
}

/// What happened to an item after an outcome report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeDisposition {
    Sent,
    RetryScheduled { retry_count: i32 },
    RetriesExhausted,
}

pub struct OutreachQueue {
    pool: PgPool,
    dispatch: DispatchConfig,
    ledger: ContactLedger,
    event_publisher: EventPublisher,
}

impl OutreachQueue {
    pub fn new(
        pool: PgPool,
        dispatch: DispatchConfig,
        contact_caps: ContactCaps,
        event_publisher: EventPublisher,
    ) -> Self {
        let ledger = ContactLedger::new(pool.clone(), contact_caps);
        Self {
            pool,
            dispatch,
            ledger,
            event_publisher,
        }
    }

    pub fn ledger(&self) -> &ContactLedger {
        &self.ledger
    }

    /// Enqueue one outreach item, atomically reserving a contact-cap slot.
    ///
    /// The slot is reserved before the insert; if the insert turns out to be
    /// a duplicate for this bid card the reservation is released again, since
    /// no contact will actually happen.
    #[instrument(skip(self, new_item), fields(campaign_id = new_item.campaign_id, contractor_id = new_item.contractor_id))]
    pub async fn enqueue(&self, new_item: NewOutreachItem) -> Result<EnqueueOutcome> {
        let contractor_id = new_item.contractor_id;
        let campaign_id = new_item.campaign_id;

        if !self.ledger.try_reserve(contractor_id, campaign_id).await? {
            debug!(contractor_id, "Enqueue refused: contact cap reached");
            return Ok(EnqueueOutcome::CapExceeded);
        }

        match OutreachQueueItem::create(&self.pool, new_item).await? {
            Some(item) => {
                self.event_publisher
                    .publish(
                        system_events::OUTREACH_ENQUEUED,
                        json!({
                            "campaign_id": campaign_id,
                            "contractor_id": contractor_id,
                            "outreach_item_id": item.outreach_item_id,
                            "priority": item.priority,
                        }),
                    )
                    .await;
                Ok(EnqueueOutcome::Enqueued(item))
            }
            None => {
                self.ledger.release_last(contractor_id, campaign_id).await?;
                debug!(contractor_id, "Enqueue suppressed: duplicate for bid card");
                Ok(EnqueueOutcome::DuplicateSuppressed)
            }
        }
    }

    /// Claim the next batch for the dispatch collaborator, marking items
    /// `sending`. Ordering is priority-descending, FIFO within a priority.
    #[instrument(skip(self))]
    pub async fn dequeue(&self, batch_size: i64) -> Result<Vec<OutreachQueueItem>> {
        let batch = batch_size.min(self.dispatch.batch_size);
        let items = OutreachQueueItem::claim_batch(&self.pool, batch).await?;

        if !items.is_empty() {
            debug!(claimed = items.len(), "Dispatch batch claimed");
        }
        Ok(items)
    }

    /// Record a delivery outcome from the dispatch collaborator.
    ///
    /// Failures are retried with exponential backoff; once retries are
    /// exhausted the item is terminally `failed`, which is a delivery gap but
    /// never a campaign error (the contact-cap slot stays consumed).
    #[instrument(skip(self, outcome))]
    pub async fn report_outcome(
        &self,
        outreach_item_id: i64,
        outcome: DispatchOutcome,
    ) -> Result<OutcomeDisposition> {
        match outcome {
            DispatchOutcome::Sent => {
                OutreachQueueItem::mark_sent(&self.pool, outreach_item_id).await?;
                Ok(OutcomeDisposition::Sent)
            }
            DispatchOutcome::Failed { error } => {
                let current = OutreachQueueItem::find_by_id(&self.pool, outreach_item_id)
                    .await?
                    .ok_or_else(|| crate::error::OutreachError::Database {
                        operation: "report_outcome".to_string(),
                        message: format!("outreach item {outreach_item_id} not found"),
                    })?;
                let backoff = self.dispatch.backoff_secs(current.retry_count) as i64;

                let item =
                    OutreachQueueItem::record_failure(&self.pool, outreach_item_id, &error, backoff)
                        .await?;

                if item.state() == OutreachItemState::Failed {
                    warn!(
                        outreach_item_id,
                        retry_count = item.retry_count,
                        "Outreach item failed terminally"
                    );
                    self.event_publisher
                        .publish(
                            system_events::OUTREACH_RETRIES_EXHAUSTED,
                            json!({
                                "campaign_id": item.campaign_id,
                                "outreach_item_id": outreach_item_id,
                                "error": error,
                            }),
                        )
                        .await;
                    Ok(OutcomeDisposition::RetriesExhausted)
                } else {
                    info!(
                        outreach_item_id,
                        retry_count = item.retry_count,
                        backoff_secs = backoff,
                        "Outreach item re-enqueued after failure"
                    );
                    self.event_publisher
                        .publish(
                            system_events::OUTREACH_DISPATCH_FAILED,
                            json!({
                                "campaign_id": item.campaign_id,
                                "outreach_item_id": outreach_item_id,
                                "retry_count": item.retry_count,
                            }),
                        )
                        .await;
                    Ok(OutcomeDisposition::RetryScheduled {
                        retry_count: item.retry_count,
                    })
                }
            }
        }
    }
}
