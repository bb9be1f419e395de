//! # Outreach Queue Item Model
//!
//! One unit of pending contact work: one contractor, one channel, one
//! campaign. Created when contractors are selected; the dispatch collaborator
//! drives items through `pending → sending → sent|failed`. A UNIQUE
//! constraint on (contractor, bid card) enforces the no-duplicate-send policy
//! at the storage layer.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::error::{OutreachError, Result};
use crate::state_machine::states::{CampaignPriority, OutreachItemState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OutreachQueueItem {
    pub outreach_item_id: i64,
    pub campaign_id: i64,
    pub contractor_id: i64,
    pub bid_card_id: i64,
    pub channel: String,
    pub priority: String,
    pub status: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub scheduled_at: NaiveDateTime,
    pub last_error: Option<String>,
    pub sent_at: Option<NaiveDateTime>,
    pub opened_at: Option<NaiveDateTime>,
    pub clicked_at: Option<NaiveDateTime>,
    pub responded_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Outreach channels supported by the dispatch collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachChannel {
    Email,
    Sms,
}

impl OutreachChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOutreachItem {
    pub campaign_id: i64,
    pub contractor_id: i64,
    pub bid_card_id: i64,
    pub channel: OutreachChannel,
    pub priority: CampaignPriority,
    pub max_retries: i32,
}

impl OutreachQueueItem {
    /// Insert a new pending item. Returns `None` when the (contractor, bid
    /// card) pair already has an item, the no-duplicate-send case.
    pub async fn create(
        pool: &PgPool,
        new_item: NewOutreachItem,
    ) -> Result<Option<OutreachQueueItem>> {
        let item = sqlx::query_as::<_, OutreachQueueItem>(
            r#"
            INSERT INTO outreach_queue_items (
                campaign_id, contractor_id, bid_card_id, channel, priority,
                status, max_retries, scheduled_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, NOW(), NOW(), NOW())
            ON CONFLICT (contractor_id, bid_card_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new_item.campaign_id)
        .bind(new_item.contractor_id)
        .bind(new_item.bid_card_id)
        .bind(new_item.channel.as_str())
        .bind(new_item.priority.to_string())
        .bind(new_item.max_retries)
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item create", e))?;

        Ok(item)
    }

    pub async fn find_by_id(pool: &PgPool, outreach_item_id: i64) -> Result<Option<OutreachQueueItem>> {
        let item = sqlx::query_as::<_, OutreachQueueItem>(
            "SELECT * FROM outreach_queue_items WHERE outreach_item_id = $1",
        )
        .bind(outreach_item_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item find_by_id", e))?;

        Ok(item)
    }

    pub async fn for_campaign(pool: &PgPool, campaign_id: i64) -> Result<Vec<OutreachQueueItem>> {
        let items = sqlx::query_as::<_, OutreachQueueItem>(
            "SELECT * FROM outreach_queue_items WHERE campaign_id = $1 ORDER BY outreach_item_id",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item for_campaign", e))?;

        Ok(items)
    }

    /// Claim the next batch for dispatch: priority weight descending, FIFO
    /// within a priority, only items whose scheduled time has arrived. Marks
    /// the claimed rows `sending` atomically.
    pub async fn claim_batch(pool: &PgPool, batch_size: i64) -> Result<Vec<OutreachQueueItem>> {
        let items = sqlx::query_as::<_, OutreachQueueItem>(
            r#"
            UPDATE outreach_queue_items
            SET status = 'sending', updated_at = NOW()
            WHERE outreach_item_id IN (
                SELECT outreach_item_id FROM outreach_queue_items
                WHERE status = 'pending' AND scheduled_at <= NOW()
                ORDER BY ARRAY_POSITION(ARRAY['low','normal','high','urgent'], priority) DESC,
                         outreach_item_id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(batch_size)
        .fetch_all(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item claim_batch", e))?;

        Ok(items)
    }

    pub async fn mark_sent(pool: &PgPool, outreach_item_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outreach_queue_items
            SET status = 'sent', sent_at = NOW(), updated_at = NOW()
            WHERE outreach_item_id = $1
            "#,
        )
        .bind(outreach_item_id)
        .execute(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item mark_sent", e))?;

        Ok(())
    }

    /// Re-enqueue a failed attempt with a backoff delay, or mark terminally
    /// failed once retries are exhausted. Returns the updated item.
    pub async fn record_failure(
        pool: &PgPool,
        outreach_item_id: i64,
        error: &str,
        backoff_secs: i64,
    ) -> Result<OutreachQueueItem> {
        let item = sqlx::query_as::<_, OutreachQueueItem>(
            r#"
            UPDATE outreach_queue_items
            SET retry_count = retry_count + 1,
                last_error = $2,
                status = CASE WHEN retry_count + 1 >= max_retries THEN 'failed' ELSE 'pending' END,
                scheduled_at = CASE WHEN retry_count + 1 >= max_retries
                                    THEN scheduled_at
                                    ELSE NOW() + ($3 * INTERVAL '1 second') END,
                updated_at = NOW()
            WHERE outreach_item_id = $1
            RETURNING *
            "#,
        )
        .bind(outreach_item_id)
        .bind(error)
        .bind(backoff_secs as f64)
        .fetch_optional(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item record_failure", e))?;

        item.ok_or_else(|| OutreachError::Database {
            operation: "outreach_item record_failure".to_string(),
            message: format!("outreach item {outreach_item_id} not found"),
        })
    }

    /// Record an externally reported engagement event on this item
    pub async fn record_engagement(
        pool: &PgPool,
        outreach_item_id: i64,
        kind: EngagementKind,
    ) -> Result<()> {
        let column = kind.column();
        let query = format!(
            "UPDATE outreach_queue_items SET {column} = COALESCE({column}, NOW()), updated_at = NOW() WHERE outreach_item_id = $1"
        );
        sqlx::query(&query)
            .bind(outreach_item_id)
            .execute(pool)
            .await
            .map_err(|e| OutreachError::database("outreach_item record_engagement", e))?;

        Ok(())
    }

    /// Per-tier item counts for a campaign, used to enforce the per-campaign
    /// tier caps cumulatively across initial selection and escalations
    pub async fn tier_counts(pool: &PgPool, campaign_id: i64) -> Result<TierItemCounts> {
        let counts = sqlx::query_as::<_, TierItemCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE c.tier = 1) AS tier1,
                COUNT(*) FILTER (WHERE c.tier = 2) AS tier2,
                COUNT(*) FILTER (WHERE c.tier = 3) AS tier3
            FROM outreach_queue_items oqi
            LEFT JOIN contractors c ON c.contractor_id = oqi.contractor_id
            WHERE oqi.campaign_id = $1 AND oqi.status <> 'cancelled'
            "#,
        )
        .bind(campaign_id)
        .fetch_one(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item tier_counts", e))?;

        Ok(counts)
    }

    /// Cancel all still-pending items for a campaign (queue hygiene on
    /// completion/cancellation). Returns the number cancelled.
    pub async fn cancel_pending_for_campaign(pool: &PgPool, campaign_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outreach_queue_items
            SET status = 'cancelled', updated_at = NOW()
            WHERE campaign_id = $1 AND status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .execute(pool)
        .await
        .map_err(|e| OutreachError::database("outreach_item cancel_pending_for_campaign", e))?;

        Ok(result.rows_affected())
    }

    pub fn state(&self) -> OutreachItemState {
        self.status.parse().unwrap_or_default()
    }

    pub fn item_priority(&self) -> CampaignPriority {
        self.priority.parse().unwrap_or_default()
    }
}

/// Per-tier outreach item counts for one campaign
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct TierItemCounts {
    pub tier1: i64,
    pub tier2: i64,
    pub tier3: i64,
}

/// Engagement event kinds reported by the dispatch collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementKind {
    Opened,
    Clicked,
    Responded,
}

impl EngagementKind {
    fn column(&self) -> &'static str {
        match self {
            Self::Opened => "opened_at",
            Self::Clicked => "clicked_at",
            Self::Responded => "responded_at",
        }
    }
}
