//! # Contact Ledger
//!
//! The one piece of genuinely shared mutable state across concurrent
//! campaigns: per-contractor contact-frequency counters. The same contractor
//! can be targeted by several campaigns at once, so reserving a contact slot
//! must be an atomic check-then-increment. Reservation takes a transaction-
//! scoped advisory lock keyed on the contractor id, counts the rolling
//! 7-day/30-day windows, and inserts the ledger row only when both caps hold.
//!
//! A reserved slot is consumed permanently, even if the send later fails.
//! That is deliberate: a contractor whose inbox bounces should not be pinged
//! again past policy limits just because delivery kept failing.

use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::config::ContactCaps;
use crate::error::{OutreachError, Result};

pub struct ContactLedger {
    pool: PgPool,
    caps: ContactCaps,
}

/// Rolling-window contact counts for one contractor
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ContactWindow {
    pub this_week: i64,
    pub this_month: i64,
}

impl ContactLedger {
    pub fn new(pool: PgPool, caps: ContactCaps) -> Self {
        Self { pool, caps }
    }

    pub fn caps(&self) -> &ContactCaps {
        &self.caps
    }

    /// Atomically reserve one contact slot for a contractor.
    ///
    /// Returns `false` when either the weekly or monthly cap is already at
    /// its limit; no ledger row is written in that case.
    #[instrument(skip(self))]
    pub async fn try_reserve(&self, contractor_id: i64, campaign_id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| OutreachError::database("contact_ledger begin", e))?;

        // Serialize concurrent reservations for the same contractor
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(contractor_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| OutreachError::database("contact_ledger advisory lock", e))?;

        let window = sqlx::query_as::<_, ContactWindow>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE contacted_at > NOW() - INTERVAL '7 days') AS this_week,
                COUNT(*) FILTER (WHERE contacted_at > NOW() - INTERVAL '30 days') AS this_month
            FROM contractor_contacts
            WHERE contractor_id = $1
            "#,
        )
        .bind(contractor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| OutreachError::database("contact_ledger window count", e))?;

        if window.this_week >= self.caps.max_per_week || window.this_month >= self.caps.max_per_month
        {
            debug!(
                contractor_id,
                this_week = window.this_week,
                this_month = window.this_month,
                "Contact cap reached, reservation refused"
            );
            tx.rollback()
                .await
                .map_err(|e| OutreachError::database("contact_ledger rollback", e))?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO contractor_contacts (contractor_id, campaign_id, contacted_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(contractor_id)
        .bind(campaign_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| OutreachError::database("contact_ledger insert", e))?;

        tx.commit()
            .await
            .map_err(|e| OutreachError::database("contact_ledger commit", e))?;

        Ok(true)
    }

    /// Release the most recent reservation for a (contractor, campaign) pair.
    ///
    /// Only used when a reservation turns out not to produce outreach work at
    /// all (duplicate-send suppression); failed deliveries keep their slot.
    pub async fn release_last(&self, contractor_id: i64, campaign_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM contractor_contacts
            WHERE contact_id = (
                SELECT contact_id FROM contractor_contacts
                WHERE contractor_id = $1 AND campaign_id = $2
                ORDER BY contacted_at DESC
                LIMIT 1
            )
            "#,
        )
        .bind(contractor_id)
        .bind(campaign_id)
        .execute(&self.pool)
        .await
        .map_err(|e| OutreachError::database("contact_ledger release_last", e))?;

        Ok(())
    }

    /// Current rolling-window counts for a contractor (read-only)
    pub async fn window(&self, contractor_id: i64) -> Result<ContactWindow> {
        let window = sqlx::query_as::<_, ContactWindow>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE contacted_at > NOW() - INTERVAL '7 days') AS this_week,
                COUNT(*) FILTER (WHERE contacted_at > NOW() - INTERVAL '30 days') AS this_month
            FROM contractor_contacts
            WHERE contractor_id = $1
            "#,
        )
        .bind(contractor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OutreachError::database("contact_ledger window", e))?;

        Ok(window)
    }
}
