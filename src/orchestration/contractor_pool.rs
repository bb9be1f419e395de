//! # Contractor Pool
//!
//! Read-only tier selection over the collaborator-supplied
//! `contractor_tier_view`. Selection walks tiers in order (tier 1 first),
//! breaking ties within a tier by descending historical response rate, then by
//! longest time since last contact so load spreads across the pool.
//!
//! Exhaustion is not an error: when fewer contractors remain than requested
//! the result carries `partial = true` and the escalation engine decides
//! whether to relax filters on a later pass.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use crate::config::TierCaps;
use crate::constants::ContractorTier;
use crate::error::{OutreachError, Result};
use crate::models::{ContractorRef, ContractorTierRow};

/// A tier selection request: how many contractors to pull from each tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRequest {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
}

impl TierRequest {
    pub fn total(&self) -> usize {
        self.tier1 + self.tier2 + self.tier3
    }

    pub fn for_tier(&self, tier: ContractorTier) -> usize {
        match tier {
            ContractorTier::Tier1 => self.tier1,
            ContractorTier::Tier2 => self.tier2,
            ContractorTier::Tier3 => self.tier3,
        }
    }

    /// Clamp each tier's request to the configured per-campaign cap
    pub fn clamped(&self, caps: &TierCaps) -> TierRequest {
        TierRequest {
            tier1: self.tier1.min(caps.tier1),
            tier2: self.tier2.min(caps.tier2),
            tier3: self.tier3.min(caps.tier3),
        }
    }
}

/// Filters applied during selection, derived from the campaign's bid card
#[derive(Debug, Clone, Default)]
pub struct SelectionFilters {
    pub location: Option<String>,
    pub specialties: Option<Vec<String>>,
    /// Relaxed mode (critical escalations): drop location/specialty filters
    /// and the already-contacted exclusion
    pub relaxed: bool,
}

/// Outcome of a selection pass
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub contractors: Vec<ContractorRef>,
    /// True when the pool could not satisfy the full request
    pub partial: bool,
    pub requested: usize,
}

impl SelectionResult {
    pub fn count_for_tier(&self, tier: ContractorTier) -> usize {
        self.contractors.iter().filter(|c| c.tier == tier).count()
    }
}

pub struct ContractorPool {
    pool: PgPool,
}

impl ContractorPool {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Select contractors for a campaign across tiers.
    ///
    /// Excludes contractors already contacted for this bid card and any
    /// contractor at a weekly/monthly contact cap (the queue re-validates both
    /// at enqueue time). Returns fewer than requested, never errors, when the
    /// pool is exhausted.
    #[instrument(skip(self, filters), fields(bid_card_id = bid_card_id))]
    pub async fn select_contractors(
        &self,
        bid_card_id: i64,
        request: TierRequest,
        filters: &SelectionFilters,
        max_contacts_per_week: i64,
        max_contacts_per_month: i64,
    ) -> Result<SelectionResult> {
        let mut contractors = Vec::with_capacity(request.total());

        for tier in ContractorTier::all() {
            let wanted = request.for_tier(tier);
            if wanted == 0 {
                continue;
            }

            let rows = self
                .select_tier(
                    bid_card_id,
                    tier,
                    wanted,
                    filters,
                    max_contacts_per_week,
                    max_contacts_per_month,
                )
                .await?;
            contractors.extend(rows.iter().map(ContractorRef::from));
        }

        let partial = contractors.len() < request.total();
        if partial {
            warn!(
                bid_card_id,
                requested = request.total(),
                found = contractors.len(),
                relaxed = filters.relaxed,
                "Contractor pool could not satisfy full selection request"
            );
        } else {
            debug!(
                bid_card_id,
                selected = contractors.len(),
                "Contractor selection satisfied"
            );
        }

        Ok(SelectionResult {
            partial,
            requested: request.total(),
            contractors,
        })
    }

    async fn select_tier(
        &self,
        bid_card_id: i64,
        tier: ContractorTier,
        limit: usize,
        filters: &SelectionFilters,
        max_contacts_per_week: i64,
        max_contacts_per_month: i64,
    ) -> Result<Vec<ContractorTierRow>> {
        let apply_location = !filters.relaxed && filters.location.is_some();
        let apply_specialties = !filters.relaxed
            && filters
                .specialties
                .as_ref()
                .is_some_and(|s| !s.is_empty());
        let exclude_contacted = !filters.relaxed;

        let query = r#"
            SELECT * FROM contractor_tier_view c
            WHERE c.tier = $1
              AND c.contacts_this_week < $2
              AND c.contacts_this_month < $3
              AND ($4 = FALSE OR c.service_area = $5)
              AND ($6 = FALSE OR c.specialties ?| $7)
              AND ($8 = FALSE OR NOT EXISTS (
                    SELECT 1 FROM outreach_queue_items oqi
                    WHERE oqi.contractor_id = c.contractor_id
                      AND oqi.bid_card_id = $9
                  ))
            ORDER BY c.historical_response_rate DESC,
                     c.last_contacted_at ASC NULLS FIRST,
                     c.contractor_id ASC
            LIMIT $10
        "#;

        let rows = sqlx::query_as::<_, ContractorTierRow>(query)
            .bind(tier.as_i32())
            .bind(max_contacts_per_week)
            .bind(max_contacts_per_month)
            .bind(apply_location)
            .bind(filters.location.as_deref().unwrap_or(""))
            .bind(apply_specialties)
            .bind(filters.specialties.clone().unwrap_or_default())
            .bind(exclude_contacted)
            .bind(bid_card_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OutreachError::database("contractor_pool select_tier", e))?;

        Ok(rows)
    }
}

/// Derive selection filters from a campaign's bid-card attributes
pub fn filters_for_campaign(campaign: &crate::models::Campaign, relaxed: bool) -> SelectionFilters {
    let specialties = campaign.specialties.as_ref().and_then(|value| {
        value.as_array().map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>()
        })
    });

    SelectionFilters {
        location: campaign.location.clone(),
        specialties,
        relaxed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_request_totals_and_clamping() {
        let request = TierRequest {
            tier1: 10,
            tier2: 3,
            tier3: 20,
        };
        assert_eq!(request.total(), 33);

        let caps = TierCaps::default();
        let clamped = request.clamped(&caps);
        assert_eq!(clamped.tier1, 4);
        assert_eq!(clamped.tier2, 3);
        assert_eq!(clamped.tier3, 12);
    }

    #[test]
    fn test_selection_result_tier_counts() {
        let result = SelectionResult {
            contractors: vec![
                ContractorRef {
                    contractor_id: 1,
                    tier: ContractorTier::Tier1,
                    historical_response_rate: 0.9,
                },
                ContractorRef {
                    contractor_id: 2,
                    tier: ContractorTier::Tier3,
                    historical_response_rate: 0.2,
                },
                ContractorRef {
                    contractor_id: 3,
                    tier: ContractorTier::Tier3,
                    historical_response_rate: 0.3,
                },
            ],
            partial: true,
            requested: 5,
        };

        assert_eq!(result.count_for_tier(ContractorTier::Tier1), 1);
        assert_eq!(result.count_for_tier(ContractorTier::Tier2), 0);
        assert_eq!(result.count_for_tier(ContractorTier::Tier3), 2);
    }
}
