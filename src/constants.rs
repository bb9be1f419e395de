//! # System Constants and Policy Defaults
//!
//! Canonical defaults for the outreach orchestration engine: escalation
//! thresholds, tier caps, response-rate priors, check-in percentages and
//! contact-frequency limits. These are the authoritative policy values;
//! [`crate::config::OutreachConfig`] carries them at runtime and deployments
//! override them through YAML, never by editing call sites.

use serde::{Deserialize, Serialize};

// Re-export state types for convenience
pub use crate::state_machine::states::{
    CampaignPriority, CampaignState as CampaignStatus, EscalationLevel, OutreachItemState,
    PerformanceStatus,
};

/// Lifecycle events published through the event system
pub mod events {
    // Campaign lifecycle events
    pub const CAMPAIGN_CREATED: &str = "campaign.created";
    pub const CAMPAIGN_STARTED: &str = "campaign.started";
    pub const CAMPAIGN_PAUSED: &str = "campaign.paused";
    pub const CAMPAIGN_RESUMED: &str = "campaign.resumed";
    pub const CAMPAIGN_COMPLETED: &str = "campaign.completed";
    pub const CAMPAIGN_CANCELLED: &str = "campaign.cancelled";

    // Check-in and escalation events
    pub const CHECK_IN_EVALUATED: &str = "check_in.evaluated";
    pub const CHECK_IN_SKIPPED: &str = "check_in.skipped";
    pub const ESCALATION_TRIGGERED: &str = "escalation.triggered";
    pub const ESCALATION_HUMAN_REVIEW: &str = "escalation.human_review_requested";

    // Outreach queue events
    pub const OUTREACH_ENQUEUED: &str = "outreach.enqueued";
    pub const OUTREACH_DISPATCH_FAILED: &str = "outreach.dispatch_failed";
    pub const OUTREACH_RETRIES_EXHAUSTED: &str = "outreach.retries_exhausted";

    // Bid collection events
    pub const BID_SUBMITTED: &str = "bid.submitted";
    pub const BID_DUPLICATE: &str = "bid.duplicate";
}

/// Escalation policy thresholds on `performance_ratio = actual / expected`
pub mod thresholds {
    /// ratio >= NONE is on pace, no action
    pub const NONE: f64 = 0.90;
    /// NONE > ratio >= MILD
    pub const MILD: f64 = 0.75;
    /// MILD > ratio >= MODERATE
    pub const MODERATE: f64 = 0.50;
    /// MODERATE > ratio >= SEVERE; anything below is critical
    pub const SEVERE: f64 = 0.25;
}

/// Per-campaign contractor selection caps by tier
pub mod tier_caps {
    pub const TIER1: usize = 4;
    pub const TIER2: usize = 8;
    pub const TIER3: usize = 12;
}

/// Expected response-rate priors by tier
pub mod tier_priors {
    /// Tier 1: internal/onboarded contractors
    pub const TIER1: f64 = 0.90;
    /// Tier 2: previously contacted prospects
    pub const TIER2: f64 = 0.50;
    /// Tier 3: cold/new contractors
    pub const TIER3: f64 = 0.33;
}

/// Contact-frequency policy limits, enforced across all campaigns combined
pub mod contact_caps {
    pub const MAX_PER_WEEK: i64 = 3;
    pub const MAX_PER_MONTH: i64 = 8;
}

/// Default check-in percentages of a campaign's timeline
pub const DEFAULT_CHECK_IN_PERCENTAGES: [u32; 4] = [25, 50, 75, 100];

/// Dispatch retry policy defaults
pub mod dispatch {
    pub const MAX_RETRIES: i32 = 3;
    pub const BACKOFF_BASE_SECS: u64 = 60;
    pub const BACKOFF_MAX_SECS: u64 = 3600;
}

/// Cap on linear bid projections relative to current bids, guarding against
/// runaway extrapolation from very early campaign data
pub const PROJECTION_MAX_MULTIPLE: f64 = 10.0;

/// Contractor tier segments by onboarding depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractorTier {
    /// Internal, fully onboarded
    Tier1,
    /// Prospect previously contacted
    Tier2,
    /// Cold / never contacted
    Tier3,
}

impl ContractorTier {
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Tier1 => 1,
            Self::Tier2 => 2,
            Self::Tier3 => 3,
        }
    }

    pub fn from_i32(tier: i32) -> Option<Self> {
        match tier {
            1 => Some(Self::Tier1),
            2 => Some(Self::Tier2),
            3 => Some(Self::Tier3),
            _ => None,
        }
    }

    /// Expected response-rate prior for this tier
    pub fn response_prior(&self) -> f64 {
        match self {
            Self::Tier1 => tier_priors::TIER1,
            Self::Tier2 => tier_priors::TIER2,
            Self::Tier3 => tier_priors::TIER3,
        }
    }

    /// Default per-campaign selection cap for this tier
    pub fn selection_cap(&self) -> usize {
        match self {
            Self::Tier1 => tier_caps::TIER1,
            Self::Tier2 => tier_caps::TIER2,
            Self::Tier3 => tier_caps::TIER3,
        }
    }

    pub fn all() -> [ContractorTier; 3] {
        [Self::Tier1, Self::Tier2, Self::Tier3]
    }
}
