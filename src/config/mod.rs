//! # Outreach Configuration System
//!
//! YAML-backed configuration for every policy knob the engine consumes:
//! escalation thresholds, tier caps, check-in percentages, contact-frequency
//! limits, dispatch retry/backoff. The compiled-in defaults come from
//! [`crate::constants`] and are the canonical policy; deployments override
//! them through a YAML file, never by patching call sites.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use outreach_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let caps = &manager.config().policy.tier_caps;
//! println!("tier1 cap: {}", caps.tier1);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{OutreachError, Result};

pub use loader::ConfigManager;

/// Root configuration structure mirroring outreach-config.yaml
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutreachConfig {
    /// Database connection settings
    pub database: DatabaseConfig,

    /// Campaign scheduling and escalation policy
    pub policy: PolicyConfig,

    /// Dispatch retry and batching settings
    pub dispatch: DispatchConfig,

    /// Event channel settings
    pub events: EventsConfig,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            policy: PolicyConfig::default(),
            dispatch: DispatchConfig::default(),
            events: EventsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/outreach_development".to_string(),
            pool: 10,
        }
    }
}

/// Campaign policy: check-in timetable, escalation thresholds, selection and
/// contact caps
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Percentages of `timeline_hours` at which check-ins fire
    pub check_in_percentages: Vec<u32>,
    pub escalation_thresholds: EscalationThresholds,
    pub tier_caps: TierCaps,
    pub contact_caps: ContactCaps,
    /// Cap on linear bid projection as a multiple of current bids
    pub projection_max_multiple: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            check_in_percentages: constants::DEFAULT_CHECK_IN_PERCENTAGES.to_vec(),
            escalation_thresholds: EscalationThresholds::default(),
            tier_caps: TierCaps::default(),
            contact_caps: ContactCaps::default(),
            projection_max_multiple: constants::PROJECTION_MAX_MULTIPLE,
        }
    }
}

/// Performance-ratio boundaries between escalation levels
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EscalationThresholds {
    /// ratio >= none ⇒ no escalation
    pub none: f64,
    pub mild: f64,
    pub moderate: f64,
    /// ratio below `severe` is critical
    pub severe: f64,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            none: constants::thresholds::NONE,
            mild: constants::thresholds::MILD,
            moderate: constants::thresholds::MODERATE,
            severe: constants::thresholds::SEVERE,
        }
    }
}

/// Per-campaign selection caps by contractor tier
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TierCaps {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
}

impl Default for TierCaps {
    fn default() -> Self {
        Self {
            tier1: constants::tier_caps::TIER1,
            tier2: constants::tier_caps::TIER2,
            tier3: constants::tier_caps::TIER3,
        }
    }
}

impl TierCaps {
    pub fn for_tier(&self, tier: constants::ContractorTier) -> usize {
        match tier {
            constants::ContractorTier::Tier1 => self.tier1,
            constants::ContractorTier::Tier2 => self.tier2,
            constants::ContractorTier::Tier3 => self.tier3,
        }
    }

    pub fn total(&self) -> usize {
        self.tier1 + self.tier2 + self.tier3
    }
}

/// Contact-frequency limits enforced across all campaigns combined
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContactCaps {
    pub max_per_week: i64,
    pub max_per_month: i64,
}

impl Default for ContactCaps {
    fn default() -> Self {
        Self {
            max_per_week: constants::contact_caps::MAX_PER_WEEK,
            max_per_month: constants::contact_caps::MAX_PER_MONTH,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_retries: i32,
    pub backoff_base_secs: u64,
    pub backoff_max_secs: u64,
    pub batch_size: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::dispatch::MAX_RETRIES,
            backoff_base_secs: constants::dispatch::BACKOFF_BASE_SECS,
            backoff_max_secs: constants::dispatch::BACKOFF_MAX_SECS,
            batch_size: 50,
        }
    }
}

impl DispatchConfig {
    /// Exponential backoff delay for the given retry count, capped
    pub fn backoff_secs(&self, retry_count: i32) -> u64 {
        let exponent = retry_count.clamp(0, 16) as u32;
        let delay = self.backoff_base_secs.saturating_mul(1u64 << exponent);
        delay.min(self.backoff_max_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
        }
    }
}

impl OutreachConfig {
    /// Validate invariants the engine relies on. Rejects configurations that
    /// would break check-in ordering or threshold monotonicity.
    pub fn validate(&self) -> Result<()> {
        let pcts = &self.policy.check_in_percentages;
        if pcts.is_empty() {
            return Err(OutreachError::configuration(
                "check_in_percentages must not be empty",
            ));
        }
        for pair in pcts.windows(2) {
            if pair[0] >= pair[1] {
                return Err(OutreachError::configuration(format!(
                    "check_in_percentages must be strictly increasing, got {pcts:?}"
                )));
            }
        }
        if *pcts.last().unwrap_or(&0) > 100 {
            return Err(OutreachError::configuration(
                "check_in_percentages must not exceed 100",
            ));
        }

        let t = &self.policy.escalation_thresholds;
        if !(t.severe < t.moderate && t.moderate < t.mild && t.mild < t.none) {
            return Err(OutreachError::configuration(format!(
                "escalation thresholds must be strictly ordered severe < moderate < mild < none, got {t:?}"
            )));
        }

        let caps = &self.policy.contact_caps;
        if caps.max_per_week <= 0 || caps.max_per_month < caps.max_per_week {
            return Err(OutreachError::configuration(
                "contact caps must be positive with max_per_month >= max_per_week",
            ));
        }

        if self.dispatch.max_retries < 0 {
            return Err(OutreachError::configuration(
                "dispatch.max_retries must be non-negative",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OutreachConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy.check_in_percentages, vec![25, 50, 75, 100]);
        assert_eq!(config.policy.tier_caps.total(), 24);
    }

    #[test]
    fn test_validation_rejects_unordered_percentages() {
        let mut config = OutreachConfig::default();
        config.policy.check_in_percentages = vec![25, 25, 75];
        assert!(config.validate().is_err());

        config.policy.check_in_percentages = vec![50, 110];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_unordered_thresholds() {
        let mut config = OutreachConfig::default();
        config.policy.escalation_thresholds.mild = 0.95;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.backoff_secs(0), 60);
        assert_eq!(dispatch.backoff_secs(1), 120);
        assert_eq!(dispatch.backoff_secs(2), 240);
        // Capped at backoff_max_secs
        assert_eq!(dispatch.backoff_secs(10), 3600);
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
policy:
  tier_caps:
    tier1: 2
"#;
        let config: OutreachConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.policy.tier_caps.tier1, 2);
        // Unspecified fields keep defaults
        assert_eq!(config.policy.tier_caps.tier3, 12);
        assert_eq!(config.dispatch.max_retries, 3);
    }
}
