use serde::{Deserialize, Serialize};
use std::fmt;

/// Campaign lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    /// Created but not yet scheduled
    Draft,
    /// Check-in schedule computed, waiting to start
    Scheduled,
    /// Actively sourcing bids
    Running,
    /// Externally paused; due check-ins are skipped, deadline unchanged
    Paused,
    /// Target met or deadline passed
    Completed,
    /// Externally cancelled
    Cancelled,
}

impl CampaignState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check if check-ins should be evaluated in this state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for CampaignState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for CampaignState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid campaign state: {s}")),
        }
    }
}

impl Default for CampaignState {
    fn default() -> Self {
        Self::Draft
    }
}

/// Campaign priority levels, raised by escalations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl CampaignPriority {
    /// Dispatch ordering weight; higher dispatches first
    pub fn weight(&self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
            Self::Urgent => 4,
        }
    }

    /// Take the higher of two priorities; escalations never lower priority
    pub fn max(self, other: Self) -> Self {
        if other.weight() > self.weight() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for CampaignPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for CampaignPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Invalid campaign priority: {s}")),
        }
    }
}

impl Default for CampaignPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Escalation severity assigned per check-in evaluation.
///
/// Each check-in gets a fresh level from that moment's performance ratio;
/// levels are not cumulative across check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    None,
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl EscalationLevel {
    /// Whether this level produces an escalation record
    pub fn requires_action(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Mild => write!(f, "mild"),
            Self::Moderate => write!(f, "moderate"),
            Self::Severe => write!(f, "severe"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for EscalationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "mild" => Ok(Self::Mild),
            "moderate" => Ok(Self::Moderate),
            "severe" => Ok(Self::Severe),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid escalation level: {s}")),
        }
    }
}

/// Outreach queue item states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachItemState {
    /// Waiting for dispatch
    Pending,
    /// Claimed by the dispatch collaborator
    Sending,
    /// Delivered
    Sent,
    /// Delivery failed terminally (retries exhausted)
    Failed,
    /// Cancelled before dispatch
    Cancelled,
}

impl OutreachItemState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }

    /// Whether the item counts as a contact attempt. Failed sends still
    /// consumed a contact-cap slot, so they count as contacted.
    pub fn counts_as_contacted(&self) -> bool {
        matches!(self, Self::Sending | Self::Sent | Self::Failed)
    }
}

impl fmt::Display for OutreachItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Sending => write!(f, "sending"),
            Self::Sent => write!(f, "sent"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OutreachItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid outreach item state: {s}")),
        }
    }
}

impl Default for OutreachItemState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Operator-facing campaign performance status for the status query surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceStatus {
    /// Target reached
    Success,
    /// Progress at or above pace
    OnTrack,
    /// Behind pace with exhausted or exhausting options
    AtRisk,
    /// Escalation actions have been taken
    Escalated,
}

impl fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::OnTrack => write!(f, "ON_TRACK"),
            Self::AtRisk => write!(f, "AT_RISK"),
            Self::Escalated => write!(f, "ESCALATED"),
        }
    }
}
