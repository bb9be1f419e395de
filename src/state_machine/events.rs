use serde::{Deserialize, Serialize};

/// Events that drive campaign lifecycle transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "data")]
pub enum CampaignEvent {
    /// Check-in schedule computed, campaign ready to start
    Schedule,
    /// Begin initial outreach
    Start,
    /// Externally requested pause
    Pause,
    /// Resume a paused campaign
    Resume,
    /// Target met, or deadline passed with the reason carried
    Complete { deadline_passed: bool },
    /// Externally requested cancellation
    Cancel,
}

impl CampaignEvent {
    /// Event name for logging and publishing
    pub fn name(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Complete { .. } => "complete",
            Self::Cancel => "cancel",
        }
    }
}
