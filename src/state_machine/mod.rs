// State machine module for campaign lifecycle management
//
// Provides the campaign lifecycle state machine plus the status enums shared
// across the orchestration components.

pub mod campaign_state_machine;
pub mod events;
pub mod states;

// Re-export main types for convenient access
pub use campaign_state_machine::CampaignStateMachine;
pub use events::CampaignEvent;
pub use states::{
    CampaignPriority, CampaignState, EscalationLevel, OutreachItemState, PerformanceStatus,
};
