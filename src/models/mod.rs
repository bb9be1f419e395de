pub mod campaign;
pub mod check_in;
pub mod contractor;
pub mod escalation;
pub mod outreach_item;
pub mod response_snapshot;

// Re-export core models for easy access
pub use campaign::{Campaign, CampaignStrategy, NewCampaign};
pub use check_in::{CheckIn, NewCheckIn};
pub use contractor::{ContractorRef, ContractorTierRow};
pub use escalation::{Escalation, NewEscalation};
pub use outreach_item::{
    EngagementKind, NewOutreachItem, OutreachChannel, OutreachQueueItem, TierItemCounts,
};
pub use response_snapshot::{NewResponseSnapshot, ResponseSnapshot};
