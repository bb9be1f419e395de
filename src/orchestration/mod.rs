//! # Orchestration Core
//!
//! The components that run outreach campaigns end to end:
//!
//! - [`campaign_manager`]: lifecycle, initial selection, the check-in driver
//!   and the operator status surface
//! - [`contractor_pool`]: tiered contractor selection with filters
//! - [`check_in_scheduler`]: pre-computed evaluation points on the timeline
//! - [`response_tracker`]: engagement/bid snapshots and bid projection
//! - [`escalation_engine`]: ratio evaluation and escalation actions
//! - [`outreach_queue`]: durable dispatch queue with retry/backoff
//! - [`contact_ledger`]: cross-campaign contact-frequency caps

pub mod campaign_manager;
pub mod check_in_scheduler;
pub mod contact_ledger;
pub mod contractor_pool;
pub mod escalation_engine;
pub mod outreach_queue;
pub mod response_tracker;

pub use campaign_manager::{
    BidRecording, CampaignManager, CampaignStatusSummary, CompletionOutcome,
};
pub use check_in_scheduler::CheckInScheduler;
pub use contact_ledger::ContactLedger;
pub use contractor_pool::{ContractorPool, SelectionFilters, SelectionResult, TierRequest};
pub use escalation_engine::{CheckInEvaluation, EscalationEngine, EscalationPlan};
pub use outreach_queue::{DispatchOutcome, EnqueueOutcome, OutcomeDisposition, OutreachQueue};
pub use response_tracker::ResponseTracker;
