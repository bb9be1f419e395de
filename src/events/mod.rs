pub mod publisher;

pub use publisher::{CampaignLifecycleEvent, EventPublisher};
