#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Outreach Core Rust
//!
//! Orchestration engine for contractor outreach campaigns: sourcing a target
//! number of bids for a project within a fixed timeline by contacting
//! contractors in quality tiers, checking progress at scheduled points along
//! the timeline, and escalating automatically when a campaign falls behind.
//!
//! ## Architecture
//!
//! A campaign carries a strategy (bids needed, timeline, confidence). At
//! creation the engine pre-computes check-ins at fixed percentages of the
//! timeline; at each one the escalation engine compares expected to actual
//! bids and applies a severity-graded response, from adding a couple of
//! backup contractors up to relaxing selection filters and flagging a human.
//! Outreach itself goes through a durable priority queue drained by an
//! external dispatch collaborator.
//!
//! ## Module Organization
//!
//! - [`models`] - Campaign, check-in, escalation, queue item and snapshot rows
//! - [`orchestration`] - The manager, pool, scheduler, tracker, engine, queue
//! - [`state_machine`] - Campaign lifecycle transitions
//! - [`config`] - YAML-backed policy configuration
//! - [`error`] - Structured error handling
//! - [`events`] - Lifecycle event publishing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use outreach_core::config::OutreachConfig;
//! use outreach_core::models::{CampaignStrategy, NewCampaign};
//! use outreach_core::orchestration::CampaignManager;
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = CampaignManager::new(pool, OutreachConfig::default());
//!
//! let campaign = manager
//!     .create_campaign(NewCampaign {
//!         bid_card_id: 42,
//!         strategy: CampaignStrategy {
//!             bids_needed: 10,
//!             timeline_hours: 48,
//!             expected_responses: 8,
//!             confidence_score: 0.8,
//!         },
//!         location: Some("austin".to_string()),
//!         specialties: None,
//!     })
//!     .await?;
//!
//! manager.start_campaign(campaign.campaign_id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Integration tests use SQLx native testing with automatic database
//! isolation per test:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod test_helpers;

pub use config::{ConfigManager, OutreachConfig, PolicyConfig};
pub use constants::ContractorTier;
// Re-export constants events with different name to avoid conflict
pub use constants::events as system_events;
pub use error::{OutreachError, Result};
pub use models::{Campaign, CampaignStrategy, NewCampaign};
pub use orchestration::CampaignManager;
