//! # Error Types
//!
//! Structured error handling for the outreach orchestration core using thiserror.
//!
//! Only `InvalidStrategy` is a hard failure surfaced to campaign creators.
//! Partial selection, dispatch failures, duplicate bids and stale check-ins are
//! absorbed into campaign status and result types rather than raised as errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutreachError {
    #[error("Invalid campaign strategy: {reason}")]
    InvalidStrategy { reason: String },

    #[error("Campaign {campaign_id} not found")]
    CampaignNotFound { campaign_id: i64 },

    #[error("Campaign {campaign_id} is already running")]
    AlreadyRunning { campaign_id: i64 },

    #[error("Invalid campaign transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Database error during {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl OutreachError {
    pub fn invalid_strategy(reason: impl Into<String>) -> Self {
        Self::InvalidStrategy {
            reason: reason.into(),
        }
    }

    pub fn database(operation: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Database {
            operation: operation.into(),
            message: source.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error should be surfaced to the caller as a hard failure.
    pub fn is_hard_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidStrategy { .. }
                | Self::CampaignNotFound { .. }
                | Self::AlreadyRunning { .. }
                | Self::InvalidTransition { .. }
        )
    }
}

impl From<sqlx::Error> for OutreachError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            operation: "query".to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OutreachError>;
