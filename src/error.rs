//! Error types for the matchmaking service
//!
//! Fallible functions return `anyhow::Result`; the typed variants below are
//! constructed with `.into()` and recovered by callers with `downcast_ref`.

use crate::types::{ActionKind, ChannelId, ParticipantId};
use std::time::Duration;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Participant {participant_id} is already in this queue")]
    AlreadyQueued { participant_id: ParticipantId },

    #[error("Participant {participant_id} is already queued in channel {channel_id}")]
    AlreadyQueuedElsewhere {
        participant_id: ParticipantId,
        channel_id: ChannelId,
    },

    #[error("Participant {participant_id} is not in the queue")]
    NotQueued { participant_id: ParticipantId },

    #[error("Rate limited on {action}, try again in {:.1}s", .remaining.as_secs_f64())]
    RateLimited {
        action: ActionKind,
        remaining: Duration,
    },

    #[error("Resource unavailable: {message}")]
    ResourceUnavailable { message: String },

    #[error("Resource not found: {resource}")]
    ResourceNotFound { resource: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Expected, participant-caused rejections. These are reported back to the
    /// caller and never logged as failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            MatchmakingError::AlreadyQueued { .. }
                | MatchmakingError::AlreadyQueuedElsewhere { .. }
                | MatchmakingError::NotQueued { .. }
                | MatchmakingError::RateLimited { .. }
        )
    }

    /// Short machine-readable label, used for metrics and console output
    pub fn kind(&self) -> &'static str {
        match self {
            MatchmakingError::AlreadyQueued { .. } => "already_queued",
            MatchmakingError::AlreadyQueuedElsewhere { .. } => "already_queued_elsewhere",
            MatchmakingError::NotQueued { .. } => "not_queued",
            MatchmakingError::RateLimited { .. } => "rate_limited",
            MatchmakingError::ResourceUnavailable { .. } => "resource_unavailable",
            MatchmakingError::ResourceNotFound { .. } => "resource_not_found",
            MatchmakingError::Forbidden { .. } => "forbidden",
            MatchmakingError::ConfigurationError { .. } => "configuration",
            MatchmakingError::InternalError { .. } => "internal",
        }
    }
}

/// Extract the typed matchmaking error from an `anyhow::Error`, if there is one
pub fn matchmaking_error(err: &anyhow::Error) -> Option<&MatchmakingError> {
    err.downcast_ref::<MatchmakingError>()
}

/// True when the error is a platform `ResourceNotFound`
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        matchmaking_error(err),
        Some(MatchmakingError::ResourceNotFound { .. })
    )
}

/// True when the error is a platform `Forbidden`
pub fn is_forbidden(err: &anyhow::Error) -> bool {
    matches!(matchmaking_error(err), Some(MatchmakingError::Forbidden { .. }))
}

pub(crate) fn lock_poisoned(what: &str) -> MatchmakingError {
    MatchmakingError::InternalError {
        message: format!("Failed to acquire {} lock", what),
    }
}
