//! Utility functions for the matchmaking service

use crate::types::{MatchId, ParticipantId, ResourceId};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> MatchId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Mention string for a participant
pub fn mention(participant_id: ParticipantId) -> String {
    format!("<@{}>", participant_id)
}

/// Mention string for a coordination resource
pub fn resource_mention(resource_id: ResourceId) -> String {
    format!("<#{}>", resource_id)
}

/// Space separated mentions, in the given order
pub fn format_mentions(participants: &[ParticipantId]) -> String {
    participants
        .iter()
        .map(|id| mention(*id))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole minutes shown in a deletion warning, never less than one
pub fn warning_minutes(warn_before: Duration) -> u64 {
    let minutes = (warn_before.as_secs_f64() / 60.0).round() as u64;
    minutes.max(1)
}

/// Name for a freshly created lobby resource
pub fn lobby_name(now: DateTime<Utc>) -> String {
    format!("queue-{}", now.format("%H%M%S"))
}
