//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one user eligible to queue
pub type ParticipantId = u64;

/// Identifier of a channel; one queue per channel
pub type ChannelId = u64;

/// Identifier of a coordination resource (lobby or match session) on the chat platform
pub type ResourceId = u64;

/// Identifier of a message on the chat platform
pub type MessageId = u64;

/// Unique identifier for formed matches
pub type MatchId = Uuid;

/// Rate-limited participant actions. Each kind has its own cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Enroll,
    Withdraw,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Enroll => write!(f, "enroll"),
            ActionKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Requested visibility of a coordination resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only explicitly added participants can see it
    Private,
    /// Everyone in the parent channel can see it
    Public,
}

/// A coordination resource as reported by the chat platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationResource {
    pub id: ResourceId,
    pub parent: ChannelId,
    pub name: String,
    pub visibility: Visibility,
    pub archived: bool,
}

impl CoordinationResource {
    pub fn is_private(&self) -> bool {
        self.visibility == Visibility::Private
    }
}

/// Durable per-channel queue record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub channel_id: ChannelId,
    pub participants: Vec<ParticipantId>,
    pub announcement: Option<MessageId>,
    /// Pre-formation lobby resource, if one was attached
    #[serde(default)]
    pub lobby: Option<ResourceId>,
    pub updated_at: DateTime<Utc>,
}

/// Durable per-match record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub channel_id: ChannelId,
    pub participants: Vec<ParticipantId>,
    pub session: Option<ResourceId>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Event produced when a queue fills and a match is sliced off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFormed {
    pub match_id: MatchId,
    pub channel_id: ChannelId,
    /// Fixed participant list, earliest enrollers first
    pub participants: Vec<ParticipantId>,
    /// Coordination session handed to the lifecycle scheduler
    pub session: Option<ResourceId>,
    pub formed_at: DateTime<Utc>,
}

impl MatchFormed {
    pub fn to_record(&self) -> MatchRecord {
        MatchRecord {
            match_id: self.match_id,
            channel_id: self.channel_id,
            participants: self.participants.clone(),
            session: self.session,
            created_at: self.formed_at,
            deleted_at: None,
        }
    }
}

/// Result of a successful enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollOutcome {
    /// Queue size right after the participant was appended
    pub queue_size: usize,
    /// Queue size once match formation ran
    pub remaining: usize,
    pub formed: Option<MatchFormed>,
}

/// Result of a successful withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawOutcome {
    pub queue_size: usize,
    /// Lobby resource torn down because the queue emptied
    pub closed_lobby: Option<ResourceId>,
}

/// Flavour of administrative reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetKind {
    /// Clear the queue
    Cancel,
    /// Clear the queue and forget the announcement
    Setup,
}

impl ResetKind {
    pub fn reason(&self) -> &'static str {
        match self {
            ResetKind::Cancel => "Queue cancelled by admin.",
            ResetKind::Setup => "Queue setup reset.",
        }
    }
}

/// Result of an administrative reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetOutcome {
    /// Number of participants that were queued before the reset
    pub cleared: usize,
    pub closed_lobby: Option<ResourceId>,
}

/// Current queue contents, for the caller to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub channel_id: ChannelId,
    pub participants: Vec<ParticipantId>,
    pub capacity: usize,
    pub announcement: Option<MessageId>,
    pub lobby: Option<ResourceId>,
}

impl QueueStatus {
    pub fn open_slots(&self) -> usize {
        self.capacity.saturating_sub(self.participants.len())
    }
}
