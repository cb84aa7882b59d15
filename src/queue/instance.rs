//! Per-channel queue state
//!
//! A `ChannelQueue` is only ever mutated through the guard handed out by the
//! queue registry, so holding `&mut ChannelQueue` means holding the channel's
//! exclusion.

use crate::types::{ChannelId, MessageId, ParticipantId, QueueSnapshot, QueueStatus, ResourceId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};

/// Ordered participant list for one channel, plus its external references
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelQueue {
    channel_id: ChannelId,
    /// Insertion order is priority order
    participants: Vec<ParticipantId>,
    announcement: Option<MessageId>,
    /// Pre-formation lobby resource while the queue is filling
    lobby: Option<ResourceId>,
    updated_at: DateTime<Utc>,
}

impl ChannelQueue {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id,
            participants: Vec::new(),
            announcement: None,
            lobby: None,
            updated_at: current_timestamp(),
        }
    }

    /// Rebuild from a persisted snapshot. Duplicate identifiers are dropped,
    /// keeping the first occurrence.
    pub fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        let mut participants = Vec::with_capacity(snapshot.participants.len());
        for participant_id in &snapshot.participants {
            if !participants.contains(participant_id) {
                participants.push(*participant_id);
            }
        }
        Self {
            channel_id: snapshot.channel_id,
            participants,
            announcement: snapshot.announcement,
            lobby: snapshot.lobby,
            updated_at: snapshot.updated_at,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, participant_id: ParticipantId) -> bool {
        self.participants.contains(&participant_id)
    }

    pub fn announcement(&self) -> Option<MessageId> {
        self.announcement
    }

    pub fn lobby(&self) -> Option<ResourceId> {
        self.lobby
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append to the end of the queue. Returns false if already present.
    pub(crate) fn push(&mut self, participant_id: ParticipantId) -> bool {
        if self.contains(participant_id) {
            return false;
        }
        self.participants.push(participant_id);
        self.touch();
        true
    }

    /// Remove a participant, preserving the order of the rest
    pub(crate) fn remove(&mut self, participant_id: ParticipantId) -> bool {
        let Some(position) = self.participants.iter().position(|id| *id == participant_id) else {
            return false;
        };
        self.participants.remove(position);
        self.touch();
        true
    }

    /// Split off the first `count` participants; the remainder stays queued
    pub(crate) fn take_front(&mut self, count: usize) -> Vec<ParticipantId> {
        let count = count.min(self.participants.len());
        let remainder = self.participants.split_off(count);
        let front = std::mem::replace(&mut self.participants, remainder);
        self.touch();
        front
    }

    /// Empty the queue, returning the previous participants
    pub(crate) fn clear(&mut self) -> Vec<ParticipantId> {
        self.touch();
        std::mem::take(&mut self.participants)
    }

    pub(crate) fn set_announcement(&mut self, announcement: Option<MessageId>) {
        self.announcement = announcement;
        self.touch();
    }

    pub(crate) fn set_lobby(&mut self, lobby: Option<ResourceId>) {
        self.lobby = lobby;
        self.touch();
    }

    /// Detach the lobby handle
    pub(crate) fn take_lobby(&mut self) -> Option<ResourceId> {
        let lobby = self.lobby.take();
        if lobby.is_some() {
            self.touch();
        }
        lobby
    }

    /// Detach the lobby handle only if it still refers to `resource_id`
    pub(crate) fn clear_lobby_if(&mut self, resource_id: ResourceId) -> bool {
        if self.lobby == Some(resource_id) {
            self.lobby = None;
            self.touch();
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            channel_id: self.channel_id,
            participants: self.participants.clone(),
            announcement: self.announcement,
            lobby: self.lobby,
            updated_at: self.updated_at,
        }
    }

    pub fn status(&self, capacity: usize) -> QueueStatus {
        QueueStatus {
            channel_id: self.channel_id,
            participants: self.participants.clone(),
            capacity,
            announcement: self.announcement,
            lobby: self.lobby,
        }
    }

    fn touch(&mut self) {
        self.updated_at = current_timestamp();
    }
}
