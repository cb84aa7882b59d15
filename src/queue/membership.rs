//! Global participant → channel ownership index
//!
//! A participant is claimed by at most one channel at a time. Mutations for a
//! participant happen only while the caller holds the exclusion of the channel
//! it is claiming or releasing for; the internal lock only protects the map.

use crate::error::{lock_poisoned, MatchmakingError, Result};
use crate::types::{ChannelId, ParticipantId};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct MembershipIndex {
    owners: RwLock<HashMap<ParticipantId, ChannelId>>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel currently holding the participant
    pub fn owner_of(&self, participant_id: ParticipantId) -> Result<Option<ChannelId>> {
        let owners = self.owners.read().map_err(|_| lock_poisoned("membership"))?;
        Ok(owners.get(&participant_id).copied())
    }

    /// Record that `channel_id` holds the participant. Idempotent for the same
    /// channel; fails if a different channel already holds them.
    pub fn claim(&self, participant_id: ParticipantId, channel_id: ChannelId) -> Result<()> {
        let mut owners = self.owners.write().map_err(|_| lock_poisoned("membership"))?;
        match owners.get(&participant_id) {
            Some(owner) if *owner != channel_id => Err(MatchmakingError::AlreadyQueuedElsewhere {
                participant_id,
                channel_id: *owner,
            }
            .into()),
            _ => {
                owners.insert(participant_id, channel_id);
                Ok(())
            }
        }
    }

    /// Remove the participant's entry, whatever channel holds it
    pub fn release(&self, participant_id: ParticipantId) -> Result<()> {
        let mut owners = self.owners.write().map_err(|_| lock_poisoned("membership"))?;
        owners.remove(&participant_id);
        Ok(())
    }

    /// Remove the participant's entry only if `channel_id` holds it
    pub fn release_if_owned(
        &self,
        participant_id: ParticipantId,
        channel_id: ChannelId,
    ) -> Result<bool> {
        let mut owners = self.owners.write().map_err(|_| lock_poisoned("membership"))?;
        if owners.get(&participant_id) == Some(&channel_id) {
            owners.remove(&participant_id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Release every listed participant held by `channel_id`
    pub fn release_all(&self, participants: &[ParticipantId], channel_id: ChannelId) -> Result<()> {
        let mut owners = self.owners.write().map_err(|_| lock_poisoned("membership"))?;
        for participant_id in participants {
            if owners.get(participant_id) == Some(&channel_id) {
                owners.remove(participant_id);
            }
        }
        Ok(())
    }

    /// Number of participants currently claimed
    pub fn len(&self) -> usize {
        self.owners.read().map(|owners| owners.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the whole index, for invariant checks and diagnostics
    pub fn entries(&self) -> Result<HashMap<ParticipantId, ChannelId>> {
        let owners = self.owners.read().map_err(|_| lock_poisoned("membership"))?;
        Ok(owners.clone())
    }
}
