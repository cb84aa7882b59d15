//! Match formation
//!
//! Runs inside the same channel exclusion as the enrollment that triggered
//! it, so a reader of the channel never sees a full queue that has not been
//! split yet.

use crate::error::Result;
use crate::queue::instance::ChannelQueue;
use crate::queue::membership::MembershipIndex;
use crate::types::ParticipantId;

/// Decides whether a queue is ready to produce a match
pub trait MatchFormation: Send + Sync {
    /// Participants required for one match
    fn capacity(&self) -> usize;

    /// Slice a match off the queue if it is ready. The matched participants
    /// are released from the membership index; the rest stay queued.
    fn try_form(
        &self,
        queue: &mut ChannelQueue,
        membership: &MembershipIndex,
    ) -> Result<Option<Vec<ParticipantId>>>;
}

/// Earliest enrollers are matched first
#[derive(Debug, Clone)]
pub struct FifoMatchFormation {
    capacity: usize,
}

impl FifoMatchFormation {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }
}

impl MatchFormation for FifoMatchFormation {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn try_form(
        &self,
        queue: &mut ChannelQueue,
        membership: &MembershipIndex,
    ) -> Result<Option<Vec<ParticipantId>>> {
        if queue.len() < self.capacity {
            return Ok(None);
        }

        let matched = queue.take_front(self.capacity);
        membership.release_all(&matched, queue.channel_id())?;
        Ok(Some(matched))
    }
}
