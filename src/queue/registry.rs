//! Queue registry: one exclusion per channel
//!
//! Every channel gets its own `tokio::sync::Mutex<ChannelQueue>`, created the
//! first time the channel is referenced and kept for the process lifetime.
//! The queue operations below take `&mut ChannelQueue`, which can only be
//! obtained from the guard returned by [`QueueRegistry::lock`].

use crate::error::{lock_poisoned, MatchmakingError, Result};
use crate::queue::instance::ChannelQueue;
use crate::queue::membership::MembershipIndex;
use crate::types::{ChannelId, ParticipantId, QueueSnapshot, ResetKind, ResourceId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Exclusive access to one channel's queue
pub type QueueGuard = OwnedMutexGuard<ChannelQueue>;

/// Process-wide map of channel queues
#[derive(Debug)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<ChannelId, Arc<Mutex<ChannelQueue>>>>,
    membership: Arc<MembershipIndex>,
}

impl QueueRegistry {
    pub fn new(membership: Arc<MembershipIndex>) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            membership,
        }
    }

    pub fn membership(&self) -> &Arc<MembershipIndex> {
        &self.membership
    }

    fn handle(&self, channel_id: ChannelId) -> Result<Arc<Mutex<ChannelQueue>>> {
        {
            let queues = self.queues.read().map_err(|_| lock_poisoned("queues"))?;
            if let Some(queue) = queues.get(&channel_id) {
                return Ok(queue.clone());
            }
        }

        let mut queues = self.queues.write().map_err(|_| lock_poisoned("queues"))?;
        let queue = queues
            .entry(channel_id)
            .or_insert_with(|| {
                debug!(channel_id, "Creating queue for channel");
                Arc::new(Mutex::new(ChannelQueue::new(channel_id)))
            })
            .clone();
        Ok(queue)
    }

    /// Enter the channel's exclusion, creating the queue on first use
    pub async fn lock(&self, channel_id: ChannelId) -> Result<QueueGuard> {
        let handle = self.handle(channel_id)?;
        Ok(handle.lock_owned().await)
    }

    /// Append a participant and claim their membership. Returns the new size.
    pub fn enroll(&self, queue: &mut ChannelQueue, participant_id: ParticipantId) -> Result<usize> {
        if queue.contains(participant_id) {
            return Err(MatchmakingError::AlreadyQueued { participant_id }.into());
        }
        self.membership.claim(participant_id, queue.channel_id())?;
        queue.push(participant_id);
        Ok(queue.len())
    }

    /// Remove a participant and release their membership. Returns the new size
    /// and the lobby handle detached because the queue emptied, if any.
    pub fn withdraw(
        &self,
        queue: &mut ChannelQueue,
        participant_id: ParticipantId,
    ) -> Result<(usize, Option<ResourceId>)> {
        if !queue.remove(participant_id) {
            return Err(MatchmakingError::NotQueued { participant_id }.into());
        }
        self.membership
            .release_if_owned(participant_id, queue.channel_id())?;

        let closed_lobby = if queue.is_empty() {
            queue.take_lobby()
        } else {
            None
        };
        Ok((queue.len(), closed_lobby))
    }

    /// Empty the queue and release every member. Returns the previous size and
    /// the detached lobby handle.
    pub fn reset(
        &self,
        queue: &mut ChannelQueue,
        kind: ResetKind,
    ) -> Result<(usize, Option<ResourceId>)> {
        let previous = queue.clear();
        self.membership.release_all(&previous, queue.channel_id())?;
        if kind == ResetKind::Setup {
            queue.set_announcement(None);
        }
        Ok((previous.len(), queue.take_lobby()))
    }

    /// Rehydrate queues and membership from persisted snapshots. A participant
    /// already owned by an earlier snapshot is dropped from later ones.
    /// Returns the number of participants restored.
    pub async fn restore(&self, snapshots: &[QueueSnapshot]) -> Result<usize> {
        let mut restored = 0;

        for snapshot in snapshots {
            let mut guard = self.lock(snapshot.channel_id).await?;
            let stale = guard.clear();
            self.membership.release_all(&stale, snapshot.channel_id)?;

            let mut queue = ChannelQueue::from_snapshot(snapshot);
            let candidates = queue.participants().to_vec();
            for participant_id in candidates {
                if let Err(e) = self.membership.claim(participant_id, snapshot.channel_id) {
                    warn!(
                        channel_id = snapshot.channel_id,
                        participant_id,
                        "Dropping participant during restore: {}",
                        e
                    );
                    queue.remove(participant_id);
                }
            }

            restored += queue.len();
            *guard = queue;
        }

        info!(
            queues = snapshots.len(),
            participants = restored,
            "Restored queues from snapshots"
        );
        Ok(restored)
    }

    /// Channels referenced so far
    pub fn channels(&self) -> Result<Vec<ChannelId>> {
        let queues = self.queues.read().map_err(|_| lock_poisoned("queues"))?;
        let mut channels: Vec<ChannelId> = queues.keys().copied().collect();
        channels.sort_unstable();
        Ok(channels)
    }

    /// Participants currently queued across every channel
    pub fn total_waiting(&self) -> usize {
        self.membership.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::matchmaking_error;
    use crate::utils::current_timestamp;

    fn registry() -> QueueRegistry {
        QueueRegistry::new(Arc::new(MembershipIndex::new()))
    }

    #[tokio::test]
    async fn test_enroll_appends_and_claims() {
        let registry = registry();
        let mut queue = registry.lock(1).await.unwrap();

        assert_eq!(registry.enroll(&mut queue, 10).unwrap(), 1);
        assert_eq!(registry.enroll(&mut queue, 11).unwrap(), 2);
        assert_eq!(queue.participants(), &[10, 11]);
        assert_eq!(registry.membership().owner_of(10).unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_enroll_twice_same_channel() {
        let registry = registry();
        let mut queue = registry.lock(1).await.unwrap();
        registry.enroll(&mut queue, 10).unwrap();

        let err = registry.enroll(&mut queue, 10).unwrap_err();
        assert_eq!(
            matchmaking_error(&err),
            Some(&MatchmakingError::AlreadyQueued { participant_id: 10 })
        );
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_enroll_elsewhere_is_rejected() {
        let registry = registry();
        {
            let mut first = registry.lock(1).await.unwrap();
            registry.enroll(&mut first, 10).unwrap();
        }

        let mut second = registry.lock(2).await.unwrap();
        let err = registry.enroll(&mut second, 10).unwrap_err();
        assert_eq!(
            matchmaking_error(&err),
            Some(&MatchmakingError::AlreadyQueuedElsewhere {
                participant_id: 10,
                channel_id: 1
            })
        );
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_releases_and_detaches_lobby_when_empty() {
        let registry = registry();
        let mut queue = registry.lock(1).await.unwrap();
        registry.enroll(&mut queue, 10).unwrap();
        registry.enroll(&mut queue, 11).unwrap();
        queue.set_lobby(Some(500));

        assert_eq!(registry.withdraw(&mut queue, 10).unwrap(), (1, None));
        assert_eq!(registry.membership().owner_of(10).unwrap(), None);

        assert_eq!(registry.withdraw(&mut queue, 11).unwrap(), (0, Some(500)));
        assert_eq!(queue.lobby(), None);
    }

    #[tokio::test]
    async fn test_withdraw_absent_participant() {
        let registry = registry();
        let mut queue = registry.lock(1).await.unwrap();
        let err = registry.withdraw(&mut queue, 10).unwrap_err();
        assert_eq!(
            matchmaking_error(&err),
            Some(&MatchmakingError::NotQueued { participant_id: 10 })
        );
    }

    #[tokio::test]
    async fn test_reset_releases_everyone() {
        let registry = registry();
        let mut queue = registry.lock(1).await.unwrap();
        for id in [1, 2, 3] {
            registry.enroll(&mut queue, id).unwrap();
        }
        queue.set_lobby(Some(9));
        queue.set_announcement(Some(77));

        assert_eq!(registry.reset(&mut queue, ResetKind::Cancel).unwrap(), (3, Some(9)));
        assert!(queue.is_empty());
        assert_eq!(queue.announcement(), Some(77));
        assert!(registry.membership().is_empty());

        registry.enroll(&mut queue, 1).unwrap();
        registry.reset(&mut queue, ResetKind::Setup).unwrap();
        assert_eq!(queue.announcement(), None);
    }

    #[tokio::test]
    async fn test_restore_first_snapshot_wins() {
        let registry = registry();
        let snapshots = vec![
            QueueSnapshot {
                channel_id: 1,
                participants: vec![10, 11],
                announcement: Some(100),
                lobby: None,
                updated_at: current_timestamp(),
            },
            QueueSnapshot {
                channel_id: 2,
                participants: vec![11, 12],
                announcement: None,
                lobby: Some(55),
                updated_at: current_timestamp(),
            },
        ];

        assert_eq!(registry.restore(&snapshots).await.unwrap(), 3);

        let first = registry.lock(1).await.unwrap();
        assert_eq!(first.participants(), &[10, 11]);
        assert_eq!(first.announcement(), Some(100));
        drop(first);

        let second = registry.lock(2).await.unwrap();
        assert_eq!(second.participants(), &[12]);
        assert_eq!(second.lobby(), Some(55));
        drop(second);

        assert_eq!(registry.membership().owner_of(11).unwrap(), Some(1));
        assert_eq!(registry.total_waiting(), 3);
        assert_eq!(registry.channels().unwrap(), vec![1, 2]);
    }
}
