//! Queue manager: the command surface of the matchmaking core
//!
//! Composes the registry, match formation, cooldowns, persistence, the chat
//! platform and the session scheduler. Queue mutations and their snapshot
//! writes happen inside the channel exclusion; platform calls that only
//! follow from a committed mutation (member grants, match notices, teardown,
//! scheduling) run after the exclusion is released.

use crate::config::{QueueConfig, SessionLifecycleConfig};
use crate::cooldown::RateLimiter;
use crate::error::{lock_poisoned, matchmaking_error, MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::platform::{ChatPlatform, PlatformCoordinator};
use crate::queue::instance::ChannelQueue;
use crate::queue::matching::{FifoMatchFormation, MatchFormation};
use crate::queue::membership::MembershipIndex;
use crate::queue::registry::QueueRegistry;
use crate::session::{LifecyclePlan, SessionScheduler};
use crate::storage::SnapshotStore;
use crate::types::{
    ActionKind, ChannelId, CoordinationResource, EnrollOutcome, MatchFormed, MessageId,
    ParticipantId, QueueSnapshot, QueueStatus, ResetKind, ResetOutcome, ResourceId, WithdrawOutcome,
};
use crate::utils::{current_timestamp, format_mentions, generate_match_id};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const MATCH_READY_NOTICE: &str = "Queue full - match ready!";
pub const NO_SESSION_NOTICE: &str = "Queue is full! (match session unavailable)";
pub const QUEUE_EMPTIED_REASON: &str = "Queue emptied before match.";

/// Statistics about queue manager operations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueManagerStats {
    pub enrollments: u64,
    pub withdrawals: u64,
    pub resets: u64,
    pub matches_formed: u64,
    pub participants_matched: u64,
    /// Actions refused with a user-attributable error
    pub rejected: u64,
    pub participants_waiting: usize,
    pub active_sessions: usize,
    pub channels: usize,
}

/// Coordinates every channel queue in the process
#[derive(Clone)]
pub struct QueueManager {
    registry: Arc<QueueRegistry>,
    formation: Arc<dyn MatchFormation>,
    limiter: Arc<RateLimiter>,
    scheduler: SessionScheduler,
    coordinator: PlatformCoordinator,
    store: Arc<dyn SnapshotStore>,
    plan: LifecyclePlan,
    stats: Arc<RwLock<QueueManagerStats>>,
    metrics: Arc<MetricsCollector>,
}

impl QueueManager {
    /// Create a queue manager with FIFO match formation
    pub fn new(
        queue_config: QueueConfig,
        session_config: SessionLifecycleConfig,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn SnapshotStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        queue_config.validate()?;
        let formation = Arc::new(FifoMatchFormation::new(queue_config.capacity));
        Ok(Self::with_formation(
            &queue_config,
            &session_config,
            formation,
            platform,
            store,
            metrics,
        ))
    }

    /// Create with a custom match formation strategy
    pub fn with_formation(
        queue_config: &QueueConfig,
        session_config: &SessionLifecycleConfig,
        formation: Arc<dyn MatchFormation>,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn SnapshotStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let coordinator = PlatformCoordinator::new(platform, metrics.clone());
        let scheduler = SessionScheduler::new(coordinator.clone(), store.clone(), metrics.clone());

        Self {
            registry: Arc::new(QueueRegistry::new(Arc::new(MembershipIndex::new()))),
            formation,
            limiter: Arc::new(RateLimiter::from_config(queue_config)),
            scheduler,
            coordinator,
            store,
            plan: LifecyclePlan::from_config(session_config),
            stats: Arc::new(RwLock::new(QueueManagerStats::default())),
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    pub fn membership(&self) -> &Arc<MembershipIndex> {
        self.registry.membership()
    }

    pub fn scheduler(&self) -> &SessionScheduler {
        &self.scheduler
    }

    pub fn capacity(&self) -> usize {
        self.formation.capacity()
    }

    /// Add a participant to a channel's queue, forming a match when it fills
    pub async fn enroll(
        &self,
        channel_id: ChannelId,
        participant_id: ParticipantId,
    ) -> Result<EnrollOutcome> {
        let timer = self.metrics.start_timer();
        let result = self.enroll_inner(channel_id, participant_id).await;

        match &result {
            Ok(outcome) => {
                self.metrics.record_enroll(timer.stop());
                self.bump(|stats| {
                    stats.enrollments += 1;
                    if let Some(formed) = &outcome.formed {
                        stats.matches_formed += 1;
                        stats.participants_matched += formed.participants.len() as u64;
                    }
                });
            }
            Err(e) => self.note_failure("enroll", channel_id, participant_id, e),
        }
        self.metrics
            .set_participants_waiting(self.registry.total_waiting());
        result
    }

    async fn enroll_inner(
        &self,
        channel_id: ChannelId,
        participant_id: ParticipantId,
    ) -> Result<EnrollOutcome> {
        let now = Instant::now();
        let mut queue = self.registry.lock(channel_id).await?;

        if let Some(remaining) = self.limiter.check(participant_id, ActionKind::Enroll, now)? {
            return Err(MatchmakingError::RateLimited {
                action: ActionKind::Enroll,
                remaining,
            }
            .into());
        }

        let queue_size = self.registry.enroll(&mut queue, participant_id)?;
        self.limiter.mark(participant_id, ActionKind::Enroll, now)?;
        info!(channel_id, participant_id, queue_size, "Participant enrolled");

        let (lobby, lobby_created) = self.attach_lobby(&mut queue).await;
        let enrolled: Vec<ParticipantId> = queue.participants().to_vec();
        self.persist(&queue).await;

        let formed = match self
            .formation
            .try_form(&mut queue, self.registry.membership())?
        {
            Some(participants) => {
                let formed = MatchFormed {
                    match_id: generate_match_id(),
                    channel_id,
                    participants,
                    session: queue.take_lobby(),
                    formed_at: current_timestamp(),
                };
                self.persist(&queue).await;
                info!(
                    channel_id,
                    match_id = %formed.match_id,
                    session_id = ?formed.session,
                    "Match formed"
                );
                Some(formed)
            }
            None => None,
        };
        let remainder: Vec<ParticipantId> = queue.participants().to_vec();
        drop(queue);

        if let Some(lobby) = &lobby {
            if lobby_created {
                self.coordinator.add_members(lobby, &enrolled).await;
            } else {
                self.coordinator.add_members(lobby, &[participant_id]).await;
            }
        }

        if let Some(formed) = &formed {
            self.hand_off(formed, lobby.as_ref(), &remainder).await;
        }

        Ok(EnrollOutcome {
            queue_size,
            remaining: remainder.len(),
            formed,
        })
    }

    /// Make sure the queue has a live lobby, creating one if the recorded one
    /// is missing. Returns the lobby and whether it was just created.
    async fn attach_lobby(
        &self,
        queue: &mut ChannelQueue,
    ) -> (Option<CoordinationResource>, bool) {
        if let Some(lobby_id) = queue.lobby() {
            match self.coordinator.resolve(lobby_id).await {
                Some(resource) => return (Some(resource), false),
                None => {
                    debug!(
                        channel_id = queue.channel_id(),
                        resource_id = lobby_id,
                        "Recorded lobby is gone, opening a new one"
                    );
                    queue.set_lobby(None);
                }
            }
        }

        match self.coordinator.open_lobby(queue.channel_id()).await {
            Some(resource) => {
                queue.set_lobby(Some(resource.id));
                (Some(resource), true)
            }
            None => (None, false),
        }
    }

    /// Side effects of a formed match, run outside the exclusion
    async fn hand_off(
        &self,
        formed: &MatchFormed,
        lobby: Option<&CoordinationResource>,
        remainder: &[ParticipantId],
    ) {
        let mentions = format_mentions(&formed.participants);

        match (formed.session, lobby) {
            (Some(session), Some(resource)) => {
                self.coordinator.remove_members(resource, remainder).await;
                self.coordinator
                    .notify(session, &format!("{} {}", MATCH_READY_NOTICE, mentions))
                    .await;
            }
            _ => {
                self.coordinator
                    .notify(
                        formed.channel_id,
                        &format!("{} {}", NO_SESSION_NOTICE, mentions),
                    )
                    .await;
            }
        }

        if let Err(e) = self.store.insert_match_record(&formed.to_record()).await {
            warn!(
                channel_id = formed.channel_id,
                match_id = %formed.match_id,
                "Failed to record match: {}",
                e
            );
            self.metrics.record_side_effect_failure("insert_match_record");
        }

        if let Some(session) = formed.session {
            if let Err(e) = self.scheduler.schedule(session, self.plan) {
                warn!(session_id = session, "Failed to schedule session lifecycle: {}", e);
            }
        }

        self.metrics.record_match_formed(formed.participants.len());
    }

    /// Remove a participant from a channel's queue
    pub async fn withdraw(
        &self,
        channel_id: ChannelId,
        participant_id: ParticipantId,
    ) -> Result<WithdrawOutcome> {
        let timer = self.metrics.start_timer();
        let result = self.withdraw_inner(channel_id, participant_id).await;

        match &result {
            Ok(_) => {
                self.metrics.record_withdraw(timer.stop());
                self.bump(|stats| stats.withdrawals += 1);
            }
            Err(e) => self.note_failure("withdraw", channel_id, participant_id, e),
        }
        self.metrics
            .set_participants_waiting(self.registry.total_waiting());
        result
    }

    async fn withdraw_inner(
        &self,
        channel_id: ChannelId,
        participant_id: ParticipantId,
    ) -> Result<WithdrawOutcome> {
        let now = Instant::now();
        let mut queue = self.registry.lock(channel_id).await?;

        if let Some(remaining) = self.limiter.check(participant_id, ActionKind::Withdraw, now)? {
            return Err(MatchmakingError::RateLimited {
                action: ActionKind::Withdraw,
                remaining,
            }
            .into());
        }

        let (queue_size, closed_lobby) = self.registry.withdraw(&mut queue, participant_id)?;
        self.limiter.mark(participant_id, ActionKind::Withdraw, now)?;
        info!(channel_id, participant_id, queue_size, "Participant withdrew");

        let current_lobby = queue.lobby();
        self.persist(&queue).await;
        drop(queue);

        if let Some(lobby_id) = closed_lobby {
            if let Err(e) = self
                .scheduler
                .teardown_now(lobby_id, QUEUE_EMPTIED_REASON)
                .await
            {
                warn!(channel_id, resource_id = lobby_id, "Failed to close lobby: {}", e);
            }
        } else if let Some(lobby_id) = current_lobby {
            match self.coordinator.resolve(lobby_id).await {
                Some(resource) => {
                    self.coordinator
                        .remove_members(&resource, &[participant_id])
                        .await;
                }
                None => self.forget_vanished_lobby(channel_id, lobby_id).await,
            }
        }

        Ok(WithdrawOutcome {
            queue_size,
            closed_lobby,
        })
    }

    /// Briefly re-enter the exclusion to drop a lobby handle whose resource
    /// disappeared, unless the handle moved on in the meantime
    async fn forget_vanished_lobby(&self, channel_id: ChannelId, lobby_id: ResourceId) {
        let mut queue = match self.registry.lock(channel_id).await {
            Ok(queue) => queue,
            Err(e) => {
                warn!(channel_id, "Failed to re-enter queue: {}", e);
                return;
            }
        };
        if queue.clear_lobby_if(lobby_id) {
            debug!(channel_id, resource_id = lobby_id, "Cleared vanished lobby");
            self.persist(&queue).await;
        }
    }

    /// Administrative clear of a channel's queue
    pub async fn reset(&self, channel_id: ChannelId, kind: ResetKind) -> Result<ResetOutcome> {
        let timer = self.metrics.start_timer();

        let (cleared, closed_lobby) = {
            let mut queue = self.registry.lock(channel_id).await?;
            let result = self.registry.reset(&mut queue, kind)?;
            self.persist(&queue).await;
            result
        };
        info!(channel_id, cleared, kind = ?kind, "Queue reset");

        if let Some(lobby_id) = closed_lobby {
            if let Err(e) = self.scheduler.teardown_now(lobby_id, kind.reason()).await {
                warn!(channel_id, resource_id = lobby_id, "Failed to close lobby: {}", e);
            }
        }

        self.metrics.record_reset(kind, timer.stop());
        self.metrics
            .set_participants_waiting(self.registry.total_waiting());
        self.bump(|stats| stats.resets += 1);

        Ok(ResetOutcome {
            cleared,
            closed_lobby,
        })
    }

    /// Current queue contents for the caller to render
    pub async fn status(&self, channel_id: ChannelId) -> Result<QueueStatus> {
        let queue = self.registry.lock(channel_id).await?;
        Ok(queue.status(self.capacity()))
    }

    /// Record the announcement message the caller renders for this queue
    pub async fn set_announcement(
        &self,
        channel_id: ChannelId,
        announcement: Option<MessageId>,
    ) -> Result<()> {
        let mut queue = self.registry.lock(channel_id).await?;
        queue.set_announcement(announcement);
        self.persist(&queue).await;
        Ok(())
    }

    /// Rehydrate queues from snapshots. Call before accepting any action.
    pub async fn restore(&self, snapshots: &[QueueSnapshot]) -> Result<usize> {
        let timer = self.metrics.start_timer();
        let restored = self.registry.restore(snapshots).await?;
        self.metrics.record_restore(timer.stop());
        self.metrics
            .set_participants_waiting(self.registry.total_waiting());
        Ok(restored)
    }

    /// Load every snapshot from the store and restore from it
    pub async fn restore_from_store(&self) -> Result<usize> {
        let snapshots = self.store.load_all_queue_snapshots().await?;
        self.restore(&snapshots).await
    }

    /// Cancel every scheduled session task
    pub fn shutdown(&self) -> Result<usize> {
        self.scheduler.cancel_all()
    }

    pub fn stats(&self) -> Result<QueueManagerStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| lock_poisoned("stats"))?
            .clone();
        stats.participants_waiting = self.registry.total_waiting();
        stats.active_sessions = self.scheduler.active_count();
        stats.channels = self.registry.channels()?.len();
        Ok(stats)
    }

    async fn persist(&self, queue: &ChannelQueue) {
        if let Err(e) = self.store.upsert_queue_snapshot(&queue.snapshot()).await {
            warn!(
                channel_id = queue.channel_id(),
                "Failed to persist queue snapshot: {}", e
            );
            self.metrics.record_side_effect_failure("upsert_queue_snapshot");
        }
    }

    /// Update counters for an action that already happened. A failure here
    /// is logged and never changes the action's outcome.
    fn bump(&self, update: impl FnOnce(&mut QueueManagerStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => warn!("Failed to update queue stats: {}", lock_poisoned("stats")),
        }
    }

    fn note_failure(
        &self,
        operation: &str,
        channel_id: ChannelId,
        participant_id: ParticipantId,
        error: &anyhow::Error,
    ) {
        match matchmaking_error(error) {
            Some(e) if e.is_user_error() => {
                debug!(channel_id, participant_id, "{} rejected: {}", operation, e);
                self.metrics.record_rejection(e);
                self.bump(|stats| stats.rejected += 1);
            }
            _ => warn!(channel_id, participant_id, "{} failed: {}", operation, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::InMemoryPlatform;
    use crate::storage::InMemorySnapshotStore;
    use std::time::Duration;

    struct Harness {
        platform: Arc<InMemoryPlatform>,
        store: Arc<InMemorySnapshotStore>,
        manager: QueueManager,
    }

    fn harness_with(queue_config: QueueConfig) -> Harness {
        let platform = Arc::new(InMemoryPlatform::new());
        let store = Arc::new(InMemorySnapshotStore::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let manager = QueueManager::new(
            queue_config,
            SessionLifecycleConfig::default(),
            platform.clone(),
            store.clone(),
            metrics,
        )
        .unwrap();
        Harness {
            platform,
            store,
            manager,
        }
    }

    fn harness(capacity: usize) -> Harness {
        harness_with(QueueConfig::without_cooldowns(capacity))
    }

    fn kind_of(err: &anyhow::Error) -> Option<&'static str> {
        matchmaking_error(err).map(|e| e.kind())
    }

    #[tokio::test]
    async fn test_rejects_zero_capacity() {
        let result = QueueManager::new(
            QueueConfig::without_cooldowns(0),
            SessionLifecycleConfig::default(),
            Arc::new(InMemoryPlatform::new()),
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(MetricsCollector::new().unwrap()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_enroll_opens_lobby_and_persists() {
        let h = harness(3);
        let outcome = h.manager.enroll(1, 10).await.unwrap();
        assert_eq!(outcome.queue_size, 1);
        assert_eq!(outcome.remaining, 1);
        assert!(outcome.formed.is_none());

        let status = h.manager.status(1).await.unwrap();
        let lobby = status.lobby.unwrap();
        assert_eq!(h.platform.members_of(lobby), vec![10]);

        let snapshot = h.store.snapshot(1).unwrap();
        assert_eq!(snapshot.participants, vec![10]);
        assert_eq!(snapshot.lobby, Some(lobby));
    }

    #[tokio::test]
    async fn test_fifo_match_formation() {
        let h = harness(3);
        // A, B, C fill the queue; D starts the next one
        for id in [1, 2, 3] {
            h.manager.enroll(5, id).await.unwrap();
        }
        let records = h.store.load_match_records().await.unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.participants, vec![1, 2, 3]);
        let session = record.session.unwrap();
        assert_eq!(h.manager.scheduler().active_count(), 1);
        assert!(h.platform.messages_to(session)[1].starts_with(MATCH_READY_NOTICE));

        let outcome = h.manager.enroll(5, 4).await.unwrap();
        assert!(outcome.formed.is_none());
        let status = h.manager.status(5).await.unwrap();
        assert_eq!(status.participants, vec![4]);
        assert_ne!(status.lobby, Some(session));

        for id in [1, 2, 3] {
            assert_eq!(h.manager.membership().owner_of(id).unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_formation_outcome_fields() {
        let h = harness(2);
        h.manager.enroll(5, 1).await.unwrap();
        let outcome = h.manager.enroll(5, 2).await.unwrap();

        assert_eq!(outcome.queue_size, 2);
        assert_eq!(outcome.remaining, 0);
        let formed = outcome.formed.unwrap();
        assert_eq!(formed.participants, vec![1, 2]);
        assert!(formed.session.is_some());
        assert_eq!(h.manager.stats().unwrap().matches_formed, 1);
    }

    #[tokio::test]
    async fn test_double_enroll_errors() {
        let h = harness(5);
        h.manager.enroll(1, 10).await.unwrap();

        let err = h.manager.enroll(1, 10).await.unwrap_err();
        assert_eq!(kind_of(&err), Some("already_queued"));

        let err = h.manager.enroll(2, 10).await.unwrap_err();
        assert_eq!(kind_of(&err), Some("already_queued_elsewhere"));
        assert_eq!(h.manager.stats().unwrap().rejected, 2);
    }

    #[tokio::test]
    async fn test_withdraw_then_reenroll() {
        let h = harness(5);
        h.manager.enroll(1, 10).await.unwrap();
        h.manager.enroll(1, 11).await.unwrap();
        h.manager.withdraw(1, 10).await.unwrap();
        h.manager.enroll(1, 10).await.unwrap();

        let status = h.manager.status(1).await.unwrap();
        assert_eq!(status.participants, vec![11, 10]);
    }

    #[tokio::test]
    async fn test_poisoned_stats_do_not_fail_committed_actions() {
        let h = harness(2);
        let stats = h.manager.stats.clone();
        let _ = std::thread::spawn(move || {
            let _guard = stats.write().unwrap();
            panic!("poison stats lock");
        })
        .join();
        assert!(h.manager.stats().is_err());

        h.manager.enroll(1, 10).await.unwrap();
        h.manager.withdraw(1, 10).await.unwrap();
        h.manager.enroll(1, 10).await.unwrap();
        let outcome = h.manager.enroll(1, 11).await.unwrap();
        assert!(outcome.formed.is_some());
        h.manager.reset(1, ResetKind::Cancel).await.unwrap();

        // User errors keep their own kind
        let err = h.manager.withdraw(1, 10).await.unwrap_err();
        assert_eq!(kind_of(&err), Some("not_queued"));
    }

    #[tokio::test]
    async fn test_withdraw_absent_is_not_queued() {
        let h = harness(5);
        let err = h.manager.withdraw(1, 10).await.unwrap_err();
        assert_eq!(kind_of(&err), Some("not_queued"));
    }

    #[tokio::test]
    async fn test_last_withdraw_closes_lobby() {
        let h = harness(5);
        h.manager.enroll(1, 10).await.unwrap();
        let lobby = h.manager.status(1).await.unwrap().lobby.unwrap();

        let outcome = h.manager.withdraw(1, 10).await.unwrap();
        assert_eq!(outcome.queue_size, 0);
        assert_eq!(outcome.closed_lobby, Some(lobby));
        assert_eq!(h.platform.delete_calls(lobby), 1);
        assert_eq!(h.manager.status(1).await.unwrap().lobby, None);
    }

    #[tokio::test]
    async fn test_withdraw_forgets_vanished_lobby() {
        let h = harness(5);
        h.manager.enroll(1, 10).await.unwrap();
        h.manager.enroll(1, 11).await.unwrap();
        let lobby = h.manager.status(1).await.unwrap().lobby.unwrap();
        h.platform.vanish(lobby);

        h.manager.withdraw(1, 10).await.unwrap();
        assert_eq!(h.manager.status(1).await.unwrap().lobby, None);
        assert_eq!(h.store.snapshot(1).unwrap().lobby, None);
    }

    #[tokio::test]
    async fn test_enroll_replaces_vanished_lobby_and_grants_whole_queue() {
        let h = harness(5);
        h.manager.enroll(1, 10).await.unwrap();
        let first = h.manager.status(1).await.unwrap().lobby.unwrap();
        h.platform.vanish(first);

        h.manager.enroll(1, 11).await.unwrap();
        let second = h.manager.status(1).await.unwrap().lobby.unwrap();
        assert_ne!(first, second);
        assert_eq!(h.platform.members_of(second), vec![10, 11]);
    }

    #[tokio::test]
    async fn test_enroll_survives_platform_outage() {
        let h = harness(2);
        h.platform.set_unavailable(true);

        h.manager.enroll(1, 10).await.unwrap();
        let outcome = h.manager.enroll(1, 11).await.unwrap();
        let formed = outcome.formed.unwrap();
        assert_eq!(formed.session, None);
        assert_eq!(h.manager.scheduler().active_count(), 0);

        let records = h.store.load_match_records().await.unwrap();
        assert_eq!(records[0].session, None);
    }

    #[tokio::test]
    async fn test_store_failure_keeps_in_memory_state() {
        let h = harness(5);
        h.store.set_failing(true);
        h.manager.enroll(1, 10).await.unwrap();
        assert_eq!(h.manager.status(1).await.unwrap().participants, vec![10]);
    }

    #[tokio::test]
    async fn test_reset_releases_membership_and_closes_lobby() {
        let h = harness(5);
        for id in [1, 2, 3] {
            h.manager.enroll(1, id).await.unwrap();
        }
        h.manager.set_announcement(1, Some(99)).await.unwrap();
        let lobby = h.manager.status(1).await.unwrap().lobby.unwrap();

        let outcome = h.manager.reset(1, ResetKind::Cancel).await.unwrap();
        assert_eq!(outcome.cleared, 3);
        assert_eq!(outcome.closed_lobby, Some(lobby));
        assert_eq!(h.platform.delete_calls(lobby), 1);
        assert_eq!(h.manager.status(1).await.unwrap().announcement, Some(99));

        for id in [1, 2, 3] {
            h.manager.enroll(2, id).await.unwrap();
        }
        assert_eq!(h.manager.status(2).await.unwrap().participants, vec![1, 2, 3]);

        h.manager.reset(2, ResetKind::Setup).await.unwrap();
        assert_eq!(h.manager.status(2).await.unwrap().announcement, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_gate() {
        let h = harness_with(QueueConfig {
            capacity: 10,
            enroll_cooldown: Duration::from_secs(5),
            withdraw_cooldown: Duration::from_secs(5),
        });
        h.manager.enroll(1, 10).await.unwrap();
        h.manager.withdraw(1, 10).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        let err = h.manager.enroll(1, 10).await.unwrap_err();
        match matchmaking_error(&err) {
            Some(MatchmakingError::RateLimited { action, remaining }) => {
                assert_eq!(*action, ActionKind::Enroll);
                assert_eq!(*remaining, Duration::from_secs(3));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        tokio::time::advance(Duration::from_secs(4)).await;
        h.manager.enroll(1, 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let platform = Arc::new(InMemoryPlatform::new());
        let store = Arc::new(InMemorySnapshotStore::with_snapshots(vec![QueueSnapshot {
            channel_id: 3,
            participants: vec![7, 8],
            announcement: Some(1),
            lobby: None,
            updated_at: current_timestamp(),
        }]));
        let manager = QueueManager::new(
            QueueConfig::without_cooldowns(3),
            SessionLifecycleConfig::default(),
            platform,
            store,
            Arc::new(MetricsCollector::new().unwrap()),
        )
        .unwrap();

        assert_eq!(manager.restore_from_store().await.unwrap(), 2);
        let err = manager.enroll(4, 7).await.unwrap_err();
        assert_eq!(kind_of(&err), Some("already_queued_elsewhere"));

        let outcome = manager.enroll(3, 9).await.unwrap();
        assert_eq!(outcome.formed.unwrap().participants, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_sessions() {
        let h = harness(1);
        h.manager.enroll(1, 10).await.unwrap();
        h.manager.enroll(2, 11).await.unwrap();
        assert_eq!(h.manager.scheduler().active_count(), 2);
        assert_eq!(h.manager.shutdown().unwrap(), 2);
        assert_eq!(h.manager.stats().unwrap().active_sessions, 0);
    }
}
