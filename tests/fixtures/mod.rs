//! Shared setup for the integration tests

#![allow(dead_code)]

use channel_matchmaker::config::{QueueConfig, SessionLifecycleConfig};
use channel_matchmaker::metrics::MetricsCollector;
use channel_matchmaker::platform::InMemoryPlatform;
use channel_matchmaker::queue::QueueManager;
use channel_matchmaker::storage::InMemorySnapshotStore;
use channel_matchmaker::types::{ChannelId, ParticipantId, QueueSnapshot};
use channel_matchmaker::utils::current_timestamp;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A queue manager wired to in-memory collaborators the test can inspect
pub struct TestSystem {
    pub manager: QueueManager,
    pub platform: Arc<InMemoryPlatform>,
    pub store: Arc<InMemorySnapshotStore>,
    pub metrics: Arc<MetricsCollector>,
}

/// Capacity `capacity`, no cooldowns, default session lifecycle
pub fn create_test_system(capacity: usize) -> TestSystem {
    create_test_system_with(
        QueueConfig::without_cooldowns(capacity),
        SessionLifecycleConfig::default(),
    )
}

pub fn create_test_system_with(
    queue_config: QueueConfig,
    session_config: SessionLifecycleConfig,
) -> TestSystem {
    create_test_system_from_store(
        queue_config,
        session_config,
        Arc::new(InMemorySnapshotStore::new()),
    )
}

pub fn create_test_system_from_store(
    queue_config: QueueConfig,
    session_config: SessionLifecycleConfig,
    store: Arc<InMemorySnapshotStore>,
) -> TestSystem {
    let platform = Arc::new(InMemoryPlatform::new());
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let manager = QueueManager::new(
        queue_config,
        session_config,
        platform.clone(),
        store.clone(),
        metrics.clone(),
    )
    .unwrap();

    TestSystem {
        manager,
        platform,
        store,
        metrics,
    }
}

pub fn session_config(delete_after_secs: u64, warn_before_secs: u64) -> SessionLifecycleConfig {
    SessionLifecycleConfig {
        delete_after: Duration::from_secs(delete_after_secs),
        warn_before: Duration::from_secs(warn_before_secs),
    }
}

pub fn snapshot(channel_id: ChannelId, participants: Vec<ParticipantId>) -> QueueSnapshot {
    QueueSnapshot {
        channel_id,
        participants,
        announcement: None,
        lobby: None,
        updated_at: current_timestamp(),
    }
}

/// Queue contents of every channel the manager knows about
pub async fn queue_contents(manager: &QueueManager) -> HashMap<ChannelId, Vec<ParticipantId>> {
    let mut contents = HashMap::new();
    for channel_id in manager.registry().channels().unwrap() {
        let status = manager.status(channel_id).await.unwrap();
        contents.insert(channel_id, status.participants);
    }
    contents
}

/// Every queued participant appears in exactly one queue, and the membership
/// index agrees with the queues
pub async fn assert_single_ownership(manager: &QueueManager) {
    let contents = queue_contents(manager).await;

    let mut owners: HashMap<ParticipantId, ChannelId> = HashMap::new();
    for (channel_id, participants) in &contents {
        for participant in participants {
            if let Some(other) = owners.insert(*participant, *channel_id) {
                panic!(
                    "participant {} queued in both {} and {}",
                    participant, other, channel_id
                );
            }
        }
    }

    let entries = manager.membership().entries().unwrap();
    assert_eq!(entries, owners, "membership index disagrees with queues");
}
