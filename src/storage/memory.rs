//! In-memory snapshot store

use crate::error::{lock_poisoned, MatchmakingError, Result};
use crate::storage::SnapshotStore;
use crate::types::{ChannelId, MatchRecord, QueueSnapshot, ResourceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// Snapshot store kept in process memory. Used when no data directory is
/// configured, and in tests where writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    queues: RwLock<BTreeMap<ChannelId, QueueSnapshot>>,
    matches: RwLock<Vec<MatchRecord>>,
    failing: AtomicBool,
    writes: AtomicU64,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with queue snapshots, as if left by a previous run
    pub fn with_snapshots(snapshots: Vec<QueueSnapshot>) -> Self {
        let store = Self::default();
        if let Ok(mut queues) = store.queues.write() {
            for snapshot in snapshots {
                queues.insert(snapshot.channel_id, snapshot);
            }
        }
        store
    }

    /// Make every subsequent call fail with `ResourceUnavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful writes of any kind
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Stored snapshot for one channel
    pub fn snapshot(&self, channel_id: ChannelId) -> Option<QueueSnapshot> {
        self.queues
            .read()
            .ok()
            .and_then(|queues| queues.get(&channel_id).cloned())
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MatchmakingError::ResourceUnavailable {
                message: "snapshot store unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn upsert_queue_snapshot(&self, snapshot: &QueueSnapshot) -> Result<()> {
        self.check_available()?;
        let mut queues = self.queues.write().map_err(|_| lock_poisoned("snapshot"))?;
        queues.insert(snapshot.channel_id, snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_all_queue_snapshots(&self) -> Result<Vec<QueueSnapshot>> {
        self.check_available()?;
        let queues = self.queues.read().map_err(|_| lock_poisoned("snapshot"))?;
        Ok(queues.values().cloned().collect())
    }

    async fn insert_match_record(&self, record: &MatchRecord) -> Result<()> {
        self.check_available()?;
        let mut matches = self.matches.write().map_err(|_| lock_poisoned("match record"))?;
        matches.push(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn mark_match_deleted(&self, session: ResourceId, at: DateTime<Utc>) -> Result<usize> {
        self.check_available()?;
        let mut matches = self.matches.write().map_err(|_| lock_poisoned("match record"))?;
        let mut updated = 0;
        for record in matches
            .iter_mut()
            .filter(|r| r.session == Some(session) && r.deleted_at.is_none())
        {
            record.deleted_at = Some(at);
            updated += 1;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn load_match_records(&self) -> Result<Vec<MatchRecord>> {
        self.check_available()?;
        let matches = self.matches.read().map_err(|_| lock_poisoned("match record"))?;
        Ok(matches.clone())
    }
}
