//! Persistence collaborator
//!
//! The core writes a queue snapshot after every committed mutation and a match
//! record after every formation. Writes are eventually consistent: a failed
//! write is logged by the caller and never rolls back in-memory state.

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::InMemorySnapshotStore;

use crate::error::Result;
use crate::types::{MatchRecord, QueueSnapshot, ResourceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable sink for queue snapshots and match records
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert or replace the snapshot for `snapshot.channel_id`
    async fn upsert_queue_snapshot(&self, snapshot: &QueueSnapshot) -> Result<()>;

    /// Every stored queue snapshot, ordered by channel id
    async fn load_all_queue_snapshots(&self) -> Result<Vec<QueueSnapshot>>;

    /// Append a match record
    async fn insert_match_record(&self, record: &MatchRecord) -> Result<()>;

    /// Stamp the deletion time on every open record for the session.
    /// Returns the number of records updated.
    async fn mark_match_deleted(&self, session: ResourceId, at: DateTime<Utc>) -> Result<usize>;

    /// Every stored match record, oldest first
    async fn load_match_records(&self) -> Result<Vec<MatchRecord>>;
}
