//! JSON file snapshot store
//!
//! Keeps `queues.json` and `matches.json` under a data directory. Each write
//! rewrites the whole file through a temporary file and a rename, so a crash
//! mid-write leaves the previous version in place. Writes are serialized by an
//! async mutex.

use crate::error::{MatchmakingError, Result};
use crate::storage::SnapshotStore;
use crate::types::{ChannelId, MatchRecord, QueueSnapshot, ResourceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

const QUEUES_FILE: &str = "queues.json";
const MATCHES_FILE: &str = "matches.json";

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| unavailable(&dir, e))?;
        debug!(dir = %dir.display(), "Opened JSON snapshot store");
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_file<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Ok(T::default()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                anyhow::Error::from(MatchmakingError::ResourceUnavailable {
                    message: format!("Corrupt {}: {}", path.display(), e),
                })
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    async fn write_file<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{}.tmp", name));
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize {}: {}", name, e),
            }
        })?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| unavailable(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| unavailable(&path, e))?;
        Ok(())
    }

    async fn read_queues(&self) -> Result<BTreeMap<ChannelId, QueueSnapshot>> {
        let snapshots: Vec<QueueSnapshot> = self.read_file(QUEUES_FILE).await?;
        Ok(snapshots
            .into_iter()
            .map(|snapshot| (snapshot.channel_id, snapshot))
            .collect())
    }
}

fn unavailable(path: &Path, error: std::io::Error) -> anyhow::Error {
    MatchmakingError::ResourceUnavailable {
        message: format!("{}: {}", path.display(), error),
    }
    .into()
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn upsert_queue_snapshot(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut queues = self.read_queues().await?;
        queues.insert(snapshot.channel_id, snapshot.clone());
        let snapshots: Vec<&QueueSnapshot> = queues.values().collect();
        self.write_file(QUEUES_FILE, &snapshots).await
    }

    async fn load_all_queue_snapshots(&self) -> Result<Vec<QueueSnapshot>> {
        let _guard = self.write_lock.lock().await;
        Ok(self.read_queues().await?.into_values().collect())
    }

    async fn insert_match_record(&self, record: &MatchRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<MatchRecord> = self.read_file(MATCHES_FILE).await?;
        records.push(record.clone());
        self.write_file(MATCHES_FILE, &records).await
    }

    async fn mark_match_deleted(&self, session: ResourceId, at: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut records: Vec<MatchRecord> = self.read_file(MATCHES_FILE).await?;
        let mut updated = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.session == Some(session) && r.deleted_at.is_none())
        {
            record.deleted_at = Some(at);
            updated += 1;
        }
        if updated > 0 {
            self.write_file(MATCHES_FILE, &records).await?;
        }
        Ok(updated)
    }

    async fn load_match_records(&self) -> Result<Vec<MatchRecord>> {
        let _guard = self.write_lock.lock().await;
        self.read_file(MATCHES_FILE).await
    }
}
