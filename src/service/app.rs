//! Main application state and service coordination
//!
//! `AppState` wires configuration, persistence, the chat platform and the
//! queue manager together, restores persisted queues before any action is
//! accepted, and owns the background tasks started by the service.

use crate::config::{validate_config, AppConfig};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::platform::{ChatPlatform, InMemoryPlatform};
use crate::queue::QueueManager;
use crate::storage::{InMemorySnapshotStore, JsonFileStore, SnapshotStore};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    queue_manager: QueueManager,

    platform: Arc<dyn ChatPlatform>,

    store: Arc<dyn SnapshotStore>,

    metrics: Arc<MetricsCollector>,

    /// Set once `start` has spawned it
    health_server: Mutex<Option<Arc<HealthServer>>>,

    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    is_running: Arc<RwLock<bool>>,

    /// Stops the periodic background tasks
    shutdown_token: CancellationToken,

    restored_participants: usize,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with the in-memory platform and the store
    /// selected by `storage.data_dir`
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn SnapshotStore> = match &config.storage.data_dir {
            Some(dir) => {
                info!("Using JSON snapshot store at {}", dir.display());
                let store = JsonFileStore::open(dir.clone())
                    .await
                    .map_err(|e| ServiceError::Storage {
                        message: format!("Failed to open snapshot store: {}", e),
                    })?;
                Arc::new(store)
            }
            None => {
                info!("No data directory configured, queue snapshots stay in memory");
                Arc::new(InMemorySnapshotStore::new())
            }
        };

        Self::with_components(config, Arc::new(InMemoryPlatform::new()), store).await
    }

    /// Initialize with explicit platform and store collaborators
    pub async fn with_components(
        config: AppConfig,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing channel-matchmaker service");
        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;
        info!(
            "Configuration: service={}, capacity={}, delete_after={}s, warn_before={}s",
            config.service.name,
            config.queue.capacity,
            config.session.delete_after_seconds,
            config.session.warn_before_seconds
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let queue_manager = QueueManager::new(
            config.queue_config(),
            config.session_config(),
            platform.clone(),
            store.clone(),
            metrics.clone(),
        )
        .map_err(|e| ServiceError::Initialization {
            message: format!("Failed to create queue manager: {}", e),
        })?;

        // Queues must be back in place before the first action arrives
        let restored_participants =
            queue_manager
                .restore_from_store()
                .await
                .map_err(|e| ServiceError::Storage {
                    message: format!("Failed to restore queue snapshots: {}", e),
                })?;
        info!(
            "Restored {} queued participant(s) from the snapshot store",
            restored_participants
        );

        Ok(Self {
            config,
            queue_manager,
            platform,
            store,
            metrics,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            shutdown_token: CancellationToken::new(),
            restored_participants,
            started_at: Instant::now(),
        })
    }

    /// Mark the service running and start the health server
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting channel-matchmaker service");

        self.mark_running().await;
        self.start_health_server().await?;
        self.start_background_tasks().await;

        info!("channel-matchmaker service started successfully");
        Ok(())
    }

    /// Accept actions without binding the health port
    pub async fn mark_running(&self) {
        *self.is_running.write().await = true;
        self.metrics.update_health_status(2);
    }

    async fn start_health_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let mut slot = self.health_server.lock().await;
        if slot.is_some() {
            return Err(ServiceError::BackgroundTask {
                message: "Health server is already running".to_string(),
            });
        }

        let server_config = HealthServerConfig {
            port: self.config.service.health_port,
            ..HealthServerConfig::default()
        };
        let server = Arc::new(
            HealthServer::new(server_config, self.metrics.clone()).with_app_state(self.clone()),
        );

        let task_server = server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = task_server.start().await {
                error!("Health server failed: {}", e);
            }
        });

        *slot = Some(server);
        self.background_tasks.lock().await.push(handle);
        info!(
            "Health server started on port {}",
            self.config.service.health_port
        );
        Ok(())
    }

    async fn start_background_tasks(&self) {
        let metrics = self.metrics.clone();
        let queue_manager = self.queue_manager.clone();
        let token = self.shutdown_token.clone();
        let started_at = self.started_at;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                metrics.update_uptime(started_at.elapsed());
                match queue_manager.stats() {
                    Ok(stats) => debug!(
                        "Queue stats: {} channel(s), {} waiting, {} active session(s)",
                        stats.channels, stats.participants_waiting, stats.active_sessions
                    ),
                    Err(e) => warn!("Failed to read queue stats: {}", e),
                }
            }
        });

        self.background_tasks.lock().await.push(handle);
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of channel-matchmaker service");

        *self.is_running.write().await = false;
        self.metrics.update_health_status(0);
        self.shutdown_token.cancel();

        // Pending sessions are not resumed on the next start
        match self.queue_manager.shutdown() {
            Ok(cancelled) => info!("Cancelled {} scheduled session task(s)", cancelled),
            Err(e) => warn!("Failed to cancel scheduled sessions: {}", e),
        }

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        let timeout = self.config.shutdown_timeout();
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(timeout, task).await.is_err() {
                warn!("Background task did not stop within {:?}, aborting", timeout);
                abort.abort();
            }
        }

        if let Ok(stats) = self.queue_manager.stats() {
            info!(
                "Final stats: {} enrollment(s), {} match(es) formed, {} participant(s) waiting",
                stats.enrollments, stats.matches_formed, stats.participants_waiting
            );
        }

        info!("Graceful shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn queue_manager(&self) -> &QueueManager {
        &self.queue_manager
    }

    pub fn platform(&self) -> Arc<dyn ChatPlatform> {
        self.platform.clone()
    }

    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Participants put back into queues at startup
    pub fn restored_participants(&self) -> usize {
        self.restored_participants
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueSnapshot;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.queue.enroll_cooldown_seconds = 0.0;
        config.queue.withdraw_cooldown_seconds = 0.0;
        config
    }

    #[tokio::test]
    async fn test_app_state_creation() {
        let app = AppState::new(test_config()).await.unwrap();

        assert!(!app.is_running().await);
        assert_eq!(app.restored_participants(), 0);
        assert_eq!(app.queue_manager().capacity(), 10);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = test_config();
        config.queue.capacity = 0;

        let result = AppState::new(config).await;
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_restores_before_accepting_actions() {
        let store = Arc::new(InMemorySnapshotStore::with_snapshots(vec![QueueSnapshot {
            channel_id: 7,
            participants: vec![1, 2],
            announcement: None,
            lobby: None,
            updated_at: chrono::Utc::now(),
        }]));
        let app = AppState::with_components(test_config(), Arc::new(InMemoryPlatform::new()), store)
            .await
            .unwrap();

        assert_eq!(app.restored_participants(), 2);
        assert_eq!(app.queue_manager().membership().owner_of(1).unwrap(), Some(7));
        let status = app.queue_manager().status(7).await.unwrap();
        assert_eq!(status.participants, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_uses_json_store_when_data_dir_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.storage.data_dir = Some(dir.path().to_path_buf());

        {
            let app = AppState::new(config.clone()).await.unwrap();
            app.queue_manager().enroll(3, 30).await.unwrap();
        }

        let app = AppState::new(config).await.unwrap();
        assert_eq!(app.restored_participants(), 1);
        assert_eq!(app.queue_manager().membership().owner_of(30).unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_mark_running_and_shutdown() {
        let app = AppState::new(test_config()).await.unwrap();

        app.mark_running().await;
        assert!(app.is_running().await);

        app.shutdown().await.unwrap();
        assert!(!app.is_running().await);
    }
}
