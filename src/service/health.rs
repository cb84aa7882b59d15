//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the channel-matchmaker
//! service, including readiness and liveness probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `matchmaker_health_status`
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: &HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other.clone()
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Channels with a queue instance
    pub channels: usize,
    pub participants_waiting: usize,
    /// Matches formed since service start
    pub matches_formed: u64,
    pub participants_matched: u64,
    /// Sessions waiting for their warning or deletion
    pub active_sessions: usize,
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();

        let service_check = Self::check_service_running(&app_state).await;
        // A stopped service is unhealthy regardless of its components
        let mut overall_status = match service_check.status {
            HealthStatus::Healthy => HealthStatus::Healthy,
            _ => HealthStatus::Unhealthy,
        };
        checks.push(service_check);

        for check in [
            Self::check_queue_manager(&app_state),
            Self::check_session_scheduler(&app_state),
            Self::check_snapshot_store(&app_state).await,
        ] {
            overall_status = overall_status.worst(&check.status);
            checks.push(check);
        }

        let metrics = app_state.metrics();
        metrics.update_health_status(overall_status.as_gauge());
        for check in &checks {
            metrics.update_component_health(&check.name, check.status == HealthStatus::Healthy);
        }
        metrics.update_uptime(app_state.uptime());

        let stats = Self::gather_service_stats(&app_state);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle actions
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_queue_manager(&app_state).status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_queue_manager(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.queue_manager().stats() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Queue manager stats check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "queue_manager".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_session_scheduler(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let active = app_state.queue_manager().scheduler().active_count();

        ComponentCheck {
            name: "session_scheduler".to_string(),
            status: HealthStatus::Healthy,
            message: Some(format!("{} session(s) scheduled", active)),
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// A store that cannot be read degrades the service; queue actions
    /// still succeed without persistence
    async fn check_snapshot_store(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.store().load_all_queue_snapshots().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                debug!("Snapshot store check failed: {}", e);
                (
                    HealthStatus::Degraded,
                    Some(format!("Snapshot store unavailable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "snapshot_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let uptime_info = format!("Up {}s", app_state.uptime().as_secs());

        match app_state.queue_manager().stats() {
            Ok(stats) => ServiceStats {
                channels: stats.channels,
                participants_waiting: stats.participants_waiting,
                matches_formed: stats.matches_formed,
                participants_matched: stats.participants_matched,
                active_sessions: stats.active_sessions,
                uptime_info,
            },
            Err(e) => {
                debug!("Failed to get queue stats for health check: {}", e);
                ServiceStats {
                    uptime_info,
                    ..ServiceStats::default()
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
