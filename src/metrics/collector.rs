//! Metrics collection using Prometheus
//!
//! Queue, session and side-effect metrics for the channel-matchmaker service.

use crate::error::MatchmakingError;
use crate::types::{ResetKind, Visibility};
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue mutation metrics
    queue_metrics: QueueMetrics,

    /// Coordination session metrics
    session_metrics: SessionMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Failed best-effort calls to the chat platform or the store
    pub side_effect_failures_total: IntCounterVec,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Successful enrollments
    pub enrollments_total: IntCounter,

    /// Successful withdrawals
    pub withdrawals_total: IntCounter,

    /// Administrative resets by kind
    pub resets_total: IntCounterVec,

    /// Actions refused with a user-attributable error, by reason
    pub rejected_total: IntCounterVec,

    /// Participants currently waiting across all channels
    pub participants_waiting: IntGauge,

    /// Matches formed
    pub matches_formed_total: IntCounter,

    /// Participants handed off into matches
    pub participants_matched_total: IntCounter,

    /// Lobby resources created, by visibility
    pub lobbies_created_total: IntCounterVec,
}

/// Coordination session metrics
#[derive(Clone)]
pub struct SessionMetrics {
    pub sessions_scheduled_total: IntCounter,
    pub sessions_cancelled_total: IntCounter,
    pub sessions_terminated_total: IntCounter,
    pub warnings_sent_total: IntCounter,

    /// Sessions with a pending warn or delete step
    pub active_sessions: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Duration of queue operations, including the time spent waiting for the
    /// channel exclusion
    pub queue_operation_duration: HistogramVec,

    /// Time spent restoring queues at startup
    pub restore_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            session_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a successful enrollment
    pub fn record_enroll(&self, duration: Duration) {
        self.queue_metrics.enrollments_total.inc();
        self.record_operation("enroll", duration);
    }

    /// Record a successful withdrawal
    pub fn record_withdraw(&self, duration: Duration) {
        self.queue_metrics.withdrawals_total.inc();
        self.record_operation("withdraw", duration);
    }

    /// Record an administrative reset
    pub fn record_reset(&self, kind: ResetKind, duration: Duration) {
        let kind_str = match kind {
            ResetKind::Cancel => "cancel",
            ResetKind::Setup => "setup",
        };
        self.queue_metrics
            .resets_total
            .with_label_values(&[kind_str])
            .inc();
        self.record_operation("reset", duration);
    }

    /// Record a refused action. Only user-attributable errors are counted.
    pub fn record_rejection(&self, error: &MatchmakingError) {
        if error.is_user_error() {
            self.queue_metrics
                .rejected_total
                .with_label_values(&[error.kind()])
                .inc();
        }
    }

    /// Record a match being formed
    pub fn record_match_formed(&self, participants: usize) {
        self.queue_metrics.matches_formed_total.inc();
        self.queue_metrics
            .participants_matched_total
            .inc_by(participants as u64);
    }

    /// Record a lobby resource being created
    pub fn record_lobby_created(&self, visibility: Visibility) {
        let visibility_str = match visibility {
            Visibility::Private => "private",
            Visibility::Public => "public",
        };
        self.queue_metrics
            .lobbies_created_total
            .with_label_values(&[visibility_str])
            .inc();
    }

    pub fn set_participants_waiting(&self, waiting: usize) {
        self.queue_metrics.participants_waiting.set(waiting as i64);
    }

    /// Record a failed best-effort call
    pub fn record_side_effect_failure(&self, operation: &str) {
        self.service_metrics
            .side_effect_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    pub fn record_session_scheduled(&self) {
        self.session_metrics.sessions_scheduled_total.inc();
        self.session_metrics.active_sessions.inc();
    }

    pub fn record_session_cancelled(&self) {
        self.session_metrics.sessions_cancelled_total.inc();
        self.session_metrics.active_sessions.dec();
    }

    pub fn record_session_terminated(&self) {
        self.session_metrics.sessions_terminated_total.inc();
        self.session_metrics.active_sessions.dec();
    }

    pub fn record_warning_sent(&self) {
        self.session_metrics.warnings_sent_total.inc();
    }

    /// Record queue operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .queue_operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    pub fn record_restore(&self, duration: Duration) {
        self.performance_metrics
            .restore_duration
            .observe(duration.as_secs_f64());
    }

    /// Update uptime gauge
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        TextEncoder::new()
            .encode_to_string(&metric_families)
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))
    }

    /// Content type of [`encode_text`](Self::encode_text) output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("matchmaker_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "matchmaker_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("matchmaker_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let side_effect_failures_total = IntCounterVec::new(
            Opts::new(
                "matchmaker_side_effect_failures_total",
                "Failed best-effort platform and persistence calls",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(side_effect_failures_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            side_effect_failures_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let enrollments_total =
            IntCounter::new("matchmaker_enrollments_total", "Successful enrollments")?;
        registry.register(Box::new(enrollments_total.clone()))?;

        let withdrawals_total =
            IntCounter::new("matchmaker_withdrawals_total", "Successful withdrawals")?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let resets_total = IntCounterVec::new(
            Opts::new("matchmaker_resets_total", "Administrative queue resets"),
            &["kind"],
        )?;
        registry.register(Box::new(resets_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new("matchmaker_rejected_total", "Refused participant actions"),
            &["reason"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let participants_waiting = IntGauge::new(
            "matchmaker_participants_waiting",
            "Participants currently queued across all channels",
        )?;
        registry.register(Box::new(participants_waiting.clone()))?;

        let matches_formed_total =
            IntCounter::new("matchmaker_matches_formed_total", "Matches formed")?;
        registry.register(Box::new(matches_formed_total.clone()))?;

        let participants_matched_total = IntCounter::new(
            "matchmaker_participants_matched_total",
            "Participants handed off into matches",
        )?;
        registry.register(Box::new(participants_matched_total.clone()))?;

        let lobbies_created_total = IntCounterVec::new(
            Opts::new("matchmaker_lobbies_created_total", "Lobby resources created"),
            &["visibility"],
        )?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        Ok(Self {
            enrollments_total,
            withdrawals_total,
            resets_total,
            rejected_total,
            participants_waiting,
            matches_formed_total,
            participants_matched_total,
            lobbies_created_total,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_scheduled_total = IntCounter::new(
            "matchmaker_sessions_scheduled_total",
            "Match sessions scheduled for deletion",
        )?;
        registry.register(Box::new(sessions_scheduled_total.clone()))?;

        let sessions_cancelled_total = IntCounter::new(
            "matchmaker_sessions_cancelled_total",
            "Scheduled sessions cancelled before deletion",
        )?;
        registry.register(Box::new(sessions_cancelled_total.clone()))?;

        let sessions_terminated_total = IntCounter::new(
            "matchmaker_sessions_terminated_total",
            "Sessions deleted by the scheduler",
        )?;
        registry.register(Box::new(sessions_terminated_total.clone()))?;

        let warnings_sent_total = IntCounter::new(
            "matchmaker_session_warnings_total",
            "Deletion warnings posted",
        )?;
        registry.register(Box::new(warnings_sent_total.clone()))?;

        let active_sessions = IntGauge::new(
            "matchmaker_active_sessions",
            "Sessions with a pending warn or delete step",
        )?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            sessions_scheduled_total,
            sessions_cancelled_total,
            sessions_terminated_total,
            warnings_sent_total,
            active_sessions,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "matchmaker_queue_operation_duration_seconds",
                "Queue operation duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(queue_operation_duration.clone()))?;

        let restore_duration = Histogram::with_opts(
            HistogramOpts::new(
                "matchmaker_restore_duration_seconds",
                "Time spent restoring queues at startup",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(restore_duration.clone()))?;

        Ok(Self {
            queue_operation_duration,
            restore_duration,
        })
    }
}
