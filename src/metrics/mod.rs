//! Metrics and monitoring for the channel-matchmaker service
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health, metrics and statistics endpoints.

pub mod collector;
pub mod health;

pub use collector::{
    MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics, ServiceMetrics,
    SessionMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
