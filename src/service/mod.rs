//! Service layer for the channel-matchmaker service
//!
//! This module contains the main application state, startup restoration,
//! health reporting and background task management.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceStats};
