//! Configuration management for the channel-matchmaker service
//!
//! This module handles configuration loading from environment variables or a
//! TOML file, validation, and default values.

pub mod app;
pub mod queue;
pub mod session;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, QueueSettings, ServiceSettings, SessionSettings, StorageSettings,
};
pub use queue::QueueConfig;
pub use session::SessionLifecycleConfig;
