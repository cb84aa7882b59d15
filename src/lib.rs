//! Channel Matchmaker - per-channel matchmaking queues
//!
//! Participants enroll into a queue attached to a chat channel. A participant
//! waits in at most one queue at a time. When a queue reaches capacity the
//! longest-waiting participants form a match, whose coordination session is
//! warned and later deleted by the session scheduler.

pub mod config;
pub mod console;
pub mod cooldown;
pub mod error;
pub mod metrics;
pub mod platform;
pub mod queue;
pub mod service;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use platform::ChatPlatform;
pub use queue::{MatchFormation, QueueManager};
pub use session::SessionScheduler;
pub use storage::SnapshotStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
