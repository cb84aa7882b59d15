//! Queue configuration

use crate::error::{MatchmakingError, Result};
use crate::types::ActionKind;
use std::time::Duration;

/// Capacity and per-action cooldown windows for every channel queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Participants needed to form a match
    pub capacity: usize,
    pub enroll_cooldown: Duration,
    pub withdraw_cooldown: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            enroll_cooldown: Duration::from_secs(5),
            withdraw_cooldown: Duration::from_secs(5),
        }
    }
}

impl QueueConfig {
    /// Configuration with no cooldowns, mostly useful for tests and tooling
    pub fn without_cooldowns(capacity: usize) -> Self {
        Self {
            capacity,
            enroll_cooldown: Duration::ZERO,
            withdraw_cooldown: Duration::ZERO,
        }
    }

    pub fn cooldown(&self, action: ActionKind) -> Duration {
        match action {
            ActionKind::Enroll => self.enroll_cooldown,
            ActionKind::Withdraw => self.withdraw_cooldown,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "queue capacity must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
