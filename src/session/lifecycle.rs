//! Session lifecycle states and timing

use crate::config::SessionLifecycleConfig;
use crate::utils::warning_minutes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling state of one coordination session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Scheduled, waiting for the warning (or for deletion when there is none)
    Created,
    /// Warning posted, waiting for deletion
    Warned,
    Terminated,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Cancelled)
    }
}

/// Warn-then-delete timing for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePlan {
    delete_after: Duration,
    warn_before: Duration,
}

impl LifecyclePlan {
    /// `warn_before` is clamped so it never exceeds `delete_after`
    pub fn new(delete_after: Duration, warn_before: Duration) -> Self {
        Self {
            delete_after,
            warn_before: warn_before.min(delete_after),
        }
    }

    pub fn from_config(config: &SessionLifecycleConfig) -> Self {
        Self::new(config.delete_after, config.warn_before)
    }

    pub fn delete_after(&self) -> Duration {
        self.delete_after
    }

    pub fn warn_before(&self) -> Duration {
        self.warn_before
    }

    /// A zero `warn_before` skips the warning step
    pub fn has_warning(&self) -> bool {
        !self.warn_before.is_zero()
    }

    /// Delay from scheduling to the warning
    pub fn warn_delay(&self) -> Duration {
        self.delete_after.saturating_sub(self.warn_before)
    }

    /// Delay from the warning (or from scheduling, without one) to deletion
    pub fn final_delay(&self) -> Duration {
        if self.has_warning() {
            self.warn_before
        } else {
            self.delete_after
        }
    }

    pub fn warning_text(&self) -> String {
        format!(
            "[!] This match session will be deleted in {} minute(s). Please wrap up.",
            warning_minutes(self.warn_before)
        )
    }
}

impl Default for LifecyclePlan {
    fn default() -> Self {
        Self::from_config(&SessionLifecycleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let plan = LifecyclePlan::default();
        assert_eq!(plan.warn_delay(), Duration::from_secs(300));
        assert_eq!(plan.final_delay(), Duration::from_secs(300));
        assert!(plan.has_warning());
        assert!(plan.warning_text().contains("5 minute(s)"));
    }

    #[test]
    fn test_warn_before_is_clamped() {
        let plan = LifecyclePlan::new(Duration::from_secs(10), Duration::from_secs(30));
        assert_eq!(plan.warn_before(), Duration::from_secs(10));
        assert_eq!(plan.warn_delay(), Duration::ZERO);
        assert_eq!(plan.final_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_warning_collapses_to_single_wait() {
        let plan = LifecyclePlan::new(Duration::from_secs(10), Duration::ZERO);
        assert!(!plan.has_warning());
        assert_eq!(plan.final_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionState::Cancelled.is_terminal());
        assert!(SessionState::Terminated.is_terminal());
        assert!(!SessionState::Warned.is_terminal());
    }
}
