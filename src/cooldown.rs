//! Per-participant, per-action cooldown gate
//!
//! `check` is side-effect free; callers record a successful action with
//! `mark` once the action has actually been applied. Stale entries only ever
//! resolve to "no cooldown", so the table is never pruned here.

use crate::config::QueueConfig;
use crate::error::{lock_poisoned, Result};
use crate::types::{ActionKind, ParticipantId};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

/// Cooldown table keyed by (participant, action)
#[derive(Debug)]
pub struct RateLimiter {
    enroll_window: Duration,
    withdraw_window: Duration,
    last_action: RwLock<HashMap<(ParticipantId, ActionKind), Instant>>,
}

impl RateLimiter {
    pub fn new(enroll_window: Duration, withdraw_window: Duration) -> Self {
        Self {
            enroll_window,
            withdraw_window,
            last_action: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.enroll_cooldown, config.withdraw_cooldown)
    }

    /// Cooldown window configured for an action kind
    pub fn window(&self, action: ActionKind) -> Duration {
        match action {
            ActionKind::Enroll => self.enroll_window,
            ActionKind::Withdraw => self.withdraw_window,
        }
    }

    /// Remaining wait if the participant performed `action` within its window
    pub fn check(
        &self,
        participant_id: ParticipantId,
        action: ActionKind,
        now: Instant,
    ) -> Result<Option<Duration>> {
        let window = self.window(action);
        if window.is_zero() {
            return Ok(None);
        }

        let last_action = self
            .last_action
            .read()
            .map_err(|_| lock_poisoned("cooldown"))?;

        let Some(last) = last_action.get(&(participant_id, action)) else {
            return Ok(None);
        };

        // A window reaching past the clock's range never expires
        let Some(ready_at) = last.checked_add(window) else {
            return Ok(Some(window));
        };
        if ready_at > now {
            Ok(Some(ready_at - now))
        } else {
            Ok(None)
        }
    }

    /// Record a successful action
    pub fn mark(&self, participant_id: ParticipantId, action: ActionKind, now: Instant) -> Result<()> {
        let mut last_action = self
            .last_action
            .write()
            .map_err(|_| lock_poisoned("cooldown"))?;
        last_action.insert((participant_id, action), now);
        Ok(())
    }

    /// Number of recorded (participant, action) entries
    pub fn tracked_entries(&self) -> usize {
        self.last_action.read().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(5), Duration::from_secs(5))
    }

    #[test]
    fn test_no_history_means_no_cooldown() {
        let limiter = limiter();
        assert_eq!(limiter.check(1, ActionKind::Enroll, Instant::now()).unwrap(), None);
    }

    #[test]
    fn test_remaining_wait_after_mark() {
        let limiter = limiter();
        let t = Instant::now();
        limiter.mark(1, ActionKind::Enroll, t).unwrap();

        let remaining = limiter
            .check(1, ActionKind::Enroll, t + Duration::from_secs(2))
            .unwrap();
        assert_eq!(remaining, Some(Duration::from_secs(3)));

        let remaining = limiter
            .check(1, ActionKind::Enroll, t + Duration::from_secs(6))
            .unwrap();
        assert_eq!(remaining, None);
    }

    #[test]
    fn test_window_boundary_is_open() {
        let limiter = limiter();
        let t = Instant::now();
        limiter.mark(1, ActionKind::Enroll, t).unwrap();
        assert_eq!(
            limiter
                .check(1, ActionKind::Enroll, t + Duration::from_secs(5))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_actions_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(5), Duration::from_secs(10));
        let t = Instant::now();
        limiter.mark(1, ActionKind::Enroll, t).unwrap();

        assert!(limiter.check(1, ActionKind::Withdraw, t).unwrap().is_none());
        assert!(limiter.check(2, ActionKind::Enroll, t).unwrap().is_none());

        limiter.mark(1, ActionKind::Withdraw, t).unwrap();
        let remaining = limiter
            .check(1, ActionKind::Withdraw, t + Duration::from_secs(6))
            .unwrap();
        assert_eq!(remaining, Some(Duration::from_secs(4)));
    }

    #[test]
    fn test_check_has_no_side_effects() {
        let limiter = limiter();
        let t = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check(7, ActionKind::Enroll, t).unwrap().is_none());
        }
        assert_eq!(limiter.tracked_entries(), 0);
    }

    #[test]
    fn test_overflowing_window_stays_limited() {
        let limiter = RateLimiter::new(Duration::MAX, Duration::ZERO);
        let t = Instant::now();
        limiter.mark(1, ActionKind::Enroll, t).unwrap();

        let remaining = limiter
            .check(1, ActionKind::Enroll, t + Duration::from_secs(3600))
            .unwrap();
        assert_eq!(remaining, Some(Duration::MAX));
    }

    #[test]
    fn test_zero_window_disables_cooldown() {
        let limiter = RateLimiter::new(Duration::ZERO, Duration::from_secs(1));
        let t = Instant::now();
        limiter.mark(1, ActionKind::Enroll, t).unwrap();
        assert!(limiter.check(1, ActionKind::Enroll, t).unwrap().is_none());
    }
}
