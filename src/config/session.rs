//! Coordination session lifecycle configuration

use std::time::Duration;

/// How long a match session lives and how early participants are warned
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLifecycleConfig {
    pub delete_after: Duration,
    /// Zero disables the warning step. Clamped to `delete_after` when planning.
    pub warn_before: Duration,
}

impl Default for SessionLifecycleConfig {
    fn default() -> Self {
        Self {
            delete_after: Duration::from_secs(600),
            warn_before: Duration::from_secs(300),
        }
    }
}
