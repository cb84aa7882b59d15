//! Coordination session lifecycle
//!
//! A formed match hands its session to the scheduler, which warns the
//! participants and later deletes the session unless it is cancelled first.

pub mod lifecycle;
pub mod scheduler;

pub use lifecycle::{LifecyclePlan, SessionState};
pub use scheduler::SessionScheduler;
