//! Per-channel queues and the global membership constraint
//!
//! - `membership`: participant → owning channel, at most one owner each
//! - `instance`: the state of one channel's queue
//! - `registry`: one exclusion per channel plus the raw queue operations
//! - `matching`: match formation run inside the exclusion
//! - `manager`: the composed enroll / withdraw / reset surface

pub mod instance;
pub mod manager;
pub mod matching;
pub mod membership;
pub mod registry;

pub use instance::ChannelQueue;
pub use manager::{QueueManager, QueueManagerStats};
pub use matching::{FifoMatchFormation, MatchFormation};
pub use membership::MembershipIndex;
pub use registry::{QueueGuard, QueueRegistry};
