//! Chat-platform collaborator
//!
//! The trait the core consumes, the best-effort wrapper used by the queue
//! manager and the session scheduler, and an in-memory implementation.

pub mod client;
pub mod coordination;
pub mod memory;

pub use client::ChatPlatform;
pub use coordination::PlatformCoordinator;
pub use memory::{InMemoryPlatform, PlatformCall};
