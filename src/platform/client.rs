//! Chat-platform collaborator contract
//!
//! The core never talks to a chat network directly. Everything it needs from
//! the platform goes through this trait, and every call is treated as
//! fallible. Implementations report `Forbidden`, `ResourceNotFound` and
//! `ResourceUnavailable` through [`MatchmakingError`](crate::error::MatchmakingError).

use crate::error::Result;
use crate::types::{ChannelId, CoordinationResource, MessageId, ParticipantId, ResourceId, Visibility};
use async_trait::async_trait;

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Post a message to a channel or coordination resource
    async fn send_message(&self, destination: u64, text: &str) -> Result<MessageId>;

    /// Create a coordination resource under a channel
    async fn create_coordination_resource(
        &self,
        parent: ChannelId,
        name: &str,
        visibility: Visibility,
    ) -> Result<CoordinationResource>;

    /// Delete a coordination resource
    async fn delete_resource(&self, resource: ResourceId, reason: &str) -> Result<()>;

    /// Grant a participant access to a private resource
    async fn add_participant(&self, resource: ResourceId, participant: ParticipantId) -> Result<()>;

    /// Revoke a participant's access to a private resource
    async fn remove_participant(
        &self,
        resource: ResourceId,
        participant: ParticipantId,
    ) -> Result<()>;

    /// Look up a resource; `None` when it no longer exists
    async fn resolve_resource(&self, resource: ResourceId) -> Result<Option<CoordinationResource>>;

    /// Archive or unarchive a resource
    async fn set_archived(&self, resource: ResourceId, archived: bool) -> Result<()>;
}
