//! Best-effort coordination helpers
//!
//! Every helper here swallows platform failures: it logs them, counts them,
//! and reports a plain `bool`/`Option` back. Queue state never depends on
//! these calls succeeding.

use crate::error::{is_forbidden, is_not_found};
use crate::metrics::MetricsCollector;
use crate::platform::client::ChatPlatform;
use crate::types::{ChannelId, CoordinationResource, MessageId, ParticipantId, ResourceId, Visibility};
use crate::utils::{current_timestamp, lobby_name};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const LOBBY_INTRO: &str = "Queue lobby opened. The match will be coordinated here once the queue fills.";

/// Wraps a [`ChatPlatform`] with logging and failure accounting
#[derive(Clone)]
pub struct PlatformCoordinator {
    platform: Arc<dyn ChatPlatform>,
    metrics: Arc<MetricsCollector>,
}

impl PlatformCoordinator {
    pub fn new(platform: Arc<dyn ChatPlatform>, metrics: Arc<MetricsCollector>) -> Self {
        Self { platform, metrics }
    }

    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    fn failed(&self, operation: &str, target: u64, error: &anyhow::Error) {
        warn!(target_id = target, "Platform {} failed: {}", operation, error);
        self.metrics.record_side_effect_failure(operation);
    }

    /// Post a message, returning its id when it went through
    pub async fn notify(&self, destination: u64, text: &str) -> Option<MessageId> {
        match self.platform.send_message(destination, text).await {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                self.failed("send_message", destination, &e);
                None
            }
        }
    }

    /// Resolve a resource, treating lookup failures as "gone"
    pub async fn resolve(&self, resource_id: ResourceId) -> Option<CoordinationResource> {
        match self.platform.resolve_resource(resource_id).await {
            Ok(resource) => resource,
            Err(e) => {
                self.failed("resolve_resource", resource_id, &e);
                None
            }
        }
    }

    /// Create a lobby under the channel, private first and public when private
    /// resources are forbidden, and post the intro notice into it
    pub async fn open_lobby(&self, channel_id: ChannelId) -> Option<CoordinationResource> {
        let name = lobby_name(current_timestamp());

        let created = match self
            .platform
            .create_coordination_resource(channel_id, &name, Visibility::Private)
            .await
        {
            Ok(resource) => Ok(resource),
            Err(e) if is_forbidden(&e) => {
                debug!(channel_id, "Private lobby forbidden, falling back to public");
                self.platform
                    .create_coordination_resource(channel_id, &name, Visibility::Public)
                    .await
            }
            Err(e) => Err(e),
        };

        match created {
            Ok(resource) => {
                info!(
                    channel_id,
                    resource_id = resource.id,
                    visibility = ?resource.visibility,
                    "Opened queue lobby"
                );
                self.metrics.record_lobby_created(resource.visibility);
                self.notify(resource.id, LOBBY_INTRO).await;
                Some(resource)
            }
            Err(e) => {
                self.failed("create_resource", channel_id, &e);
                None
            }
        }
    }

    /// Grant access to a private resource. Public resources need no grants.
    pub async fn add_members(&self, resource: &CoordinationResource, participants: &[ParticipantId]) {
        if !resource.is_private() {
            return;
        }
        for participant_id in participants {
            if let Err(e) = self.platform.add_participant(resource.id, *participant_id).await {
                debug!(
                    resource_id = resource.id,
                    participant_id, "Could not add participant: {}", e
                );
            }
        }
    }

    /// Revoke access to a private resource
    pub async fn remove_members(
        &self,
        resource: &CoordinationResource,
        participants: &[ParticipantId],
    ) {
        if !resource.is_private() {
            return;
        }
        for participant_id in participants {
            if let Err(e) = self
                .platform
                .remove_participant(resource.id, *participant_id)
                .await
            {
                debug!(
                    resource_id = resource.id,
                    participant_id, "Could not remove participant: {}", e
                );
            }
        }
    }

    /// Unarchive the resource if the platform archived it
    pub async fn ensure_unarchived(&self, resource: &CoordinationResource) {
        if !resource.archived {
            return;
        }
        if let Err(e) = self.platform.set_archived(resource.id, false).await {
            self.failed("set_archived", resource.id, &e);
        }
    }

    /// Delete a resource. Returns true when the platform confirmed the delete;
    /// a resource that is already gone only logs at debug.
    pub async fn delete(&self, resource_id: ResourceId, reason: &str) -> bool {
        match self.platform.delete_resource(resource_id, reason).await {
            Ok(()) => {
                info!(resource_id, reason, "Deleted coordination resource");
                true
            }
            Err(e) if is_not_found(&e) => {
                debug!(resource_id, "Coordination resource already gone");
                false
            }
            Err(e) => {
                self.failed("delete_resource", resource_id, &e);
                false
            }
        }
    }

    /// Tear down a lobby the queue no longer needs
    pub async fn close_lobby(&self, resource_id: ResourceId, reason: &str) -> bool {
        match self.resolve(resource_id).await {
            Some(resource) => {
                self.ensure_unarchived(&resource).await;
                self.delete(resource.id, reason).await
            }
            None => {
                debug!(resource_id, "Lobby already gone, nothing to close");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::memory::{InMemoryPlatform, PlatformCall};

    fn coordinator() -> (Arc<InMemoryPlatform>, PlatformCoordinator) {
        let platform = Arc::new(InMemoryPlatform::new());
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let coordinator = PlatformCoordinator::new(platform.clone(), metrics);
        (platform, coordinator)
    }

    #[tokio::test]
    async fn test_open_lobby_prefers_private() {
        let (platform, coordinator) = coordinator();
        let lobby = coordinator.open_lobby(7).await.unwrap();

        assert!(lobby.is_private());
        assert_eq!(lobby.parent, 7);
        assert_eq!(platform.messages_to(lobby.id), vec![LOBBY_INTRO.to_string()]);
    }

    #[tokio::test]
    async fn test_open_lobby_falls_back_to_public() {
        let (platform, coordinator) = coordinator();
        platform.forbid_private_resources(true);

        let lobby = coordinator.open_lobby(7).await.unwrap();
        assert!(!lobby.is_private());

        let creates: Vec<_> = platform
            .calls()
            .into_iter()
            .filter(|c| matches!(c, PlatformCall::CreateResource { .. }))
            .collect();
        assert_eq!(creates.len(), 2);
    }

    #[tokio::test]
    async fn test_open_lobby_failure_is_swallowed() {
        let (platform, coordinator) = coordinator();
        platform.set_unavailable(true);
        assert!(coordinator.open_lobby(7).await.is_none());
    }

    #[tokio::test]
    async fn test_members_only_managed_for_private_resources() {
        let (platform, coordinator) = coordinator();
        platform.forbid_private_resources(true);
        let public = coordinator.open_lobby(7).await.unwrap();

        coordinator.add_members(&public, &[1, 2]).await;
        assert!(platform
            .calls()
            .iter()
            .all(|c| !matches!(c, PlatformCall::AddParticipant { .. })));
    }

    #[tokio::test]
    async fn test_close_lobby_unarchives_then_deletes() {
        let (platform, coordinator) = coordinator();
        let lobby = coordinator.open_lobby(7).await.unwrap();
        platform.archive(lobby.id);

        assert!(coordinator.close_lobby(lobby.id, "bye").await);
        assert!(platform.calls().contains(&PlatformCall::SetArchived {
            resource: lobby.id,
            archived: false
        }));
        assert!(!coordinator.close_lobby(lobby.id, "bye").await);
        assert_eq!(platform.delete_calls(lobby.id), 1);
    }
}
