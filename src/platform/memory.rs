//! In-process chat platform
//!
//! Keeps resources, memberships and posted messages in memory and records
//! every call, so tests can assert on the exact side effects. Failures can be
//! injected per operation. The console binary uses it as its platform.

use crate::error::{lock_poisoned, MatchmakingError, Result};
use crate::platform::client::ChatPlatform;
use crate::types::{ChannelId, CoordinationResource, MessageId, ParticipantId, ResourceId, Visibility};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// First identifier handed out for resources and messages. Keeps them apart
/// from the small channel and participant ids used in tests.
const ID_BASE: u64 = 1_000_000;

/// One recorded platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    SendMessage { destination: u64, text: String },
    CreateResource { parent: ChannelId, visibility: Visibility },
    DeleteResource { resource: ResourceId, reason: String },
    AddParticipant { resource: ResourceId, participant: ParticipantId },
    RemoveParticipant { resource: ResourceId, participant: ParticipantId },
    SetArchived { resource: ResourceId, archived: bool },
}

#[derive(Debug, Default)]
struct PlatformState {
    resources: HashMap<ResourceId, CoordinationResource>,
    members: HashMap<ResourceId, HashSet<ParticipantId>>,
    /// Resources that existed once and are gone now
    gone: HashSet<ResourceId>,
    calls: Vec<PlatformCall>,
    forbidden_destinations: HashSet<u64>,
}

/// Chat platform kept entirely in memory
#[derive(Debug)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
    next_id: AtomicU64,
    forbid_private: AtomicBool,
    unavailable: AtomicBool,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self {
            state: Mutex::new(PlatformState::default()),
            next_id: AtomicU64::new(ID_BASE),
            forbid_private: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make private resource creation fail with `Forbidden`
    pub fn forbid_private_resources(&self, forbid: bool) {
        self.forbid_private.store(forbid, Ordering::SeqCst);
    }

    /// Make every call fail with `ResourceUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make messages to `destination` fail with `Forbidden`
    pub fn forbid_messages_to(&self, destination: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.forbidden_destinations.insert(destination);
        }
    }

    /// Remove a resource as if someone deleted it outside the service
    pub fn vanish(&self, resource: ResourceId) {
        if let Ok(mut state) = self.state.lock() {
            state.resources.remove(&resource);
            state.members.remove(&resource);
            state.gone.insert(resource);
        }
    }

    /// Archive a resource as if the platform auto-archived it
    pub fn archive(&self, resource: ResourceId) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(existing) = state.resources.get_mut(&resource) {
                existing.archived = true;
            }
        }
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// Texts posted to one destination, in order
    pub fn messages_to(&self, destination: u64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::SendMessage {
                    destination: d,
                    text,
                } if d == destination => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Number of delete calls issued for a resource
    pub fn delete_calls(&self, resource: ResourceId) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(call, PlatformCall::DeleteResource { resource: r, .. } if *r == resource)
            })
            .count()
    }

    pub fn resource(&self, resource: ResourceId) -> Option<CoordinationResource> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.resources.get(&resource).cloned())
    }

    /// Live resources under a channel
    pub fn resources_in(&self, parent: ChannelId) -> Vec<CoordinationResource> {
        let mut resources: Vec<CoordinationResource> = self
            .state
            .lock()
            .map(|state| {
                state
                    .resources
                    .values()
                    .filter(|r| r.parent == parent)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        resources.sort_by_key(|r| r.id);
        resources
    }

    /// Participants with access to a resource, sorted
    pub fn members_of(&self, resource: ResourceId) -> Vec<ParticipantId> {
        let mut members: Vec<ParticipantId> = self
            .state
            .lock()
            .ok()
            .and_then(|state| state.members.get(&resource).cloned())
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MatchmakingError::ResourceUnavailable {
                message: "chat platform unavailable".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

fn not_found(resource: ResourceId) -> anyhow::Error {
    MatchmakingError::ResourceNotFound {
        resource: format!("resource {}", resource),
    }
    .into()
}

#[async_trait]
impl ChatPlatform for InMemoryPlatform {
    async fn send_message(&self, destination: u64, text: &str) -> Result<MessageId> {
        self.check_available()?;
        let mut state = self.state.lock().map_err(|_| lock_poisoned("platform"))?;
        state.calls.push(PlatformCall::SendMessage {
            destination,
            text: text.to_string(),
        });

        if state.gone.contains(&destination) {
            return Err(not_found(destination));
        }
        if state.forbidden_destinations.contains(&destination) {
            return Err(MatchmakingError::Forbidden {
                message: format!("cannot post to {}", destination),
            }
            .into());
        }

        debug!(destination, "Posted message: {}", text);
        Ok(self.next_id())
    }

    async fn create_coordination_resource(
        &self,
        parent: ChannelId,
        name: &str,
        visibility: Visibility,
    ) -> Result<CoordinationResource> {
        self.check_available()?;
        let mut state = self.state.lock().map_err(|_| lock_poisoned("platform"))?;
        state
            .calls
            .push(PlatformCall::CreateResource { parent, visibility });

        if visibility == Visibility::Private && self.forbid_private.load(Ordering::SeqCst) {
            return Err(MatchmakingError::Forbidden {
                message: "private resources are not allowed here".to_string(),
            }
            .into());
        }

        let resource = CoordinationResource {
            id: self.next_id(),
            parent,
            name: name.to_string(),
            visibility,
            archived: false,
        };
        state.resources.insert(resource.id, resource.clone());
        state.members.insert(resource.id, HashSet::new());
        Ok(resource)
    }

    async fn delete_resource(&self, resource: ResourceId, reason: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().map_err(|_| lock_poisoned("platform"))?;
        state.calls.push(PlatformCall::DeleteResource {
            resource,
            reason: reason.to_string(),
        });

        if state.resources.remove(&resource).is_none() {
            return Err(not_found(resource));
        }
        state.members.remove(&resource);
        state.gone.insert(resource);
        Ok(())
    }

    async fn add_participant(&self, resource: ResourceId, participant: ParticipantId) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().map_err(|_| lock_poisoned("platform"))?;
        state.calls.push(PlatformCall::AddParticipant {
            resource,
            participant,
        });

        let members = state
            .members
            .get_mut(&resource)
            .ok_or_else(|| not_found(resource))?;
        members.insert(participant);
        Ok(())
    }

    async fn remove_participant(
        &self,
        resource: ResourceId,
        participant: ParticipantId,
    ) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().map_err(|_| lock_poisoned("platform"))?;
        state.calls.push(PlatformCall::RemoveParticipant {
            resource,
            participant,
        });

        let members = state
            .members
            .get_mut(&resource)
            .ok_or_else(|| not_found(resource))?;
        members.remove(&participant);
        Ok(())
    }

    async fn resolve_resource(&self, resource: ResourceId) -> Result<Option<CoordinationResource>> {
        self.check_available()?;
        let state = self.state.lock().map_err(|_| lock_poisoned("platform"))?;
        Ok(state.resources.get(&resource).cloned())
    }

    async fn set_archived(&self, resource: ResourceId, archived: bool) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.lock().map_err(|_| lock_poisoned("platform"))?;
        state
            .calls
            .push(PlatformCall::SetArchived { resource, archived });

        let existing = state
            .resources
            .get_mut(&resource)
            .ok_or_else(|| not_found(resource))?;
        existing.archived = archived;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{is_forbidden, is_not_found};

    #[tokio::test]
    async fn test_create_and_resolve() {
        let platform = InMemoryPlatform::new();
        let resource = platform
            .create_coordination_resource(5, "queue-1", Visibility::Private)
            .await
            .unwrap();

        let resolved = platform.resolve_resource(resource.id).await.unwrap();
        assert_eq!(resolved, Some(resource.clone()));
        assert_eq!(platform.resources_in(5), vec![resource]);
    }

    #[tokio::test]
    async fn test_private_creation_can_be_forbidden() {
        let platform = InMemoryPlatform::new();
        platform.forbid_private_resources(true);

        let err = platform
            .create_coordination_resource(5, "queue-1", Visibility::Private)
            .await
            .unwrap_err();
        assert!(is_forbidden(&err));

        let public = platform
            .create_coordination_resource(5, "queue-1", Visibility::Public)
            .await
            .unwrap();
        assert!(!public.is_private());
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let platform = InMemoryPlatform::new();
        let resource = platform
            .create_coordination_resource(5, "queue-1", Visibility::Public)
            .await
            .unwrap();

        platform.delete_resource(resource.id, "done").await.unwrap();
        let err = platform.delete_resource(resource.id, "again").await.unwrap_err();
        assert!(is_not_found(&err));
        assert_eq!(platform.delete_calls(resource.id), 2);
        assert_eq!(platform.resolve_resource(resource.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_members_and_messages() {
        let platform = InMemoryPlatform::new();
        let resource = platform
            .create_coordination_resource(5, "queue-1", Visibility::Private)
            .await
            .unwrap();

        platform.add_participant(resource.id, 2).await.unwrap();
        platform.add_participant(resource.id, 1).await.unwrap();
        platform.remove_participant(resource.id, 2).await.unwrap();
        assert_eq!(platform.members_of(resource.id), vec![1]);

        platform.send_message(resource.id, "hello").await.unwrap();
        assert_eq!(platform.messages_to(resource.id), vec!["hello".to_string()]);

        platform.vanish(resource.id);
        let err = platform.send_message(resource.id, "gone?").await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_unavailable_fails_everything() {
        let platform = InMemoryPlatform::new();
        platform.set_unavailable(true);
        assert!(platform.send_message(1, "x").await.is_err());
        assert!(platform.resolve_resource(1).await.is_err());
        assert!(platform.calls().is_empty());
    }
}
