use async_trait::async_trait;

use crate::{
    domain::{Contact, GroupDescriptor, GroupId, Participant, PeerRef},
    platform::PlatformError,
};

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Capabilities the batch-add engine and its intake consume from the platform.
///
/// Implementations must issue one request per call; pacing is the engine's job.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Group and channel dialogs of the acting account. Direct chats are omitted.
    async fn list_dialogs(&self) -> PlatformResult<Vec<GroupDescriptor>>;

    async fn list_participants(&self, group: &GroupDescriptor) -> PlatformResult<Vec<Participant>>;

    async fn list_contacts(&self) -> PlatformResult<Vec<Contact>>;

    /// Resolve a phone or handle to a user. Fails with `NotFound` on a miss.
    async fn resolve_identity(&self, key: &str) -> PlatformResult<PeerRef>;

    async fn invite_to_channel(&self, channel: GroupId, peer: &PeerRef) -> PlatformResult<()>;

    async fn add_to_basic_group(
        &self,
        group: GroupId,
        peer: &PeerRef,
        forward_limit: u32,
    ) -> PlatformResult<()>;
}
