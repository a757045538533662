//! Platform-backed candidate intake: group listing and contact selection.

use crate::{
    dedup::dedupe_dialogs,
    domain::{CandidateIdentity, GroupDescriptor},
    filter::{filter_candidates, member_phones},
    platform::PlatformClient,
    Result,
};

/// Groups and channels of the account, with duplicate listings collapsed.
pub async fn list_groups(platform: &dyn PlatformClient) -> Result<Vec<GroupDescriptor>> {
    let dialogs = platform.list_dialogs().await?;
    let seen = dialogs.len();
    let groups = dedupe_dialogs(dialogs);
    tracing::debug!(seen, kept = groups.len(), "deduplicated dialogs");
    Ok(groups)
}

/// Contacts matching `prefix` that are not yet members of `group`.
pub async fn contact_candidates(
    platform: &dyn PlatformClient,
    group: &GroupDescriptor,
    prefix: &str,
) -> Result<Vec<CandidateIdentity>> {
    let contacts = platform.list_contacts().await?;
    let participants = platform.list_participants(group).await?;
    let existing = member_phones(&participants);
    let out = filter_candidates(&contacts, &existing, prefix);
    tracing::info!(
        contacts = contacts.len(),
        members = existing.len(),
        matched = out.len(),
        "selected candidates"
    );
    Ok(out)
}
