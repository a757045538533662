//! Candidate selection from the account's contacts.

use std::collections::HashSet;

use crate::domain::{normalize_phone, CandidateIdentity, Contact, Participant};

/// Normalized phones of the current members; members without a phone are skipped.
pub fn member_phones(participants: &[Participant]) -> HashSet<String> {
    participants
        .iter()
        .filter_map(|p| p.phone.as_deref())
        .map(normalize_phone)
        .filter(|p| !p.is_empty())
        .collect()
}

/// True when `contact` matches `prefix` by name (case-insensitive) or by its
/// phone exactly as stored.
pub fn matches_prefix(contact: &Contact, prefix: &str) -> bool {
    if contact
        .name
        .to_lowercase()
        .starts_with(&prefix.to_lowercase())
    {
        return true;
    }
    contact
        .phone
        .as_deref()
        .is_some_and(|raw| raw.starts_with(prefix))
}

/// Select contacts eligible for addition, in source order.
///
/// A contact is kept iff it matches `prefix`, has a phone, and that phone is
/// not already in `existing`. An empty prefix keeps every contact with a phone.
pub fn filter_candidates(
    contacts: &[Contact],
    existing: &HashSet<String>,
    prefix: &str,
) -> Vec<CandidateIdentity> {
    let prefix = prefix.trim();
    contacts
        .iter()
        .filter(|c| matches_prefix(c, prefix))
        .filter_map(|c| {
            let phone = normalize_phone(c.phone.as_deref().unwrap_or_default());
            if phone.is_empty() || existing.contains(&phone) {
                return None;
            }
            Some(CandidateIdentity::named(phone, c.name.clone()))
        })
        .collect()
}
