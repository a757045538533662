//! Collapse duplicate group listings.
//!
//! The same group can show up more than once in the dialog list (e.g. a basic
//! group and the channel it migrated to). Listings are keyed by normalized
//! title; on collision the variant with a public handle wins and moves to
//! where it was listed, otherwise the first one seen stays.

use std::collections::HashMap;

use crate::domain::GroupDescriptor;

/// Case-folded, trimmed title used as the dedup key.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Deduplicate dialogs in listing order.
///
/// A replacement drops the descriptor it replaces and is appended at the
/// point where it was listed.
pub fn dedupe_dialogs(dialogs: Vec<GroupDescriptor>) -> Vec<GroupDescriptor> {
    let mut out: Vec<GroupDescriptor> = Vec::with_capacity(dialogs.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for dialog in dialogs {
        let key = normalize_title(&dialog.title);
        match slots.get(&key) {
            Some(&idx) => {
                if dialog.has_handle() && !out[idx].has_handle() {
                    tracing::debug!(title = %dialog.title, "preferring listing with public handle");
                    out.remove(idx);
                    for slot in slots.values_mut() {
                        if *slot > idx {
                            *slot -= 1;
                        }
                    }
                    slots.insert(key, out.len());
                    out.push(dialog);
                }
            }
            None => {
                slots.insert(key, out.len());
                out.push(dialog);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupId, GroupKind};

    fn group(id: i64, title: &str, handle: Option<&str>) -> GroupDescriptor {
        GroupDescriptor {
            id: GroupId(id),
            title: title.to_string(),
            handle: handle.map(str::to_string),
            kind: GroupKind::Channel,
            member_count: Some(10),
        }
    }

    fn ids(v: &[GroupDescriptor]) -> Vec<i64> {
        v.iter().map(|g| g.id.0).collect()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(dedupe_dialogs(vec![]).is_empty());
    }

    #[test]
    fn handle_wins_regardless_of_order() {
        let a = group(1, "Book Club", None);
        let b = group(2, "  book club ", Some("bookclub"));

        let forward = dedupe_dialogs(vec![a.clone(), b.clone()]);
        assert_eq!(ids(&forward), vec![2]);

        let backward = dedupe_dialogs(vec![b, a]);
        assert_eq!(ids(&backward), vec![2]);
    }

    #[test]
    fn first_wins_when_both_or_neither_have_handles() {
        let both = dedupe_dialogs(vec![
            group(1, "Runners", Some("run1")),
            group(2, "RUNNERS", Some("run2")),
        ]);
        assert_eq!(ids(&both), vec![1]);

        let neither = dedupe_dialogs(vec![group(3, "Chess", None), group(4, "chess", None)]);
        assert_eq!(ids(&neither), vec![3]);
    }

    #[test]
    fn replacement_moves_to_where_handle_was_listed() {
        let out = dedupe_dialogs(vec![
            group(1, "Alpha", None),
            group(2, "Beta", None),
            group(3, "alpha", Some("alpha")),
            group(4, "Gamma", None),
        ]);
        assert_eq!(ids(&out), vec![2, 3, 4]);
    }

    #[test]
    fn later_slots_stay_valid_after_a_replacement() {
        let out = dedupe_dialogs(vec![
            group(1, "Alpha", None),
            group(2, "Beta", None),
            group(3, "alpha", Some("alpha")),
            group(4, "beta", Some("beta")),
            group(5, "ALPHA", Some("other")),
        ]);
        assert_eq!(ids(&out), vec![3, 4]);
    }

    #[test]
    fn blank_handle_does_not_count() {
        let out = dedupe_dialogs(vec![group(1, "X", None), group(2, "x", Some(" "))]);
        assert_eq!(ids(&out), vec![1]);
    }
}
