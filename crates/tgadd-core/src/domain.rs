use serde::Serialize;

/// Platform group/channel id (numeric, as reported by the dialog listing).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct GroupId(pub i64);

/// Kind of target group. Decides which add request is dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    BasicGroup,
    Channel,
}

impl GroupKind {
    pub fn label(self) -> &'static str {
        match self {
            GroupKind::BasicGroup => "group",
            GroupKind::Channel => "channel",
        }
    }
}

/// A group or channel as observed in the account's dialog list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupDescriptor {
    pub id: GroupId,
    pub title: String,
    pub handle: Option<String>,
    pub kind: GroupKind,
    pub member_count: Option<u64>,
}

impl GroupDescriptor {
    /// True when the descriptor exposes a non-empty public handle.
    pub fn has_handle(&self) -> bool {
        self.handle
            .as_deref()
            .map(|h| !h.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Address-book entry as returned by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub phone: Option<String>,
}

/// Current member of a group; only the phone matters for exclusion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub phone: Option<String>,
}

/// An identity queued for addition.
///
/// `key` is the canonical contact key: a `+`-prefixed phone or an `@handle`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CandidateIdentity {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CandidateIdentity {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: None,
        }
    }

    pub fn named(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        let name = display_name.into();
        let trimmed = name.trim();
        Self {
            key: key.into(),
            display_name: if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            },
        }
    }
}

impl std::fmt::Display for CandidateIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{} ({name})", self.key),
            None => f.write_str(&self.key),
        }
    }
}

/// Opaque platform identity returned by resolution and passed back to add calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerRef {
    pub user_id: i64,
    pub access_hash: Option<i64>,
}

/// Canonical leading-`+` phone form; empty input stays empty.
pub fn normalize_phone(raw: &str) -> String {
    let phone = raw.trim();
    if phone.is_empty() || phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}
