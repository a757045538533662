//! JSON shapes exchanged with the bridge helper.

use serde::{Deserialize, Serialize};

use tgadd_core::{
    domain::{Contact, GroupDescriptor, GroupId, GroupKind, PeerRef},
    platform::{port::PlatformResult, PlatformError},
};

#[derive(Serialize, Debug)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum BridgeOp<'a> {
    ListDialogs,
    ListParticipants {
        group_id: i64,
        kind: GroupKind,
    },
    ListContacts,
    Resolve {
        key: &'a str,
    },
    InviteToChannel {
        channel_id: i64,
        user_id: i64,
        access_hash: Option<i64>,
    },
    AddChatUser {
        chat_id: i64,
        user_id: i64,
        access_hash: Option<i64>,
        fwd_limit: u32,
    },
}

#[derive(Serialize, Debug)]
pub(crate) struct Envelope<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub op: BridgeOp<'a>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct Response {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct ErrorBody {
    pub kind: String,
    #[serde(default)]
    pub seconds: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    pub fn into_result(self) -> PlatformResult<serde_json::Value> {
        if self.ok {
            return Ok(self.result);
        }
        let body = self.error.unwrap_or_default();
        Err(decode_error(&body.kind, body.seconds, body.message.as_deref()))
    }
}

/// Wait applied when a flood-wait signal carries no usable duration.
pub const MIN_FLOOD_WAIT_SECS: u64 = 1;

/// Map a bridge error to a platform signal.
///
/// Accepts the bridge's own snake_case kinds as well as raw Telegram RPC
/// error names (`FLOOD_WAIT_30`, `USER_PRIVACY_RESTRICTED`, ...).
pub fn decode_error(kind: &str, seconds: Option<u64>, message: Option<&str>) -> PlatformError {
    let upper = kind.trim().to_ascii_uppercase();
    let detail = || {
        message
            .map(str::to_string)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.to_string())
    };

    if let Some(rest) = upper.strip_prefix("FLOOD_WAIT") {
        let from_name = rest.trim_start_matches('_').parse::<u64>().ok();
        return PlatformError::RateLimited {
            wait_seconds: seconds
                .or(from_name)
                .unwrap_or(MIN_FLOOD_WAIT_SECS)
                .max(MIN_FLOOD_WAIT_SECS),
        };
    }

    match upper.as_str() {
        "NOT_FOUND" | "USERNAME_NOT_OCCUPIED" | "USERNAME_INVALID" | "PHONE_NOT_OCCUPIED" => {
            PlatformError::NotFound(detail())
        }
        "ALREADY_PARTICIPANT" | "USER_ALREADY_PARTICIPANT" => PlatformError::AlreadyMember,
        "PRIVACY_RESTRICTED" | "USER_PRIVACY_RESTRICTED" => PlatformError::PrivacyRestricted,
        "PEER_FLOOD" => PlatformError::PeerThrottled,
        "ADMIN_REQUIRED" | "CHAT_ADMIN_REQUIRED" => PlatformError::AdminRequired,
        "UNSUPPORTED_GROUP" | "CHANNEL_INVALID" => PlatformError::UnsupportedGroupKind(detail()),
        _ => PlatformError::Generic(detail()),
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct WireDialog {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub participants_count: Option<u64>,
}

impl WireDialog {
    /// `None` for dialogs that are not groups or channels.
    pub fn into_descriptor(self) -> Option<GroupDescriptor> {
        let kind = match self.kind.to_ascii_lowercase().as_str() {
            "channel" | "megagroup" | "supergroup" => GroupKind::Channel,
            "chat" | "group" => GroupKind::BasicGroup,
            _ => return None,
        };
        Some(GroupDescriptor {
            id: GroupId(self.id),
            title: self.title,
            handle: self.username.filter(|u| !u.trim().is_empty()),
            kind,
            member_count: self.participants_count,
        })
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct WireUser {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl WireUser {
    pub fn into_contact(self) -> Contact {
        let name = format!(
            "{} {}",
            self.first_name.unwrap_or_default(),
            self.last_name.unwrap_or_default()
        );
        Contact {
            name,
            phone: self.phone.filter(|p| !p.trim().is_empty()),
        }
    }
}

#[derive(Deserialize, Debug)]
pub(crate) struct WirePeer {
    pub user_id: i64,
    #[serde(default)]
    pub access_hash: Option<i64>,
    #[serde(default = "default_true")]
    pub is_user: bool,
}

fn default_true() -> bool {
    true
}

impl WirePeer {
    pub fn into_peer(self) -> PlatformResult<PeerRef> {
        if !self.is_user {
            return Err(PlatformError::Generic("Entity is not a user".to_string()));
        }
        Ok(PeerRef {
            user_id: self.user_id,
            access_hash: self.access_hash,
        })
    }
}
