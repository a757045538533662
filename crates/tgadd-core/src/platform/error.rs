/// Signals a platform call can fail with.
///
/// Add/invite calls use the whole set; listing calls usually surface
/// `Generic`, and resolution surfaces `NotFound` on a miss.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("identity not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {wait_seconds}s")]
    RateLimited { wait_seconds: u64 },

    #[error("user is already a participant")]
    AlreadyMember,

    #[error("privacy restricted")]
    PrivacyRestricted,

    #[error("peer flood: too many requests from this account")]
    PeerThrottled,

    #[error("admin privileges are required")]
    AdminRequired,

    #[error("unsupported group kind: {0}")]
    UnsupportedGroupKind(String),

    #[error("{0}")]
    Generic(String),
}

impl PlatformError {
    /// Signals after which the run cannot safely continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlatformError::PeerThrottled | PlatformError::AdminRequired)
    }
}
