use crate::platform::PlatformError;

/// Core error type for tgadd.
///
/// Per-candidate platform failures never surface here during a run; they are
/// captured in the `BatchResult`. This type covers setup: configuration,
/// candidate intake, and the platform calls made before the engine starts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid range: offset {offset}, count {count:?} ({available} candidates available)")]
    InvalidRange {
        offset: usize,
        count: Option<usize>,
        available: usize,
    },

    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
