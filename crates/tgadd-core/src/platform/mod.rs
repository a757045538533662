//! Messaging platform boundary.
//!
//! The engine only talks to the platform through `PlatformClient`; the real
//! protocol client lives in an adapter crate.

mod error;
pub mod port;
#[cfg(test)]
pub(crate) mod scripted;

pub use error::PlatformError;
pub use port::PlatformClient;
