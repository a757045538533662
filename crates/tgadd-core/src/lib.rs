//! Batch enrollment of contacts into a messaging-platform group or channel.
//!
//! The core is the batch-add engine (`scheduler` + `engine`): it paces
//! requests one at a time, retries in place on flood-wait signals, stops on
//! fatal signals, and always returns a report. The platform client lives
//! behind `platform::PlatformClient`, implemented in adapter crates.

pub mod candidates;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod intake;
pub mod logging;
pub mod pacing;
pub mod platform;
pub mod progress;
pub mod report;
pub mod scheduler;

pub use errors::{Error, Result};
