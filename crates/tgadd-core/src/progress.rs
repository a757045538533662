//! Progress reporting for a batch run.
//!
//! The engine emits events to an injected observer rather than logging
//! directly, so callers can render progress however they like.

use std::time::Duration;

use crate::{
    domain::{CandidateIdentity, GroupDescriptor},
    report::{AbortReason, CandidateOutcome},
};

#[derive(Clone, Debug)]
pub enum ProgressEvent {
    RunStarted {
        group: GroupDescriptor,
        candidates: usize,
        chunks: usize,
    },
    ChunkStarted {
        index: usize,
        chunks: usize,
        len: usize,
    },
    /// `position` is 1-based across the run; `retry` is 0 on the first attempt.
    CandidateStarted {
        position: usize,
        total: usize,
        candidate: CandidateIdentity,
        retry: u32,
    },
    RateLimited {
        candidate: CandidateIdentity,
        wait: Duration,
        retry: u32,
        max_retries: u32,
    },
    CandidateFinished {
        candidate: CandidateIdentity,
        outcome: CandidateOutcome,
    },
    ChunkFinished {
        index: usize,
        succeeded: usize,
        failed: usize,
    },
    ChunkPause {
        next_index: usize,
        delay: Duration,
    },
    RunAborted {
        reason: AbortReason,
    },
    RunFinished {
        succeeded: usize,
        failed: usize,
    },
}

pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Observer that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

/// Observer that logs progress through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted {
                group,
                candidates,
                chunks,
            } => tracing::info!(
                group = %group.title,
                kind = group.kind.label(),
                candidates,
                chunks,
                "starting batch add"
            ),
            ProgressEvent::ChunkStarted { index, chunks, len } => {
                tracing::info!("chunk {}/{chunks} ({len} candidates)", index + 1)
            }
            ProgressEvent::CandidateStarted {
                position,
                total,
                candidate,
                retry,
            } => {
                if *retry == 0 {
                    tracing::info!("processing {position}/{total}: {candidate}");
                } else {
                    tracing::info!("retrying {position}/{total}: {candidate} (retry {retry})");
                }
            }
            ProgressEvent::RateLimited {
                candidate,
                wait,
                retry,
                max_retries,
            } => tracing::warn!(
                candidate = %candidate.key,
                "flood wait {}s, retry {retry}/{max_retries}",
                wait.as_secs()
            ),
            ProgressEvent::CandidateFinished { candidate, outcome } => match outcome {
                CandidateOutcome::Added => tracing::info!("added {}", candidate.key),
                CandidateOutcome::AlreadyMember => {
                    tracing::info!("{} is already a member", candidate.key)
                }
                CandidateOutcome::Failed { kind, message } => {
                    tracing::error!(candidate = %candidate.key, ?kind, "failed: {message}")
                }
            },
            ProgressEvent::ChunkFinished {
                index,
                succeeded,
                failed,
            } => tracing::info!(
                "chunk {} done: {succeeded} added so far, {failed} failed so far",
                index + 1
            ),
            ProgressEvent::ChunkPause { next_index, delay } => tracing::info!(
                "pausing {}s before chunk {}",
                delay.as_secs(),
                next_index + 1
            ),
            ProgressEvent::RunAborted { reason } => {
                tracing::error!("run aborted: {reason}")
            }
            ProgressEvent::RunFinished { succeeded, failed } => {
                tracing::info!("batch finished: {succeeded} added, {failed} failed")
            }
        }
    }
}
