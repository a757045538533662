//! Chunked batch scheduling.
//!
//! A run splits the planned candidates into fixed-size chunks and feeds them,
//! strictly one after another, into the addition state machine, pausing
//! between chunks. A fatal platform signal or cancellation stops the run;
//! whatever was recorded up to that point is returned.

use std::{collections::HashSet, num::NonZeroUsize, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    domain::{CandidateIdentity, GroupDescriptor},
    engine::{AdditionStateMachine, EngineSettings, Flow, RunState},
    pacing::{pause, Sleeper, TokioSleeper},
    platform::PlatformClient,
    progress::{NoopObserver, ProgressEvent, ProgressObserver},
    report::{AbortReason, BatchResult},
    Error, Result,
};

/// Split `items` into consecutive chunks of `size`; the last may be shorter.
pub fn partition<T>(items: &[T], size: NonZeroUsize) -> Vec<&[T]> {
    items.chunks(size.get()).collect()
}

/// Ordered, duplicate-free candidates selected for one run.
#[derive(Clone, Debug, Default)]
pub struct BatchPlan {
    candidates: Vec<CandidateIdentity>,
    offset: usize,
    duplicates_dropped: usize,
}

impl BatchPlan {
    /// Select `count` candidates starting at `offset` (all remaining when `count` is `None`).
    ///
    /// Repeated keys are dropped first, keeping the first occurrence; `offset`
    /// indexes the deduplicated list. A count past the end is clamped.
    pub fn new(
        candidates: Vec<CandidateIdentity>,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Self> {
        let before = candidates.len();
        let mut seen = HashSet::new();
        let unique: Vec<CandidateIdentity> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.key.clone()))
            .collect();
        let duplicates_dropped = before - unique.len();
        if duplicates_dropped > 0 {
            tracing::warn!(duplicates_dropped, "dropped repeated candidates");
        }

        let invalid = || Error::InvalidRange {
            offset,
            count,
            available: unique.len(),
        };
        if count == Some(0) {
            return Err(invalid());
        }
        if unique.is_empty() {
            if offset != 0 {
                return Err(invalid());
            }
            return Ok(Self {
                candidates: unique,
                offset,
                duplicates_dropped,
            });
        }
        if offset >= unique.len() {
            return Err(invalid());
        }

        let remaining = unique.len() - offset;
        let take = count.map_or(remaining, |c| c.min(remaining));
        let candidates = unique.into_iter().skip(offset).take(take).collect();

        Ok(Self {
            candidates,
            offset,
            duplicates_dropped,
        })
    }

    pub fn candidates(&self) -> &[CandidateIdentity] {
        &self.candidates
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn chunks(&self, size: NonZeroUsize) -> Vec<&[CandidateIdentity]> {
        partition(&self.candidates, size)
    }
}

/// Entry point of the batch-add engine.
#[derive(Clone)]
pub struct ChunkScheduler {
    platform: Arc<dyn PlatformClient>,
    settings: EngineSettings,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl ChunkScheduler {
    pub fn new(platform: Arc<dyn PlatformClient>, settings: EngineSettings) -> Self {
        Self {
            platform,
            settings,
            sleeper: Arc::new(TokioSleeper),
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run the whole plan against `group`. Never fails; the result may be partial.
    pub async fn run(&self, group: &GroupDescriptor, plan: &BatchPlan) -> BatchResult {
        let chunks = plan.chunks(self.settings.chunk_size);
        let mut run = RunState::new(plan.len());

        self.observer.on_event(&ProgressEvent::RunStarted {
            group: group.clone(),
            candidates: plan.len(),
            chunks: chunks.len(),
        });

        let machine = AdditionStateMachine {
            platform: self.platform.as_ref(),
            settings: &self.settings,
            sleeper: self.sleeper.as_ref(),
            observer: self.observer.as_ref(),
            cancel: &self.cancel,
        };

        for (index, chunk) in chunks.iter().enumerate() {
            self.observer.on_event(&ProgressEvent::ChunkStarted {
                index,
                chunks: chunks.len(),
                len: chunk.len(),
            });

            if let Flow::Abort(reason) = machine.process_chunk(group, chunk, &mut run).await {
                self.observer
                    .on_event(&ProgressEvent::RunAborted { reason: reason.clone() });
                run.results.abort(reason);
                break;
            }

            self.observer.on_event(&ProgressEvent::ChunkFinished {
                index,
                succeeded: run.results.success_count(),
                failed: run.results.failure_count(),
            });

            if index + 1 < chunks.len() {
                self.observer.on_event(&ProgressEvent::ChunkPause {
                    next_index: index + 1,
                    delay: self.settings.chunk_delay,
                });
                let paused =
                    pause(self.sleeper.as_ref(), &self.cancel, self.settings.chunk_delay).await;
                run.results.add_suspension(paused.waited());
                if paused.is_cancelled() {
                    let reason = AbortReason::Cancelled;
                    self.observer
                        .on_event(&ProgressEvent::RunAborted { reason: reason.clone() });
                    run.results.abort(reason);
                    break;
                }
            }
        }

        let result = run.results.finish();
        self.observer.on_event(&ProgressEvent::RunFinished {
            succeeded: result.success_count(),
            failed: result.failure_count(),
        });
        result
    }
}
