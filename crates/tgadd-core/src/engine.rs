//! Per-candidate addition state machine.
//!
//! One candidate at a time moves `Pending -> Resolving -> Adding` and ends in
//! a terminal state. A rate-limit signal sends it through `Retrying` back to
//! `Pending` at the head of the chunk's work queue, so it is re-attempted
//! before anything behind it.

use std::{collections::VecDeque, num::NonZeroUsize, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    domain::{CandidateIdentity, GroupDescriptor, GroupKind},
    pacing::{pause, Sleeper},
    platform::{PlatformClient, PlatformError},
    progress::{ProgressEvent, ProgressObserver},
    report::{AbortReason, CandidateOutcome, FailureKind, ResultAggregator},
};

pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_CHUNK_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_FORWARD_LIMIT: u32 = 50;

const RETRIES_EXHAUSTED: &str = "rate-limit retries exhausted";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub chunk_size: NonZeroUsize,
    /// Pause after each finished candidate (`R`).
    pub request_delay: Duration,
    /// Pause between chunks (`D`).
    pub chunk_delay: Duration,
    /// Rate-limit retries allowed per candidate before giving up.
    pub max_retries: u32,
    /// History messages forwarded to users added to a basic group.
    pub forward_limit: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_size: NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            request_delay: DEFAULT_REQUEST_DELAY,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            forward_limit: DEFAULT_FORWARD_LIMIT,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            chunk_size: cfg.chunk_size,
            request_delay: cfg.request_delay,
            chunk_delay: cfg.chunk_delay,
            max_retries: cfg.max_retries,
            forward_limit: cfg.forward_limit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptState {
    Pending,
    Resolving,
    Adding,
    Succeeded,
    AlreadyMember,
    Failed,
    Retrying,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptState::Succeeded | AttemptState::AlreadyMember | AttemptState::Failed
        )
    }

    pub fn can_transition_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Pending, Resolving)
                | (Resolving, Adding)
                | (Resolving, Failed)
                | (Resolving, Retrying)
                | (Adding, Succeeded)
                | (Adding, AlreadyMember)
                | (Adding, Failed)
                | (Adding, Retrying)
                | (Retrying, Pending)
                | (Retrying, Failed)
        )
    }
}

/// A candidate travelling through the state machine.
#[derive(Clone, Debug)]
pub struct AdditionAttempt {
    pub candidate: CandidateIdentity,
    pub state: AttemptState,
    pub retries: u32,
    pub last_error: Option<PlatformError>,
}

impl AdditionAttempt {
    pub fn new(candidate: CandidateIdentity) -> Self {
        Self {
            candidate,
            state: AttemptState::Pending,
            retries: 0,
            last_error: None,
        }
    }

    fn transition(&mut self, next: AttemptState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {next:?}",
            self.state
        );
        tracing::trace!(candidate = %self.candidate.key, from = ?self.state, to = ?next, "attempt state");
        self.state = next;
    }

    fn finish(&mut self, outcome: CandidateOutcome) -> Step {
        let next = match &outcome {
            CandidateOutcome::Added => AttemptState::Succeeded,
            CandidateOutcome::AlreadyMember => AttemptState::AlreadyMember,
            CandidateOutcome::Failed { .. } => AttemptState::Failed,
        };
        self.transition(next);
        Step::Done(outcome)
    }
}

/// What the chunk loop does after one pass of an attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    Done(CandidateOutcome),
    Retry(Duration),
}

/// Whether the scheduler may dispatch further chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Abort(AbortReason),
}

/// Mutable state of one run, owned by the scheduler and lent to each chunk.
pub(crate) struct RunState {
    pub results: ResultAggregator,
    pub total: usize,
    pub started: usize,
}

impl RunState {
    pub fn new(total: usize) -> Self {
        Self {
            results: ResultAggregator::new(total),
            total,
            started: 0,
        }
    }

    fn is_last(&self) -> bool {
        self.results.processed() >= self.total
    }
}

pub(crate) struct AdditionStateMachine<'a> {
    pub platform: &'a dyn PlatformClient,
    pub settings: &'a EngineSettings,
    pub sleeper: &'a dyn Sleeper,
    pub observer: &'a dyn ProgressObserver,
    pub cancel: &'a CancellationToken,
}

impl AdditionStateMachine<'_> {
    /// Drive every candidate of `chunk` to a terminal state, in order.
    pub async fn process_chunk(
        &self,
        group: &GroupDescriptor,
        chunk: &[CandidateIdentity],
        run: &mut RunState,
    ) -> Flow {
        let mut queue: VecDeque<AdditionAttempt> =
            chunk.iter().cloned().map(AdditionAttempt::new).collect();

        while let Some(mut attempt) = queue.pop_front() {
            if self.cancel.is_cancelled() {
                return Flow::Abort(AbortReason::Cancelled);
            }

            if attempt.retries == 0 {
                run.started += 1;
            }
            self.observer.on_event(&ProgressEvent::CandidateStarted {
                position: run.started,
                total: run.total,
                candidate: attempt.candidate.clone(),
                retry: attempt.retries,
            });

            match self.run_attempt(group, &mut attempt).await {
                Step::Retry(wait) => {
                    self.observer.on_event(&ProgressEvent::RateLimited {
                        candidate: attempt.candidate.clone(),
                        wait,
                        retry: attempt.retries,
                        max_retries: self.settings.max_retries,
                    });
                    let paused = pause(self.sleeper, self.cancel, wait).await;
                    run.results.add_suspension(paused.waited());
                    if paused.is_cancelled() {
                        // The candidate was reached, so it stays in the report.
                        attempt.transition(AttemptState::Failed);
                        let outcome = CandidateOutcome::failed(
                            FailureKind::Cancelled,
                            "cancelled during rate-limit wait",
                        );
                        self.observer.on_event(&ProgressEvent::CandidateFinished {
                            candidate: attempt.candidate.clone(),
                            outcome: outcome.clone(),
                        });
                        run.results.record(attempt.candidate, outcome);
                        return Flow::Abort(AbortReason::Cancelled);
                    }
                    attempt.transition(AttemptState::Pending);
                    queue.push_front(attempt);
                }
                Step::Done(outcome) => {
                    let fatal = outcome.fatal_kind();
                    self.observer.on_event(&ProgressEvent::CandidateFinished {
                        candidate: attempt.candidate.clone(),
                        outcome: outcome.clone(),
                    });
                    let key = attempt.candidate.key.clone();
                    run.results.record(attempt.candidate, outcome);

                    if let Some(kind) = fatal {
                        return Flow::Abort(AbortReason::Fatal {
                            candidate: key,
                            kind,
                        });
                    }

                    if !run.is_last() {
                        let paused =
                            pause(self.sleeper, self.cancel, self.settings.request_delay).await;
                        run.results.add_suspension(paused.waited());
                        if paused.is_cancelled() {
                            return Flow::Abort(AbortReason::Cancelled);
                        }
                    }
                }
            }
        }

        Flow::Continue
    }

    async fn run_attempt(&self, group: &GroupDescriptor, attempt: &mut AdditionAttempt) -> Step {
        attempt.transition(AttemptState::Resolving);
        let peer = match self.platform.resolve_identity(&attempt.candidate.key).await {
            Ok(peer) => peer,
            Err(PlatformError::RateLimited { wait_seconds }) => {
                return self.rate_limited(attempt, wait_seconds);
            }
            Err(err) if err.is_fatal() => {
                let kind = match &err {
                    PlatformError::PeerThrottled => FailureKind::PeerThrottled,
                    _ => FailureKind::AdminRequired,
                };
                let message = err.to_string();
                attempt.last_error = Some(err);
                return attempt.finish(CandidateOutcome::failed(kind, message));
            }
            Err(err) => {
                let message = match &err {
                    PlatformError::NotFound(_) => "identity not found".to_string(),
                    other => other.to_string(),
                };
                attempt.last_error = Some(err);
                return attempt.finish(CandidateOutcome::failed(
                    FailureKind::IdentityNotFound,
                    message,
                ));
            }
        };

        attempt.transition(AttemptState::Adding);
        let res = match group.kind {
            GroupKind::Channel => self.platform.invite_to_channel(group.id, &peer).await,
            GroupKind::BasicGroup => {
                self.platform
                    .add_to_basic_group(group.id, &peer, self.settings.forward_limit)
                    .await
            }
        };

        let err = match res {
            Ok(()) => return attempt.finish(CandidateOutcome::Added),
            Err(err) => err,
        };

        let outcome = match &err {
            PlatformError::RateLimited { wait_seconds } => {
                return self.rate_limited(attempt, *wait_seconds);
            }
            PlatformError::AlreadyMember => CandidateOutcome::AlreadyMember,
            PlatformError::PrivacyRestricted => {
                CandidateOutcome::failed(FailureKind::PrivacyRestricted, "privacy restricted")
            }
            PlatformError::PeerThrottled => {
                CandidateOutcome::failed(FailureKind::PeerThrottled, err.to_string())
            }
            PlatformError::AdminRequired => {
                CandidateOutcome::failed(FailureKind::AdminRequired, err.to_string())
            }
            PlatformError::UnsupportedGroupKind(_) => {
                CandidateOutcome::failed(FailureKind::UnsupportedGroupKind, err.to_string())
            }
            PlatformError::NotFound(_) => {
                CandidateOutcome::failed(FailureKind::IdentityNotFound, "identity not found")
            }
            PlatformError::Generic(message) => {
                CandidateOutcome::failed(FailureKind::Generic, message.clone())
            }
        };
        attempt.last_error = Some(err);
        attempt.finish(outcome)
    }

    fn rate_limited(&self, attempt: &mut AdditionAttempt, wait_seconds: u64) -> Step {
        attempt.last_error = Some(PlatformError::RateLimited { wait_seconds });
        if attempt.retries >= self.settings.max_retries {
            return attempt.finish(CandidateOutcome::failed(
                FailureKind::RateLimitExhausted,
                RETRIES_EXHAUSTED,
            ));
        }
        attempt.retries += 1;
        attempt.transition(AttemptState::Retrying);
        Step::Retry(Duration::from_secs(wait_seconds))
    }
}
