//! Per-candidate outcomes and the run report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::domain::CandidateIdentity;

/// Why a candidate ended in the failure list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    IdentityNotFound,
    UnsupportedGroupKind,
    PrivacyRestricted,
    RateLimitExhausted,
    PeerThrottled,
    AdminRequired,
    /// The run was cancelled while this candidate waited out a rate limit.
    Cancelled,
    Generic,
}

impl FailureKind {
    /// Kinds that stop the whole run.
    pub fn is_fatal(self) -> bool {
        matches!(self, FailureKind::PeerThrottled | FailureKind::AdminRequired)
    }
}

/// Terminal outcome of one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateOutcome {
    Added,
    AlreadyMember,
    Failed { kind: FailureKind, message: String },
}

impl CandidateOutcome {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        CandidateOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CandidateOutcome::Added | CandidateOutcome::AlreadyMember)
    }

    pub fn fatal_kind(&self) -> Option<FailureKind> {
        match self {
            CandidateOutcome::Failed { kind, .. } if kind.is_fatal() => Some(*kind),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// A fatal platform signal for `candidate`.
    Fatal { candidate: String, kind: FailureKind },
    /// Cancelled from outside (e.g. Ctrl-C) between requests.
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Fatal { candidate, kind } => {
                write!(f, "fatal {kind:?} signal while adding {candidate}")
            }
            AbortReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SuccessEntry {
    pub candidate: CandidateIdentity,
    pub already_member: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub candidate: CandidateIdentity,
    pub kind: FailureKind,
    pub message: String,
}

/// Final (possibly partial) report of one run.
#[derive(Clone, Debug, Serialize)]
pub struct BatchResult {
    pub succeeded: Vec<SuccessEntry>,
    pub failed: Vec<FailureEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
    /// Planned candidates never reached because the run stopped early.
    pub unprocessed: usize,
    #[serde(rename = "suspended_secs", serialize_with = "serialize_secs")]
    pub suspended: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && self.unprocessed == 0
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Append-only accumulator owned by the running engine.
#[derive(Debug)]
pub struct ResultAggregator {
    planned: usize,
    succeeded: Vec<SuccessEntry>,
    failed: Vec<FailureEntry>,
    aborted: Option<AbortReason>,
    suspended: Duration,
    started_at: DateTime<Utc>,
}

impl ResultAggregator {
    pub fn new(planned: usize) -> Self {
        Self {
            planned,
            succeeded: Vec::new(),
            failed: Vec::new(),
            aborted: None,
            suspended: Duration::ZERO,
            started_at: Utc::now(),
        }
    }

    pub fn record(&mut self, candidate: CandidateIdentity, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::Added => self.succeeded.push(SuccessEntry {
                candidate,
                already_member: false,
            }),
            CandidateOutcome::AlreadyMember => self.succeeded.push(SuccessEntry {
                candidate,
                already_member: true,
            }),
            CandidateOutcome::Failed { kind, message } => self.failed.push(FailureEntry {
                candidate,
                kind,
                message,
            }),
        }
    }

    pub fn add_suspension(&mut self, waited: Duration) {
        self.suspended += waited;
    }

    /// First abort reason wins.
    pub fn abort(&mut self, reason: AbortReason) {
        if self.aborted.is_none() {
            self.aborted = Some(reason);
        }
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn processed(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn suspended(&self) -> Duration {
        self.suspended
    }

    pub fn finish(self) -> BatchResult {
        let unprocessed = self.planned.saturating_sub(self.processed());
        BatchResult {
            succeeded: self.succeeded,
            failed: self.failed,
            aborted: self.aborted,
            unprocessed,
            suspended: self.suspended,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_land_in_the_right_list_in_order() {
        let mut agg = ResultAggregator::new(4);
        agg.record(CandidateIdentity::new("+1"), CandidateOutcome::Added);
        agg.record(
            CandidateIdentity::new("+2"),
            CandidateOutcome::failed(FailureKind::PrivacyRestricted, "privacy restricted"),
        );
        agg.record(CandidateIdentity::new("+3"), CandidateOutcome::AlreadyMember);
        assert_eq!(agg.success_count(), 2);
        assert_eq!(agg.failure_count(), 1);

        let res = agg.finish();
        let ok: Vec<&str> = res.succeeded.iter().map(|e| e.candidate.key.as_str()).collect();
        assert_eq!(ok, vec!["+1", "+3"]);
        assert!(res.succeeded[1].already_member);
        assert_eq!(res.failed[0].kind, FailureKind::PrivacyRestricted);
        assert_eq!(res.unprocessed, 1);
        assert!(!res.is_complete());
    }

    #[test]
    fn first_abort_reason_is_kept() {
        let mut agg = ResultAggregator::new(0);
        agg.abort(AbortReason::Cancelled);
        agg.abort(AbortReason::Fatal {
            candidate: "+1".to_string(),
            kind: FailureKind::PeerThrottled,
        });
        assert_eq!(agg.finish().aborted, Some(AbortReason::Cancelled));
    }

    #[test]
    fn fatal_kinds() {
        assert!(FailureKind::PeerThrottled.is_fatal());
        assert!(FailureKind::AdminRequired.is_fatal());
        assert!(!FailureKind::RateLimitExhausted.is_fatal());
        assert_eq!(
            CandidateOutcome::failed(FailureKind::AdminRequired, "x").fatal_kind(),
            Some(FailureKind::AdminRequired)
        );
        assert_eq!(CandidateOutcome::AlreadyMember.fatal_kind(), None);
    }

    #[test]
    fn report_serializes_to_json() {
        let mut agg = ResultAggregator::new(1);
        agg.record(
            CandidateIdentity::new("+9"),
            CandidateOutcome::failed(FailureKind::Generic, "boom"),
        );
        agg.add_suspension(Duration::from_millis(1500));
        agg.abort(AbortReason::Fatal {
            candidate: "+9".to_string(),
            kind: FailureKind::AdminRequired,
        });
        let v = serde_json::to_value(agg.finish()).unwrap();
        assert_eq!(v["failed"][0]["kind"], "generic");
        assert_eq!(v["failed"][0]["candidate"]["key"], "+9");
        assert_eq!(v["suspended_secs"], 1.5);
        assert_eq!(v["aborted"]["reason"], "fatal");
        assert_eq!(v["aborted"]["kind"], "admin_required");
        assert_eq!(v["unprocessed"], 0);
    }
}
