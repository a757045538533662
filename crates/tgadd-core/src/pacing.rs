use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Suspension source for every wait the engine makes.
///
/// Production uses `TokioSleeper`; tests substitute a recorder so waits are
/// counted instead of slept.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of a cancellable suspension, with the time actually spent waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pause {
    Completed(Duration),
    Cancelled(Duration),
}

impl Pause {
    pub fn waited(self) -> Duration {
        match self {
            Pause::Completed(d) | Pause::Cancelled(d) => d,
        }
    }

    pub fn is_cancelled(self) -> bool {
        matches!(self, Pause::Cancelled(_))
    }
}

/// Suspend for `duration` unless `cancel` fires first.
///
/// A zero duration returns immediately without touching the sleeper.
pub async fn pause(sleeper: &dyn Sleeper, cancel: &CancellationToken, duration: Duration) -> Pause {
    if cancel.is_cancelled() {
        return Pause::Cancelled(Duration::ZERO);
    }
    if duration.is_zero() {
        return Pause::Completed(Duration::ZERO);
    }

    let started = Instant::now();
    tokio::select! {
        _ = cancel.cancelled() => Pause::Cancelled(started.elapsed().min(duration)),
        _ = sleeper.sleep(duration) => Pause::Completed(duration),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records requested waits and returns immediately.
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn slept(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }

        pub fn total(&self) -> Duration {
            self.slept().into_iter().sum()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }
}
