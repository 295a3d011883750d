// moodlesync-core/src/application/retry_shell.rs
//
// Runs an async operation under a RetryPolicy. The decisions come from the pure state machine in
// domain::retry; this file only sleeps and logs.

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::retry::{AttemptOutcome, RetryPolicy, SourceState};
use crate::error::{FailureClass, SyncError};

/// Terminal result of a guarded operation.
#[derive(Debug)]
pub enum ShellOutcome<T> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed transiently.
    Degraded { attempts: u32, last_error: SyncError },
    /// Stopped by a fatal error, remaining attempts unused.
    Aborted { attempts: u32, error: SyncError },
}

impl<T> ShellOutcome<T> {
    pub fn state(&self) -> SourceState {
        match self {
            ShellOutcome::Success { .. } => SourceState::Success,
            ShellOutcome::Degraded { .. } => SourceState::Degraded,
            ShellOutcome::Aborted { .. } => SourceState::Aborted,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ShellOutcome::Success { attempts, .. }
            | ShellOutcome::Degraded { attempts, .. }
            | ShellOutcome::Aborted { attempts, .. } => *attempts,
        }
    }

    /// The value, or the error that ended the attempts.
    pub fn into_result(self) -> Result<T, SyncError> {
        match self {
            ShellOutcome::Success { value, .. } => Ok(value),
            ShellOutcome::Degraded { last_error, .. } => Err(last_error),
            ShellOutcome::Aborted { error, .. } => Err(error),
        }
    }
}

fn outcome_of(err: &SyncError) -> AttemptOutcome {
    match err.class() {
        FailureClass::Transient => AttemptOutcome::Transient,
        FailureClass::Fatal => AttemptOutcome::Fatal,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryShell {
    policy: RetryPolicy,
}

impl RetryShell {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `op` (with the 1-based attempt number) until it succeeds, fails fatally, or the
    /// policy runs out of attempts.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> ShellOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut history: Vec<AttemptOutcome> = Vec::new();
        let mut attempt = 1;

        loop {
            debug!(what, state = %SourceState::Attempting { attempt }, "Attempt started");

            let err = match op(attempt).await {
                Ok(value) => {
                    return ShellOutcome::Success {
                        value,
                        attempts: attempt,
                    };
                }
                Err(err) => err,
            };
            history.push(outcome_of(&err));

            match self.policy.next_state(&history) {
                SourceState::Retrying { next_attempt } => {
                    let delay = self.policy.delay_before(next_attempt);
                    warn!(
                        what,
                        attempt,
                        max = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "⚠️  Attempt failed, retrying"
                    );
                    sleep(delay).await;
                    attempt = next_attempt;
                }
                SourceState::Aborted => {
                    return ShellOutcome::Aborted {
                        attempts: attempt,
                        error: err,
                    };
                }
                _ => {
                    return ShellOutcome::Degraded {
                        attempts: attempt,
                        last_error: err,
                    };
                }
            }
        }
    }
}
