// moodlesync-core/src/domain/retry.rs

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Result of one attempt, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Succeeded,
    Transient,
    Fatal,
}

/// Lifecycle of one guarded operation (a source fetch, a sheet write, the login).
///
/// `Success`, `Degraded` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceState {
    Pending,
    Attempting { attempt: u32 },
    Retrying { next_attempt: u32 },
    Success,
    /// Every attempt failed transiently.
    Degraded,
    /// A fatal failure stopped the attempts early.
    Aborted,
}

impl SourceState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SourceState::Success | SourceState::Degraded | SourceState::Aborted
        )
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceState::Pending => write!(f, "pending"),
            SourceState::Attempting { attempt } => write!(f, "attempting (#{})", attempt),
            SourceState::Retrying { next_attempt } => write!(f, "retrying (#{})", next_attempt),
            SourceState::Success => write!(f, "ok"),
            SourceState::Degraded => write!(f, "degraded"),
            SourceState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Bounded retry with a linear, capped delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// No waiting between attempts (tests, dry runs).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts)
            .with_base_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
    }

    /// State reached after the given attempt history.
    pub fn next_state(&self, history: &[AttemptOutcome]) -> SourceState {
        let Some(last) = history.last() else {
            return SourceState::Pending;
        };
        match last {
            AttemptOutcome::Succeeded => SourceState::Success,
            AttemptOutcome::Fatal => SourceState::Aborted,
            AttemptOutcome::Transient => {
                let done = history.len() as u32;
                if done < self.max_attempts {
                    SourceState::Retrying {
                        next_attempt: done + 1,
                    }
                } else {
                    SourceState::Degraded
                }
            }
        }
    }

    /// Wait before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_delay
            .saturating_mul(attempt - 1)
            .min(self.max_delay)
    }
}
