//! Convergence polling.
//!
//! System state on a host often settles some time after the command that
//! changed it: a restarted time daemon needs a while to lock, a driver needs
//! a moment to apply new ring sizes. [`poll`] samples a check at a fixed
//! interval until it converges, fails fatally, or the attempt budget runs out.
//!
//! The check decides what is retryable by returning
//! [`CheckError::NotConverged`] (sample again) or [`CheckError::Fatal`]
//! (stop now). Any `hc_common::Error` raised with `?` inside a check is fatal.

use std::time::Duration;

use hc_common::{CommandResult, Error, Result};
use hc_config::RetryPolicySpec;
use tracing::{debug, info, instrument, warn};

use crate::logging::event_names;

/// Bounded retry budget for one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Name of the check, used in errors and logs.
    pub label: String,

    /// Total number of check invocations allowed (at least one is always made).
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(label: impl Into<String>, max_attempts: u32, delay: Duration) -> Self {
        Self {
            label: label.into(),
            max_attempts,
            delay,
        }
    }

    /// Build from a configured budget.
    pub fn from_spec(label: impl Into<String>, spec: &RetryPolicySpec) -> Self {
        Self::new(label, spec.max_attempts, spec.delay())
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Outcome of a single failed check attempt.
#[derive(Debug)]
pub enum CheckError {
    /// State has not settled yet; try again after the delay.
    NotConverged {
        reason: String,
        last: Option<Box<CommandResult>>,
    },
    /// Stop polling and surface this error.
    Fatal(Error),
}

impl CheckError {
    pub fn not_converged(reason: impl Into<String>) -> Self {
        CheckError::NotConverged {
            reason: reason.into(),
            last: None,
        }
    }

    /// Not converged, remembering the command result that showed it.
    pub fn observed(reason: impl Into<String>, last: &CommandResult) -> Self {
        CheckError::NotConverged {
            reason: reason.into(),
            last: Some(Box::new(last.clone())),
        }
    }
}

impl From<Error> for CheckError {
    fn from(err: Error) -> Self {
        CheckError::Fatal(err)
    }
}

/// Something that can wait.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays without sleeping.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Number of sleeps requested.
    pub fn count(&self) -> usize {
        self.delays().len()
    }

    /// Sum of all requested delays.
    pub fn total(&self) -> Duration {
        self.delays().iter().sum()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

/// Poll `check` under `policy`, sleeping on the current thread.
pub fn poll<T, F>(policy: &RetryPolicy, check: F) -> Result<T>
where
    F: FnMut() -> std::result::Result<T, CheckError>,
{
    poll_with(policy, &ThreadSleeper, check)
}

/// Poll `check` under `policy` with an explicit sleeper.
///
/// Makes at most `max_attempts` calls and sleeps only between them, never
/// after the final one.
#[instrument(skip(sleeper, check), fields(check = %policy.label, max_attempts = policy.max_attempts))]
pub fn poll_with<T, F>(policy: &RetryPolicy, sleeper: &dyn Sleeper, mut check: F) -> Result<T>
where
    F: FnMut() -> std::result::Result<T, CheckError>,
{
    let attempts = policy.attempts();
    let mut last_reason = String::new();
    let mut last_result = None;

    for attempt in 1..=attempts {
        match check() {
            Ok(value) => {
                info!(target: event_names::POLL_CONVERGED, attempt, "check converged");
                return Ok(value);
            }
            Err(CheckError::Fatal(err)) => {
                warn!(attempt, error = %err, "check failed fatally");
                return Err(err);
            }
            Err(CheckError::NotConverged { reason, last }) => {
                debug!(target: event_names::POLL_ATTEMPT, attempt, %reason, "not converged");
                last_reason = reason;
                if last.is_some() {
                    last_result = last;
                }
            }
        }
        if attempt < attempts {
            sleeper.sleep(policy.delay);
        }
    }

    warn!(
        target: event_names::POLL_EXHAUSTED,
        attempts,
        reason = %last_reason,
        "check did not converge"
    );
    Err(Error::ConvergenceTimeout {
        check: policy.label.clone(),
        attempts,
        reason: last_reason,
        last: last_result,
    })
}
