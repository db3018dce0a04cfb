//! Property tests for the convergence poller.

use std::cell::Cell;
use std::time::Duration;

use hc_common::{CommandResult, Error};
use hc_core::poll::RecordingSleeper;
use hc_core::{poll_with, CheckError, RetryPolicy};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A check that settles on call n is invoked exactly n times with n-1 delays.
    #[test]
    fn converges_after_exact_attempts(n in 1u32..40, extra in 0u32..10, delay_ms in 0u64..5_000) {
        let policy = RetryPolicy::new("settle", n + extra, Duration::from_millis(delay_ms));
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);

        let value = poll_with(&policy, &sleeper, || {
            calls.set(calls.get() + 1);
            if calls.get() < n {
                Err(CheckError::not_converged("not yet"))
            } else {
                Ok(calls.get())
            }
        })
        .unwrap();

        prop_assert_eq!(value, n);
        prop_assert_eq!(calls.get(), n);
        prop_assert_eq!(sleeper.count() as u32, n - 1);
        prop_assert!(sleeper.delays().iter().all(|d| *d == Duration::from_millis(delay_ms)));
    }

    /// A check that never settles uses the whole budget and never sleeps after the last call.
    #[test]
    fn exhaustion_reports_budget(max in 1u32..40) {
        let policy = RetryPolicy::new("never", max, Duration::from_millis(250));
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);

        let err = poll_with(&policy, &sleeper, || -> Result<(), CheckError> {
            calls.set(calls.get() + 1);
            Err(CheckError::observed(
                format!("attempt {}", calls.get()),
                &CommandResult::new("chronyc tracking", 0, "Leap status : Not synchronised", ""),
            ))
        })
        .unwrap_err();

        prop_assert_eq!(calls.get(), max);
        prop_assert_eq!(sleeper.count() as u32, max - 1);
        prop_assert_eq!(sleeper.total(), Duration::from_millis(250) * (max - 1));
        match err {
            Error::ConvergenceTimeout { check, attempts, reason, last } => {
                prop_assert_eq!(check, "never");
                prop_assert_eq!(attempts, max);
                prop_assert_eq!(reason, format!("attempt {}", max));
                prop_assert!(last.is_some());
            }
            other => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    /// A fatal error stops polling immediately.
    #[test]
    fn fatal_stops_polling(fail_at in 1u32..20, budget in 20u32..40) {
        let policy = RetryPolicy::new("fatal", budget, Duration::from_secs(1));
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);

        let err = poll_with(&policy, &sleeper, || -> Result<(), CheckError> {
            calls.set(calls.get() + 1);
            if calls.get() == fail_at {
                Err(CheckError::Fatal(Error::Transport("connection reset".into())))
            } else {
                Err(CheckError::not_converged("waiting"))
            }
        })
        .unwrap_err();

        prop_assert_eq!(calls.get(), fail_at);
        prop_assert_eq!(sleeper.count() as u32, fail_at - 1);
        prop_assert!(matches!(err, Error::Transport(_)));
    }
}

#[test]
fn zero_budget_still_checks_once() {
    let policy = RetryPolicy::new("zero", 0, Duration::from_secs(1));
    let sleeper = RecordingSleeper::new();
    let calls = Cell::new(0u32);

    let err = poll_with(&policy, &sleeper, || -> Result<(), CheckError> {
        calls.set(calls.get() + 1);
        Err(CheckError::not_converged("never"))
    })
    .unwrap_err();

    assert_eq!(calls.get(), 1);
    assert_eq!(sleeper.count(), 0);
    assert!(matches!(err, Error::ConvergenceTimeout { attempts: 1, .. }));
}
