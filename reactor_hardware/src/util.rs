use std::time::Duration;

use reactor_traits::{BoxError, Clock, StopFlag};

use crate::error::{HwError, Result};

/// Call `op` up to `max_attempts` times, sleeping `base * 2^n` (capped at
/// `max_backoff`) between failures.
///
/// Returns `Cancelled` as soon as `stop` is raised between attempts.
pub fn retry_with_backoff<T>(
    clock: &impl Clock,
    stop: &StopFlag,
    max_attempts: u32,
    base: Duration,
    max_backoff: Duration,
    mut op: impl FnMut() -> std::result::Result<T, BoxError>,
) -> Result<T> {
    let attempts = max_attempts.max(1);
    let mut last = String::new();
    for attempt in 0..attempts {
        if stop.is_stop_requested() {
            return Err(HwError::Cancelled);
        }
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                last = e.to_string();
                tracing::debug!(attempt = attempt + 1, error = %last, "scale read failed");
                if attempt + 1 < attempts {
                    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                    let backoff = base.saturating_mul(factor).min(max_backoff);
                    clock.sleep(backoff);
                }
            }
        }
    }
    Err(HwError::RetriesExhausted {
        attempts,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reactor_traits::ManualClock;

    #[test]
    fn backs_off_exponentially_until_success() {
        let clock = ManualClock::new();
        let stop = StopFlag::new();
        let mut calls = 0;
        let v = retry_with_backoff(
            &clock,
            &stop,
            5,
            Duration::from_millis(10),
            Duration::from_secs(1),
            || {
                calls += 1;
                if calls < 3 { Err("nope".into()) } else { Ok(7) }
            },
        )
        .expect("third attempt succeeds");
        assert_eq!(v, 7);
        // 10 ms + 20 ms
        assert_eq!(clock.elapsed(), Duration::from_millis(30));
    }

    #[test]
    fn gives_up_with_last_error() {
        let clock = ManualClock::new();
        let err = retry_with_backoff::<()>(
            &clock,
            &StopFlag::new(),
            3,
            Duration::from_millis(10),
            Duration::from_millis(15),
            || Err("garbled".into()),
        )
        .expect_err("all attempts fail");
        match err {
            HwError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "garbled");
            }
            other => panic!("unexpected: {other:?}"),
        }
        // 10 ms + min(20, 15) ms
        assert_eq!(clock.elapsed(), Duration::from_millis(25));
    }

    #[test]
    fn stop_flag_cancels_before_first_attempt() {
        let stop = StopFlag::new();
        stop.request_stop();
        let err = retry_with_backoff::<()>(
            &ManualClock::new(),
            &stop,
            3,
            Duration::from_millis(1),
            Duration::from_millis(1),
            || Ok(()),
        )
        .expect_err("cancelled");
        assert!(matches!(err, HwError::Cancelled));
    }
}
