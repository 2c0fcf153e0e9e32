//! Retransmission timers (spec.md §4.1, §5). Two shapes cover every timer
//! this protocol needs: a bounded retry used by the handshake and the
//! finish phase (give up after a fixed number of attempts), and an
//! unbounded retry used by per-position data retransmission (resend until
//! acknowledged or the connection tears down).

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Handshake/finish retries give up after this many total transmissions
/// (the initial send plus 3 retransmissions), per spec.md §4.1.
pub const HANDSHAKE_ATTEMPTS: u32 = 4;

#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// `progressed` reported success after some attempt.
    Progressed,
    /// All attempts were spent without progress.
    Exhausted,
    /// The `terminated` flag was observed set; the caller is tearing down.
    Cancelled,
}

/// Runs `send` then waits `rto`, up to `attempts` times, stopping early if
/// `progressed` reports success or `terminated` is set. `send` receives the
/// 1-based attempt number it is performing.
pub fn bounded_retry(
    attempts: u32,
    rto: Duration,
    terminated: &AtomicBool,
    mut send: impl FnMut(u32),
    mut progressed: impl FnMut() -> bool,
) -> RetryOutcome {
    for attempt in 1..=attempts {
        send(attempt);
        thread::sleep(rto);

        if terminated.load(Ordering::Acquire) {
            return RetryOutcome::Cancelled;
        }
        if progressed() {
            return RetryOutcome::Progressed;
        }
    }

    RetryOutcome::Exhausted
}

/// Sleeps `rto`, then retransmits and repeats for as long as `still_pending`
/// keeps returning `true`. Used for the per-position DATA retransmission
/// timer, which has no retry ceiling (spec.md §5: "Data retransmission is
/// unbounded").
pub fn unbounded_retry(
    rto: Duration,
    terminated: &AtomicBool,
    mut still_pending: impl FnMut() -> bool,
    mut retransmit: impl FnMut(),
) {
    loop {
        thread::sleep(rto);

        if terminated.load(Ordering::Acquire) {
            return;
        }
        if !still_pending() {
            return;
        }
        retransmit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn bounded_retry_stops_on_progress() {
        let terminated = AtomicBool::new(false);
        let sends = AtomicU32::new(0);

        let outcome = bounded_retry(
            HANDSHAKE_ATTEMPTS,
            Duration::from_millis(1),
            &terminated,
            |_attempt| {
                sends.fetch_add(1, Ordering::Relaxed);
            },
            || sends.load(Ordering::Relaxed) == 2,
        );

        assert_eq!(outcome, RetryOutcome::Progressed);
        assert_eq!(sends.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn bounded_retry_exhausts_after_fixed_attempts() {
        let terminated = AtomicBool::new(false);
        let sends = AtomicU32::new(0);

        let outcome = bounded_retry(
            HANDSHAKE_ATTEMPTS,
            Duration::from_millis(1),
            &terminated,
            |_attempt| {
                sends.fetch_add(1, Ordering::Relaxed);
            },
            || false,
        );

        assert_eq!(outcome, RetryOutcome::Exhausted);
        assert_eq!(sends.load(Ordering::Relaxed), HANDSHAKE_ATTEMPTS);
    }

    #[test]
    fn unbounded_retry_stops_when_no_longer_pending() {
        let terminated = AtomicBool::new(false);
        let retries = AtomicU32::new(0);

        unbounded_retry(
            Duration::from_millis(1),
            &terminated,
            || retries.load(Ordering::Relaxed) < 3,
            || {
                retries.fetch_add(1, Ordering::Relaxed);
            },
        );

        assert_eq!(retries.load(Ordering::Relaxed), 3);
    }
}
