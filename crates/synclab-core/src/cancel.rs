//! Cooperative cancellation.
//!
//! Every actor owns a [`CancelToken`]. Blocking calls never unwind on
//! cancellation; they return [`WaitOutcome::Cancelled`] (or
//! [`Outcome::Cancelled`] at the coordinator level) and leave the caller to
//! release whatever it holds.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a single suspension point.
#[must_use]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WaitOutcome {
    Woken,
    Cancelled,
}

impl WaitOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitOutcome::Cancelled)
    }
}

/// Result of a coordinator operation that may block.
#[must_use]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Answer to a request against a bounded resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Admission {
    Admitted,
    Rejected,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Shared stop flag with a cancellable sleep.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless cancelled first.
    pub fn sleep(&self, duration: Duration) -> WaitOutcome {
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.lock.lock();
        while !self.is_cancelled() {
            if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        if self.is_cancelled() {
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::Woken
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn sleep_runs_to_completion_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_millis(20)), WaitOutcome::Woken);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_cuts_a_long_sleep_short() {
        let token = CancelToken::new();
        let sleeper = token.clone();
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let outcome = sleeper.sleep(Duration::from_secs(30));
            (outcome, start.elapsed())
        });
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let (outcome, elapsed) = handle.join().unwrap();
        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn outcome_helpers() {
        assert_eq!(Outcome::Done(3).map(|v| v * 2).done(), Some(6));
        assert!(Outcome::<u8>::Cancelled.is_cancelled());
        assert_eq!(Outcome::<u8>::Cancelled.done(), None);
    }
}
