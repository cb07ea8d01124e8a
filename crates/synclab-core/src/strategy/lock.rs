//! Plain mutual exclusion with polling waits.

use super::{CondId, Section, StrategyKind, SyncStrategy};
use crate::cancel::{CancelToken, WaitOutcome};
use log::trace;
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

/// A single lock. Waiting means dropping the lock for one poll interval and
/// re-checking, so signals carry no information and are ignored.
pub struct PollingLock<S> {
    state: Mutex<S>,
    poll_interval: Duration,
}

impl<S> PollingLock<S> {
    pub fn new(state: S, poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(state),
            poll_interval,
        }
    }
}

struct LockSection<'a, S> {
    guard: MutexGuard<'a, S>,
    poll_interval: Duration,
}

impl<S> Section<S> for LockSection<'_, S> {
    fn state(&mut self) -> &mut S {
        &mut self.guard
    }

    fn wait_on(&mut self, cond: CondId, cancel: &CancelToken) -> WaitOutcome {
        trace!("lock: polling on condition {}", cond.0);
        let poll = self.poll_interval;
        MutexGuard::unlocked(&mut self.guard, || cancel.sleep(poll))
    }

    fn signal(&mut self, _cond: CondId) {}

    fn signal_all(&mut self, _cond: CondId) {}
}

impl<S: Send> SyncStrategy<S> for PollingLock<S> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Lock
    }

    fn enter(&self) -> Box<dyn Section<S> + '_> {
        Box::new(LockSection {
            guard: self.state.lock(),
            poll_interval: self.poll_interval,
        })
    }

    fn interrupt(&self) {
        // Pollers sleep on their own cancel token, which wakes them directly.
    }
}
