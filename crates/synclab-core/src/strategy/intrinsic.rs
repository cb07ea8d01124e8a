//! The standard library's built-in monitor.

use super::{CondId, Section, StrategyKind, SyncStrategy};
use crate::cancel::{CancelToken, WaitOutcome};
use log::{trace, warn};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// `std::sync::Mutex` plus one `std::sync::Condvar` per wait reason.
///
/// A poisoned lock only means some actor panicked while holding it; the state
/// is still checked by the coordinator's invariant, so the guard is recovered.
pub struct IntrinsicMonitor<S> {
    state: Mutex<S>,
    conditions: Vec<Condvar>,
}

impl<S> IntrinsicMonitor<S> {
    pub fn new(state: S, conditions: usize) -> Self {
        Self {
            state: Mutex::new(state),
            conditions: (0..conditions).map(|_| Condvar::new()).collect(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("intrinsic monitor: recovering poisoned lock");
            PoisonError::into_inner(poisoned)
        })
    }
}

struct IntrinsicSection<'a, S> {
    // Only vacant for the duration of a `Condvar::wait` call.
    guard: Option<MutexGuard<'a, S>>,
    conditions: &'a [Condvar],
}

impl<S> Section<S> for IntrinsicSection<'_, S> {
    fn state(&mut self) -> &mut S {
        match self.guard.as_mut() {
            Some(guard) => guard,
            None => unreachable!("monitor section used while vacated"),
        }
    }

    fn wait_on(&mut self, cond: CondId, cancel: &CancelToken) -> WaitOutcome {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        let Some(guard) = self.guard.take() else {
            unreachable!("monitor section used while vacated");
        };
        trace!("monitor: parking on {}", cond.0);
        let guard = self.conditions[cond.0].wait(guard).unwrap_or_else(|poisoned| {
            warn!("intrinsic monitor: recovering poisoned lock after wait");
            PoisonError::into_inner(poisoned)
        });
        self.guard = Some(guard);
        if cancel.is_cancelled() {
            // Pass on a wakeup that may have been meant for a live waiter.
            self.conditions[cond.0].notify_one();
            WaitOutcome::Cancelled
        } else {
            WaitOutcome::Woken
        }
    }

    fn signal(&mut self, cond: CondId) {
        self.conditions[cond.0].notify_one();
    }

    fn signal_all(&mut self, cond: CondId) {
        self.conditions[cond.0].notify_all();
    }
}

impl<S: Send> SyncStrategy<S> for IntrinsicMonitor<S> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::IntrinsicMonitor
    }

    fn enter(&self) -> Box<dyn Section<S> + '_> {
        Box::new(IntrinsicSection {
            guard: Some(self.lock()),
            conditions: &self.conditions,
        })
    }

    fn interrupt(&self) {
        let _guard = self.lock();
        for condition in &self.conditions {
            condition.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn poisoned_lock_is_recovered() {
        let monitor = Arc::new(IntrinsicMonitor::new(5u32, 1));
        let poisoner = Arc::clone(&monitor);
        let result = thread::spawn(move || {
            let _section = poisoner.enter();
            panic!("actor died inside the section");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(*monitor.enter().state(), 5);
    }
}
