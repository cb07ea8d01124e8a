//! Explicit lock object with one condition object per wait reason.

use super::{CondId, Section, StrategyKind, SyncStrategy};
use crate::cancel::{CancelToken, WaitOutcome};
use log::trace;
use parking_lot::{Condvar, Mutex, MutexGuard};

pub struct ConditionMonitor<S> {
    state: Mutex<S>,
    conditions: Vec<Condvar>,
}

impl<S> ConditionMonitor<S> {
    pub fn new(state: S, conditions: usize) -> Self {
        Self {
            state: Mutex::new(state),
            conditions: (0..conditions).map(|_| Condvar::new()).collect(),
        }
    }
}

struct ConditionSection<'a, S> {
    guard: MutexGuard<'a, S>,
    conditions: &'a [Condvar],
}

impl<S> Section<S> for ConditionSection<'_, S> {
    fn state(&mut self) -> &mut S {
        &mut self.guard
    }

    fn wait_on(&mut self, cond: CondId, cancel: &CancelToken) -> WaitOutcome {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        trace!("condition: parking on {}", cond.0);
        self.conditions[cond.0].wait(&mut self.guard);
        if cancel.is_cancelled() {
            // The wakeup may have been meant for a live waiter; hand it on.
            // Extra wakeups are harmless since every waiter re-checks.
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

impl<S: Send> SyncStrategy<S> for ConditionMonitor<S> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ConditionMonitor
    }

    fn enter(&self) -> Box<dyn Section<S> + '_> {
        Box::new(ConditionSection {
            guard: self.state.lock(),
            conditions: &self.conditions,
        })
    }

    fn interrupt(&self) {
        // Taking the lock orders this after any waiter's cancel check.
        let _guard = self.state.lock();
        for condition in &self.conditions {
            condition.notify_all();
        }
    }
}
