//! Counting semaphores and the semaphore-backed strategy.
//!
//! Mutual exclusion comes from a binary [`Semaphore`]. Each condition is a
//! counting semaphore plus a waiter count that is only touched while the
//! binary semaphore is held, so `signal` never banks a permit nobody will
//! consume.

use super::{CondId, Section, StrategyKind, SyncStrategy};
use crate::cancel::{CancelToken, WaitOutcome};
use core::cell::UnsafeCell;
use log::trace;
use parking_lot::{Condvar, Mutex};

/// A counting semaphore whose blocking acquire can observe a [`CancelToken`].
#[derive(Debug, Default)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Blocks until a permit is available. Not cancellable.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Blocks until a permit is available or `cancel` fires.
    ///
    /// A permit that is already available wins over a pending cancellation,
    /// so a caller that gets [`WaitOutcome::Cancelled`] holds nothing.
    pub fn acquire_cancellable(&self, cancel: &CancelToken) -> WaitOutcome {
        let mut permits = self.permits.lock();
        loop {
            if *permits > 0 {
                *permits -= 1;
                return WaitOutcome::Woken;
            }
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            self.available.wait(&mut permits);
        }
    }

    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    pub fn release(&self) {
        self.release_n(1);
    }

    pub fn release_n(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits += n;
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }

    /// Wakes every blocked acquirer so cancelled ones can leave.
    pub fn interrupt(&self) {
        let _permits = self.permits.lock();
        self.available.notify_all();
    }
}

struct Protected<S> {
    state: S,
    waiters: Vec<usize>,
}

pub struct SemaphoreStrategy<S> {
    mutex: Semaphore,
    conditions: Vec<Semaphore>,
    protected: UnsafeCell<Protected<S>>,
}

// SAFETY: `protected` is only reached through a `SemaphoreSection`, and a
// section exists only while its thread holds the single `mutex` permit.
unsafe impl<S: Send> Sync for SemaphoreStrategy<S> {}

impl<S> SemaphoreStrategy<S> {
    pub fn new(state: S, conditions: usize) -> Self {
        Self {
            mutex: Semaphore::new(1),
            conditions: (0..conditions).map(|_| Semaphore::new(0)).collect(),
            protected: UnsafeCell::new(Protected {
                state,
                waiters: vec![0; conditions],
            }),
        }
    }
}

struct SemaphoreSection<'a, S> {
    owner: &'a SemaphoreStrategy<S>,
}

impl<S> SemaphoreSection<'_, S> {
    fn protected(&mut self) -> &mut Protected<S> {
        // SAFETY: this section holds the mutex permit, so no other reference
        // into `protected` exists.
        unsafe { &mut *self.owner.protected.get() }
    }

    /// Hands one banked signal to another waiter, if any.
    fn pass_on(&mut self, cond: CondId) {
        let owner = self.owner;
        let waiters = &mut self.protected().waiters[cond.0];
        if *waiters > 0 {
            *waiters -= 1;
            owner.conditions[cond.0].release();
        }
    }
}

impl<S> Section<S> for SemaphoreSection<'_, S> {
    fn state(&mut self) -> &mut S {
        &mut self.protected().state
    }

    fn wait_on(&mut self, cond: CondId, cancel: &CancelToken) -> WaitOutcome {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        self.protected().waiters[cond.0] += 1;
        self.owner.mutex.release();
        trace!("semaphore: acquiring condition {}", cond.0);
        let outcome = self.owner.conditions[cond.0].acquire_cancellable(cancel);
        self.owner.mutex.acquire();
        if outcome.is_cancelled() {
            // A signaller may have counted us out and released a permit after
            // we gave up. Consume it and forward it, or withdraw our count.
            if self.owner.conditions[cond.0].try_acquire() {
                self.pass_on(cond);
            } else {
                let waiters = &mut self.protected().waiters[cond.0];
                *waiters = waiters.saturating_sub(1);
            }
        }
        outcome
    }

    fn signal(&mut self, cond: CondId) {
        self.pass_on(cond);
    }

    fn signal_all(&mut self, cond: CondId) {
        let waiters = core::mem::take(&mut self.protected().waiters[cond.0]);
        let owner = self.owner;
        owner.conditions[cond.0].release_n(waiters);
    }
}

impl<S> Drop for SemaphoreSection<'_, S> {
    fn drop(&mut self) {
        self.owner.mutex.release();
    }
}

impl<S: Send> SyncStrategy<S> for SemaphoreStrategy<S> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semaphore
    }

    fn enter(&self) -> Box<dyn Section<S> + '_> {
        self.mutex.acquire();
        Box::new(SemaphoreSection { owner: self })
    }

    fn interrupt(&self) {
        for condition in &self.conditions {
            condition.interrupt();
        }
    }
}
