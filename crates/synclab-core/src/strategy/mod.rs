//! # Synchronization strategies.
//!
//! Every coordinator keeps its shared state inside a [`SyncStrategy`]. The
//! strategy hands out a [`Section`] (the held critical section) from
//! [`SyncStrategy::enter`]; dropping the section exits it. Inside a section
//! the coordinator may wait on, signal or broadcast one of its numbered
//! conditions.
//!
//! | Strategy             | Mutual exclusion        | `wait_on`                         | `signal`           |
//! |----------------------|-------------------------|-----------------------------------|--------------------|
//! | [`PollingLock`]      | one lock                | unlock, sleep poll interval, lock | no-op              |
//! | [`SemaphoreStrategy`]| binary semaphore        | acquire condition semaphore       | release semaphore  |
//! | [`ConditionMonitor`] | explicit lock object    | park on condition object          | notify one         |
//! | [`IntrinsicMonitor`] | built-in `std` monitor  | park on `std` condvar             | notify one         |
//!
//! Whatever the strategy, `wait_on` returns with the section held again, both
//! when woken and when cancelled.

pub mod condition;
pub mod intrinsic;
pub mod lock;
pub mod semaphore;

pub use condition::ConditionMonitor;
pub use intrinsic::IntrinsicMonitor;
pub use lock::PollingLock;
pub use semaphore::{Semaphore, SemaphoreStrategy};

use crate::cancel::{CancelToken, WaitOutcome};
use crate::error::ControllerError;
use core::fmt;
use core::str::FromStr;
use std::time::Duration;

/// Which primitive backs a coordinator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StrategyKind {
    Lock,
    Semaphore,
    ConditionMonitor,
    IntrinsicMonitor,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Lock,
        StrategyKind::Semaphore,
        StrategyKind::ConditionMonitor,
        StrategyKind::IntrinsicMonitor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Lock => "lock",
            StrategyKind::Semaphore => "semaphore",
            StrategyKind::ConditionMonitor => "condition",
            StrategyKind::IntrinsicMonitor => "monitor",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lock" | "mutex" => Ok(StrategyKind::Lock),
            "semaphore" | "sem" => Ok(StrategyKind::Semaphore),
            "condition" | "condvar" | "condition-variable" => Ok(StrategyKind::ConditionMonitor),
            "monitor" | "intrinsic" => Ok(StrategyKind::IntrinsicMonitor),
            _ => Err(ControllerError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Index of one wait reason ("not full", "philosopher 3", ...) within a coordinator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CondId(pub usize);

/// A held critical section over state `S`.
pub trait Section<S> {
    /// The protected state.
    fn state(&mut self) -> &mut S;

    /// Leaves the section, blocks until `cond` is signalled (or, for the
    /// polling lock, until the poll interval passes) and re-enters.
    fn wait_on(&mut self, cond: CondId, cancel: &CancelToken) -> WaitOutcome;

    /// Wakes one waiter of `cond`.
    fn signal(&mut self, cond: CondId);

    /// Wakes every waiter of `cond`.
    fn signal_all(&mut self, cond: CondId);

    /// Waits on `cond` for as long as `blocked` holds.
    fn wait_while(
        &mut self,
        cond: CondId,
        cancel: &CancelToken,
        blocked: &mut dyn FnMut(&S) -> bool,
    ) -> WaitOutcome {
        while blocked(self.state()) {
            if self.wait_on(cond, cancel).is_cancelled() {
                return WaitOutcome::Cancelled;
            }
        }
        WaitOutcome::Woken
    }
}

pub trait SyncStrategy<S>: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Enters the critical section. Dropping the returned section exits it.
    fn enter(&self) -> Box<dyn Section<S> + '_>;

    /// Wakes every parked waiter so it can observe its cancel token.
    /// Must not be called while holding a section of this strategy.
    fn interrupt(&self);
}

/// Builds the strategy `kind` around `state` with `conditions` wait reasons.
pub fn build<S: Send + 'static>(
    kind: StrategyKind,
    state: S,
    conditions: usize,
    poll_interval: Duration,
) -> Box<dyn SyncStrategy<S>> {
    match kind {
        StrategyKind::Lock => Box::new(PollingLock::new(state, poll_interval)),
        StrategyKind::Semaphore => Box::new(SemaphoreStrategy::new(state, conditions)),
        StrategyKind::ConditionMonitor => Box::new(ConditionMonitor::new(state, conditions)),
        StrategyKind::IntrinsicMonitor => Box::new(IntrinsicMonitor::new(state, conditions)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const READY: CondId = CondId(0);

    fn strategies() -> Vec<Box<dyn SyncStrategy<u32>>> {
        StrategyKind::ALL
            .iter()
            .map(|&kind| build(kind, 0u32, 1, Duration::from_millis(1)))
            .collect()
    }

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!("mutex".parse::<StrategyKind>().unwrap(), StrategyKind::Lock);
        assert!("spinlock".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn sections_serialize_increments() {
        for strategy in strategies() {
            let strategy: Arc<dyn SyncStrategy<u32>> = Arc::from(strategy);
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let strategy = Arc::clone(&strategy);
                    thread::spawn(move || {
                        for _ in 0..500 {
                            let mut section = strategy.enter();
                            *section.state() += 1;
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
            assert_eq!(*strategy.enter().state(), 2000, "{}", strategy.kind());
        }
    }

    #[test]
    fn waiter_wakes_after_signal() {
        for strategy in strategies() {
            let strategy: Arc<dyn SyncStrategy<u32>> = Arc::from(strategy);
            let waiter = {
                let strategy = Arc::clone(&strategy);
                thread::spawn(move || {
                    let cancel = CancelToken::new();
                    let mut section = strategy.enter();
                    let outcome = section.wait_while(READY, &cancel, &mut |v| *v == 0);
                    (outcome, *section.state())
                })
            };
            thread::sleep(Duration::from_millis(20));
            {
                let mut section = strategy.enter();
                *section.state() = 7;
                section.signal(READY);
            }
            assert_eq!(waiter.join().unwrap(), (WaitOutcome::Woken, 7));
        }
    }

    #[test]
    fn interrupt_releases_cancelled_waiter() {
        for strategy in strategies() {
            let strategy: Arc<dyn SyncStrategy<u32>> = Arc::from(strategy);
            let cancel = CancelToken::new();
            let waiter = {
                let strategy = Arc::clone(&strategy);
                let cancel = cancel.clone();
                thread::spawn(move || {
                    let mut section = strategy.enter();
                    let outcome = section.wait_while(READY, &cancel, &mut |v| *v == 0);
                    // The section is held again after cancellation.
                    *section.state() += 100;
                    outcome
                })
            };
            thread::sleep(Duration::from_millis(20));
            cancel.cancel();
            strategy.interrupt();
            assert_eq!(waiter.join().unwrap(), WaitOutcome::Cancelled);
            assert_eq!(*strategy.enter().state(), 100);
        }
    }

    #[test]
    fn cancelled_waiter_does_not_swallow_a_signal() {
        for strategy in strategies() {
            let strategy: Arc<dyn SyncStrategy<u32>> = Arc::from(strategy);
            let doomed = CancelToken::new();
            let (tx, rx) = crossbeam_channel::unbounded();
            let waiters: Vec<_> = [doomed.clone(), CancelToken::new()]
                .into_iter()
                .map(|cancel| {
                    let strategy = Arc::clone(&strategy);
                    let tx = tx.clone();
                    thread::spawn(move || {
                        let outcome = {
                            let mut section = strategy.enter();
                            section.wait_while(READY, &cancel, &mut |v| *v == 0)
                        };
                        let _ = tx.send(outcome);
                    })
                })
                .collect();
            thread::sleep(Duration::from_millis(20));
            doomed.cancel();
            {
                let mut section = strategy.enter();
                *section.state() = 1;
                section.signal(READY);
            }
            // One signal, so exactly one waiter has to get through.
            loop {
                match rx.recv_timeout(Duration::from_secs(5)) {
                    Ok(WaitOutcome::Woken) => break,
                    Ok(WaitOutcome::Cancelled) => continue,
                    Err(_) => panic!("{}: the signal was lost", strategy.kind()),
                }
            }
            strategy.interrupt();
            for waiter in waiters {
                waiter.join().unwrap();
            }
        }
    }
}
