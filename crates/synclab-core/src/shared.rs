//! The piece every coordinator is built on: its state inside a strategy, the
//! sink it reports to and the faulted flag.

use crate::error::CoordinatorError;
use crate::sink::{Events, StateSink};
use crate::strategy::{self, Section, StrategyKind, SyncStrategy};
use crate::types::ProblemKind;
use log::error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// State with a consistency check run at the end of every mutating section.
pub trait Invariant {
    fn check(&self) -> Result<(), String>;
}

pub(crate) struct Shared<S> {
    problem: ProblemKind,
    strategy: Box<dyn SyncStrategy<S>>,
    sink: Arc<dyn StateSink>,
    faulted: AtomicBool,
}

impl<S: Invariant + Send + 'static> Shared<S> {
    pub(crate) fn new(
        problem: ProblemKind,
        kind: StrategyKind,
        state: S,
        conditions: usize,
        poll_interval: Duration,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        Self {
            problem,
            strategy: strategy::build(kind, state, conditions, poll_interval),
            sink,
            faulted: AtomicBool::new(false),
        }
    }

    pub(crate) fn enter(&self) -> Result<Box<dyn Section<S> + '_>, CoordinatorError> {
        if self.is_faulted() {
            return Err(CoordinatorError::Faulted(self.problem));
        }
        Ok(self.strategy.enter())
    }

    /// Enters without the faulted check, for read-only inspection.
    pub(crate) fn peek<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let mut section = self.strategy.enter();
        f(section.state())
    }

    /// Publishes `events`, then reports `verdict` if the state check failed.
    /// Call only after the section has been dropped.
    pub(crate) fn settle(
        &self,
        events: Events,
        verdict: Result<(), String>,
    ) -> Result<(), CoordinatorError> {
        events.publish(self.sink.as_ref());
        match verdict {
            Ok(()) => Ok(()),
            Err(detail) => {
                self.faulted.store(true, Ordering::SeqCst);
                error!("{} ({}): {}", self.problem, self.strategy.kind(), detail);
                self.sink.on_invariant_violation(self.problem, &detail);
                Err(CoordinatorError::InvariantViolation {
                    problem: self.problem,
                    detail,
                })
            }
        }
    }

    pub(crate) fn interrupt(&self) {
        self.strategy.interrupt();
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }

    pub(crate) fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub(crate) fn sink(&self) -> &dyn StateSink {
        self.sink.as_ref()
    }
}
