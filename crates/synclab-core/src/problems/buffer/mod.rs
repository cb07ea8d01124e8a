//! Bounded buffer: a tank filled by producers and drained by consumers in
//! steps of ten.

pub mod actors;

use crate::cancel::{CancelToken, Outcome};
use crate::error::CoordinatorError;
use crate::shared::{Invariant, Shared};
use crate::sink::{Events, StateSink};
use crate::strategy::{CondId, StrategyKind};
use crate::types::{ActorId, ProblemKind, ResourceId};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_LEVEL: u8 = 100;
pub const STEP: u8 = 10;

const NOT_FULL: CondId = CondId(0);
const NOT_EMPTY: CondId = CondId(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub level: u8,
    pub produced: u64,
    pub consumed: u64,
}

struct Tank {
    level: u8,
    produced: u64,
    consumed: u64,
}

impl Invariant for Tank {
    fn check(&self) -> Result<(), String> {
        if self.level > MAX_LEVEL {
            return Err(format!("level {} above {}", self.level, MAX_LEVEL));
        }
        if self.level % STEP != 0 {
            return Err(format!("level {} is not a multiple of {}", self.level, STEP));
        }
        Ok(())
    }
}

pub struct BufferCoordinator {
    shared: Shared<Tank>,
}

impl BufferCoordinator {
    pub fn new(strategy: StrategyKind, poll_interval: Duration, sink: Arc<dyn StateSink>) -> Self {
        Self::with_level(strategy, 0, poll_interval, sink)
    }

    /// Starts at `initial`, rounded down to a step and capped at the maximum.
    pub fn with_level(
        strategy: StrategyKind,
        initial: u8,
        poll_interval: Duration,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let level = initial.min(MAX_LEVEL) / STEP * STEP;
        if level != initial {
            warn!("buffer: initial level {} adjusted to {}", initial, level);
        }
        let tank = Tank {
            level,
            produced: 0,
            consumed: 0,
        };
        Self {
            shared: Shared::new(
                ProblemKind::BoundedBuffer,
                strategy,
                tank,
                2,
                poll_interval,
                sink,
            ),
        }
    }

    /// Adds one step, blocking while the tank is full. Returns the new level.
    pub fn produce(
        &self,
        actor: ActorId,
        cancel: &CancelToken,
    ) -> Result<Outcome<u8>, CoordinatorError> {
        self.transfer(actor, cancel, true)
    }

    /// Removes one step, blocking while the tank is empty. Returns the new level.
    pub fn consume(
        &self,
        actor: ActorId,
        cancel: &CancelToken,
    ) -> Result<Outcome<u8>, CoordinatorError> {
        self.transfer(actor, cancel, false)
    }

    fn transfer(
        &self,
        actor: ActorId,
        cancel: &CancelToken,
        fill: bool,
    ) -> Result<Outcome<u8>, CoordinatorError> {
        let (wait_cond, wake_cond) = if fill {
            (NOT_FULL, NOT_EMPTY)
        } else {
            (NOT_EMPTY, NOT_FULL)
        };
        self.shared.sink().on_request_edge(actor, ResourceId::Buffer);
        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            let waited = section.wait_while(wait_cond, cancel, &mut |tank: &Tank| {
                if fill {
                    tank.level >= MAX_LEVEL
                } else {
                    tank.level == 0
                }
            });
            let outcome = if waited.is_cancelled() {
                Outcome::Cancelled
            } else {
                let tank = section.state();
                if fill {
                    tank.level = (tank.level + STEP).min(MAX_LEVEL);
                    tank.produced += 1;
                } else {
                    tank.level = tank.level.saturating_sub(STEP);
                    tank.consumed += 1;
                }
                let level = tank.level;
                section.signal(wake_cond);
                events.level(ResourceId::Buffer, u32::from(level));
                Outcome::Done(level)
            };
            (outcome, section.state().check())
        };
        events.clear(actor, ResourceId::Buffer);
        if let Outcome::Done(level) = outcome {
            debug!("{} moved buffer to {}", actor, level);
        }
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    pub fn level(&self) -> u8 {
        self.shared.peek(|tank| tank.level)
    }

    pub fn stats(&self) -> BufferStats {
        self.shared.peek(|tank| BufferStats {
            level: tank.level,
            produced: tank.produced,
            consumed: tank.consumed,
        })
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "level {}/{}, {} produced, {} consumed",
            stats.level, MAX_LEVEL, stats.produced, stats.consumed
        )
    }

    pub fn interrupt(&self) {
        self.shared.interrupt();
    }

    pub fn is_faulted(&self) -> bool {
        self.shared.is_faulted()
    }

    pub fn strategy(&self) -> StrategyKind {
        self.shared.strategy_kind()
    }
}
