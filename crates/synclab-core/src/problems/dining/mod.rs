//! # Dining philosophers.
//!
//! Philosopher `i` sits between fork `i` (left) and fork `(i + 1) % n`
//! (right). Three arbitration policies are available:
//!
//! - [`DiningPolicy::ResourceOrdering`]: the last philosopher takes its right
//!   fork first, everyone else the left. The second fork is only tried; on
//!   failure the first is put back and the attempt retried after a jittered
//!   back-off.
//! - [`DiningPolicy::Waiter`]: a room [`Semaphore`] with `n - 1` permits
//!   keeps at least one seat empty, then forks are taken left then right.
//! - [`DiningPolicy::StateTest`]: a hungry philosopher is promoted to eating
//!   only while neither neighbour eats; whoever puts forks down tests both
//!   neighbours.

pub mod actors;

use crate::cancel::{CancelToken, Outcome};
use crate::error::CoordinatorError;
use crate::shared::{Invariant, Shared};
use crate::sink::{Events, StateSink};
use crate::strategy::{CondId, Section, Semaphore, StrategyKind};
use crate::types::{ActorId, ActorState, ProblemKind, ResourceId};
use log::{debug, trace};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DiningPolicy {
    ResourceOrdering,
    Waiter,
    StateTest,
}

impl DiningPolicy {
    pub fn for_strategy(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Lock => DiningPolicy::ResourceOrdering,
            StrategyKind::Semaphore => DiningPolicy::Waiter,
            StrategyKind::ConditionMonitor | StrategyKind::IntrinsicMonitor => {
                DiningPolicy::StateTest
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    Thinking,
    Hungry,
    Eating,
}

struct TableState {
    phases: Vec<Phase>,
    forks: Vec<Option<usize>>,
    meals: Vec<u64>,
}

impl TableState {
    fn seats(&self) -> usize {
        self.phases.len()
    }

    fn seat(&mut self, i: usize, events: &mut Events) {
        let n = self.seats();
        let id = ActorId::Philosopher(i);
        self.phases[i] = Phase::Eating;
        self.forks[i] = Some(i);
        self.forks[(i + 1) % n] = Some(i);
        self.meals[i] += 1;
        events.grant(ResourceId::Fork(i), id);
        events.grant(ResourceId::Fork((i + 1) % n), id);
        events.state(id, ActorState::Eating);
    }

    /// Drops whatever `i` holds and marks it thinking.
    fn unseat(&mut self, i: usize, events: &mut Events) {
        let n = self.seats();
        let id = ActorId::Philosopher(i);
        for fork in [i, (i + 1) % n] {
            if self.forks[fork] == Some(i) {
                self.forks[fork] = None;
            }
            events.clear(id, ResourceId::Fork(fork));
        }
        self.phases[i] = Phase::Thinking;
        events.state(id, ActorState::Thinking);
    }
}

impl Invariant for TableState {
    fn check(&self) -> Result<(), String> {
        let n = self.seats();
        for i in 0..n {
            let right = (i + 1) % n;
            if self.phases[i] == Phase::Eating {
                if self.forks[i] != Some(i) || self.forks[right] != Some(i) {
                    return Err(format!("philosopher {} eats without both forks", i));
                }
                if self.phases[right] == Phase::Eating {
                    return Err(format!("neighbours {} and {} eat together", i, right));
                }
            }
        }
        for (fork, owner) in self.forks.iter().enumerate() {
            if let Some(p) = *owner {
                if p != fork && (p + 1) % n != fork {
                    return Err(format!("fork {} held by non-adjacent philosopher {}", fork, p));
                }
            }
        }
        Ok(())
    }
}

fn self_cond(i: usize) -> CondId {
    CondId(i)
}

fn fork_cond(seats: usize, fork: usize) -> CondId {
    CondId(seats + fork)
}

/// Promotes `k` to eating if it is hungry and neither neighbour eats.
fn test(section: &mut (dyn Section<TableState> + '_), k: usize, events: &mut Events) {
    let table = section.state();
    let n = table.seats();
    if table.phases[k] == Phase::Hungry
        && table.phases[(k + n - 1) % n] != Phase::Eating
        && table.phases[(k + 1) % n] != Phase::Eating
    {
        table.seat(k, events);
        section.signal(self_cond(k));
    }
}

enum Attempt {
    Seated,
    Retry,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStats {
    pub meals: Vec<u64>,
    pub eating: Vec<usize>,
}

pub struct TableCoordinator {
    shared: Shared<TableState>,
    policy: DiningPolicy,
    seats: usize,
    room: Semaphore,
    retry_backoff: Duration,
}

impl TableCoordinator {
    pub fn new(
        strategy: StrategyKind,
        seats: usize,
        poll_interval: Duration,
        retry_backoff: Duration,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        Self::with_policy(
            strategy,
            DiningPolicy::for_strategy(strategy),
            seats,
            poll_interval,
            retry_backoff,
            sink,
        )
    }

    /// Like [`TableCoordinator::new`] with an explicit arbitration policy.
    /// Fewer than two seats are raised to two.
    pub fn with_policy(
        strategy: StrategyKind,
        policy: DiningPolicy,
        seats: usize,
        poll_interval: Duration,
        retry_backoff: Duration,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let seats = seats.max(2);
        let table = TableState {
            phases: vec![Phase::Thinking; seats],
            forks: vec![None; seats],
            meals: vec![0; seats],
        };
        Self {
            shared: Shared::new(
                ProblemKind::DiningPhilosophers,
                strategy,
                table,
                seats * 2,
                poll_interval,
                sink,
            ),
            policy,
            seats,
            room: Semaphore::new(seats - 1),
            retry_backoff,
        }
    }

    pub fn seats(&self) -> usize {
        self.seats
    }

    pub fn policy(&self) -> DiningPolicy {
        self.policy
    }

    /// Order in which philosopher `i` takes its forks under resource ordering.
    pub fn fork_order(&self, i: usize) -> (usize, usize) {
        let left = i;
        let right = (i + 1) % self.seats;
        if i == self.seats - 1 {
            (right, left)
        } else {
            (left, right)
        }
    }

    /// Blocks until philosopher `i` holds both forks.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not a seat at this table.
    pub fn pick_up(&self, i: usize, cancel: &CancelToken) -> Result<Outcome<()>, CoordinatorError> {
        assert!(i < self.seats, "no seat {} at a table of {}", i, self.seats);
        self.shared
            .sink()
            .on_actor_state_changed(ActorId::Philosopher(i), ActorState::Hungry);
        match self.policy {
            DiningPolicy::ResourceOrdering => self.pick_up_ordered(i, cancel),
            DiningPolicy::Waiter => self.pick_up_admitted(i, cancel),
            DiningPolicy::StateTest => self.pick_up_tested(i, cancel),
        }
    }

    fn pick_up_ordered(
        &self,
        i: usize,
        cancel: &CancelToken,
    ) -> Result<Outcome<()>, CoordinatorError> {
        let id = ActorId::Philosopher(i);
        let n = self.seats;
        let (first, second) = self.fork_order(i);
        loop {
            self.shared.sink().on_request_edge(id, ResourceId::Fork(first));
            let mut events = Events::new();
            let (attempt, verdict) = {
                let mut section = self.shared.enter()?;
                section.state().phases[i] = Phase::Hungry;
                let waited = section.wait_while(fork_cond(n, first), cancel, &mut |t: &TableState| {
                    t.forks[first].is_some()
                });
                let attempt = if waited.is_cancelled() {
                    section.state().unseat(i, &mut events);
                    Attempt::Cancelled
                } else {
                    let table = section.state();
                    table.forks[first] = Some(i);
                    events.grant(ResourceId::Fork(first), id);
                    events.request(id, ResourceId::Fork(second));
                    if table.forks[second].is_none() {
                        table.seat(i, &mut events);
                        Attempt::Seated
                    } else {
                        table.forks[first] = None;
                        events.clear(id, ResourceId::Fork(first));
                        events.clear(id, ResourceId::Fork(second));
                        section.signal(fork_cond(n, first));
                        Attempt::Retry
                    }
                };
                (attempt, section.state().check())
            };
            self.shared.settle(events, verdict)?;
            match attempt {
                Attempt::Seated => return Ok(Outcome::Done(())),
                Attempt::Cancelled => return Ok(Outcome::Cancelled),
                Attempt::Retry => {
                    trace!("{} backs off from fork {}", id, second);
                    let jitter = rand::thread_rng().gen_range(1..=4u32);
                    if cancel.sleep(self.retry_backoff * jitter / 4).is_cancelled() {
                        return self.give_up(i);
                    }
                }
            }
        }
    }

    /// Sends a philosopher cancelled between attempts back to thinking.
    fn give_up(&self, i: usize) -> Result<Outcome<()>, CoordinatorError> {
        let mut events = Events::new();
        let verdict = {
            let mut section = self.shared.enter()?;
            section.state().unseat(i, &mut events);
            section.state().check()
        };
        self.shared.settle(events, verdict)?;
        Ok(Outcome::Cancelled)
    }

    fn pick_up_admitted(
        &self,
        i: usize,
        cancel: &CancelToken,
    ) -> Result<Outcome<()>, CoordinatorError> {
        let id = ActorId::Philosopher(i);
        let n = self.seats;
        if self.room.acquire_cancellable(cancel).is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        let (left, right) = (i, (i + 1) % n);
        self.shared.sink().on_request_edge(id, ResourceId::Fork(left));
        self.shared.sink().on_request_edge(id, ResourceId::Fork(right));
        let mut events = Events::new();
        let (seated, verdict) = {
            let mut section = match self.shared.enter() {
                Ok(section) => section,
                Err(err) => {
                    self.room.release();
                    return Err(err);
                }
            };
            section.state().phases[i] = Phase::Hungry;
            let mut seated = true;
            for fork in [left, right] {
                let waited = section.wait_while(fork_cond(n, fork), cancel, &mut |t: &TableState| {
                    t.forks[fork].is_some()
                });
                if waited.is_cancelled() {
                    seated = false;
                    break;
                }
                section.state().forks[fork] = Some(i);
            }
            if seated {
                section.state().seat(i, &mut events);
            } else {
                section.state().unseat(i, &mut events);
                section.signal(fork_cond(n, left));
                section.signal(fork_cond(n, right));
            }
            (seated, section.state().check())
        };
        if !seated {
            self.room.release();
        }
        self.shared.settle(events, verdict)?;
        Ok(if seated {
            Outcome::Done(())
        } else {
            Outcome::Cancelled
        })
    }

    fn pick_up_tested(
        &self,
        i: usize,
        cancel: &CancelToken,
    ) -> Result<Outcome<()>, CoordinatorError> {
        let id = ActorId::Philosopher(i);
        let n = self.seats;
        self.shared.sink().on_request_edge(id, ResourceId::Fork(i));
        self.shared.sink().on_request_edge(id, ResourceId::Fork((i + 1) % n));
        let mut events = Events::new();
        let (seated, verdict) = {
            let mut section = self.shared.enter()?;
            section.state().phases[i] = Phase::Hungry;
            test(&mut *section, i, &mut events);
            let waited = section.wait_while(self_cond(i), cancel, &mut |t: &TableState| {
                t.phases[i] != Phase::Eating
            });
            let seated = !waited.is_cancelled();
            if !seated {
                // A neighbour may have promoted us just as we gave up.
                let was_eating = section.state().phases[i] == Phase::Eating;
                section.state().unseat(i, &mut events);
                if was_eating {
                    test(&mut *section, (i + n - 1) % n, &mut events);
                    test(&mut *section, (i + 1) % n, &mut events);
                }
            }
            (seated, section.state().check())
        };
        self.shared.settle(events, verdict)?;
        Ok(if seated {
            Outcome::Done(())
        } else {
            Outcome::Cancelled
        })
    }

    /// Philosopher `i` puts both forks down and goes back to thinking.
    pub fn put_down(&self, i: usize) -> Result<(), CoordinatorError> {
        assert!(i < self.seats, "no seat {} at a table of {}", i, self.seats);
        let n = self.seats;
        let mut events = Events::new();
        let (was_eating, verdict) = {
            let mut section = self.shared.enter()?;
            let was_eating = section.state().phases[i] == Phase::Eating;
            section.state().unseat(i, &mut events);
            match self.policy {
                DiningPolicy::StateTest => {
                    test(&mut *section, (i + n - 1) % n, &mut events);
                    test(&mut *section, (i + 1) % n, &mut events);
                }
                DiningPolicy::ResourceOrdering | DiningPolicy::Waiter => {
                    section.signal(fork_cond(n, i));
                    section.signal(fork_cond(n, (i + 1) % n));
                }
            }
            (was_eating, section.state().check())
        };
        if was_eating && self.policy == DiningPolicy::Waiter {
            self.room.release();
        }
        debug!("philosopher-{} put forks down", i);
        self.shared.settle(events, verdict)
    }

    pub fn phase(&self, i: usize) -> Phase {
        self.shared.peek(|t| t.phases[i])
    }

    pub fn fork_owner(&self, fork: usize) -> Option<usize> {
        self.shared.peek(|t| t.forks[fork])
    }

    pub fn stats(&self) -> TableStats {
        self.shared.peek(|t| TableStats {
            meals: t.meals.clone(),
            eating: (0..t.seats())
                .filter(|&i| t.phases[i] == Phase::Eating)
                .collect(),
        })
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "{:?} policy, meals {:?}, {} eating now",
            self.policy,
            stats.meals,
            stats.eating.len()
        )
    }

    pub fn interrupt(&self) {
        self.shared.interrupt();
        self.room.interrupt();
    }

    pub fn is_faulted(&self) -> bool {
        self.shared.is_faulted()
    }

    pub fn strategy(&self) -> StrategyKind {
        self.shared.strategy_kind()
    }
}
