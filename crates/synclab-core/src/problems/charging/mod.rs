//! Solar charging station.
//!
//! Drones queue for a limited number of bays in two FIFO queues. A critical
//! drone is served before any normal one, and nobody is served while the
//! station has no solar power.

pub mod actors;

use crate::cancel::{Admission, CancelToken, Outcome};
use crate::error::CoordinatorError;
use crate::shared::{Invariant, Shared};
use crate::sink::{Events, StateSink};
use crate::strategy::{CondId, StrategyKind};
use crate::types::{ActorId, ActorState, ProblemKind, ResourceId};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const BAY: CondId = CondId(0);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationStats {
    pub free_bays: usize,
    pub max_bays: usize,
    pub critical_waiting: usize,
    pub normal_waiting: usize,
    pub has_power: bool,
    pub completed: u64,
    pub rejected: u64,
    pub withdrawn: u64,
}

struct Station {
    bays: usize,
    max_bays: usize,
    critical: VecDeque<u32>,
    normal: VecDeque<u32>,
    queue_limit: Option<usize>,
    has_power: bool,
    completed: u64,
    rejected: u64,
    withdrawn: u64,
}

impl Station {
    fn queue(&mut self, critical: bool) -> &mut VecDeque<u32> {
        if critical {
            &mut self.critical
        } else {
            &mut self.normal
        }
    }

    fn may_charge(&self, drone: u32, critical: bool) -> bool {
        let next_in_line = if critical {
            self.critical.front() == Some(&drone)
        } else {
            self.critical.is_empty() && self.normal.front() == Some(&drone)
        };
        self.has_power && self.bays > 0 && next_in_line
    }
}

impl Invariant for Station {
    fn check(&self) -> Result<(), String> {
        if self.bays > self.max_bays {
            return Err(format!("{} free bays out of {}", self.bays, self.max_bays));
        }
        if let Some(limit) = self.queue_limit {
            if self.critical.len() > limit || self.normal.len() > limit {
                return Err(format!("a queue grew past its limit of {}", limit));
            }
        }
        if let Some(drone) = self.critical.iter().find(|d| self.normal.contains(d)) {
            return Err(format!("drone {} is in both queues", drone));
        }
        Ok(())
    }
}

pub struct ChargingStation {
    shared: Shared<Station>,
}

impl ChargingStation {
    pub fn new(
        strategy: StrategyKind,
        bays: usize,
        queue_limit: Option<usize>,
        poll_interval: Duration,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let station = Station {
            bays,
            max_bays: bays,
            critical: VecDeque::new(),
            normal: VecDeque::new(),
            queue_limit,
            has_power: true,
            completed: 0,
            rejected: 0,
            withdrawn: 0,
        };
        Self {
            shared: Shared::new(
                ProblemKind::ChargingStation,
                strategy,
                station,
                1,
                poll_interval,
                sink,
            ),
        }
    }

    /// Queues `drone` and blocks until it holds a bay.
    ///
    /// Returns `Done(Rejected)` without waiting when its queue is at the
    /// limit. A drone cancelled while queued withdraws from its queue.
    pub fn request_recharge(
        &self,
        drone: u32,
        critical: bool,
        cancel: &CancelToken,
    ) -> Result<Outcome<Admission>, CoordinatorError> {
        let id = ActorId::Drone(drone);
        self.shared.sink().on_request_edge(id, ResourceId::Bays);
        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            let station = section.state();
            let limit = station.queue_limit;
            let queue = station.queue(critical);
            if limit.is_some_and(|limit| queue.len() >= limit) {
                station.rejected += 1;
                events.clear(id, ResourceId::Bays);
                (Outcome::Done(Admission::Rejected), station.check())
            } else {
                queue.push_back(drone);
                let waited = section.wait_while(BAY, cancel, &mut |s: &Station| {
                    !s.may_charge(drone, critical)
                });
                let station = section.state();
                let queue = station.queue(critical);
                if let Some(pos) = queue.iter().position(|&d| d == drone) {
                    queue.remove(pos);
                }
                let outcome = if waited.is_cancelled() {
                    station.withdrawn += 1;
                    events.clear(id, ResourceId::Bays);
                    Outcome::Cancelled
                } else {
                    station.bays -= 1;
                    events.grant(ResourceId::Bays, id);
                    events.state(id, ActorState::Charging);
                    events.level(ResourceId::Bays, station.bays as u32);
                    Outcome::Done(Admission::Admitted)
                };
                // Whoever is next in line may now qualify.
                section.signal_all(BAY);
                (outcome, section.state().check())
            }
        };
        match outcome {
            Outcome::Done(Admission::Rejected) => warn!("{} rejected, queue full", id),
            Outcome::Cancelled => warn!("{} withdrew from the queue", id),
            Outcome::Done(Admission::Admitted) => debug!("{} got a bay", id),
        }
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    /// Drone `drone` leaves its bay after a completed recharge.
    pub fn release_bay(&self, drone: u32) -> Result<(), CoordinatorError> {
        let id = ActorId::Drone(drone);
        let mut events = Events::new();
        let verdict = {
            let mut section = self.shared.enter()?;
            let station = section.state();
            if station.bays >= station.max_bays {
                Err(format!("{} released a bay while all {} are free", id, station.max_bays))
            } else {
                station.bays += 1;
                station.completed += 1;
                events.clear(id, ResourceId::Bays);
                events.level(ResourceId::Bays, station.bays as u32);
                section.signal_all(BAY);
                section.state().check()
            }
        };
        self.shared.settle(events, verdict)
    }

    /// Switches solar power. Turning it on wakes every queued drone.
    pub fn set_power(&self, on: bool) -> Result<(), CoordinatorError> {
        let mut events = Events::new();
        let verdict = {
            let mut section = self.shared.enter()?;
            section.state().has_power = on;
            events.level(ResourceId::Power, u32::from(on));
            if on {
                section.signal_all(BAY);
            }
            section.state().check()
        };
        info!("station power {}", if on { "on" } else { "off" });
        self.shared.settle(events, verdict)
    }

    pub fn stats(&self) -> StationStats {
        self.shared.peek(|s| StationStats {
            free_bays: s.bays,
            max_bays: s.max_bays,
            critical_waiting: s.critical.len(),
            normal_waiting: s.normal.len(),
            has_power: s.has_power,
            completed: s.completed,
            rejected: s.rejected,
            withdrawn: s.withdrawn,
        })
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "{}/{} bays free, {} critical and {} normal queued, {} recharges, {} rejected, {} withdrawn",
            stats.free_bays,
            stats.max_bays,
            stats.critical_waiting,
            stats.normal_waiting,
            stats.completed,
            stats.rejected,
            stats.withdrawn
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;
    use std::thread;

    fn station(strategy: StrategyKind, bays: usize, limit: Option<usize>) -> ChargingStation {
        ChargingStation::new(strategy, bays, limit, Duration::from_millis(1), Arc::new(NullSink))
    }

    #[test]
    fn free_bay_is_granted_at_once() {
        let s = station(StrategyKind::Lock, 2, None);
        let cancel = CancelToken::new();
        assert_eq!(
            s.request_recharge(1, false, &cancel).unwrap(),
            Outcome::Done(Admission::Admitted)
        );
        assert_eq!(s.stats().free_bays, 1);
        s.release_bay(1).unwrap();
        assert_eq!(s.stats().completed, 1);
    }

    #[test]
    fn full_queue_rejects() {
        let s = Arc::new(station(StrategyKind::ConditionMonitor, 1, Some(1)));
        s.set_power(false).unwrap();
        let cancel = CancelToken::new();
        let queued = {
            let s = Arc::clone(&s);
            let cancel = cancel.clone();
            thread::spawn(move || s.request_recharge(1, false, &cancel).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(
            s.request_recharge(2, false, &CancelToken::new()).unwrap(),
            Outcome::Done(Admission::Rejected)
        );
        cancel.cancel();
        s.interrupt();
        assert_eq!(queued.join().unwrap(), Outcome::Cancelled);
        let stats = s.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.withdrawn, 1);
        assert_eq!(stats.normal_waiting, 0);
    }

    #[test]
    fn power_on_releases_waiting_drone() {
        for strategy in StrategyKind::ALL {
            let s = Arc::new(station(strategy, 1, None));
            s.set_power(false).unwrap();
            let drone = {
                let s = Arc::clone(&s);
                thread::spawn(move || s.request_recharge(3, true, &CancelToken::new()).unwrap())
            };
            thread::sleep(Duration::from_millis(20));
            assert_eq!(s.stats().critical_waiting, 1);
            s.set_power(true).unwrap();
            assert_eq!(
                drone.join().unwrap(),
                Outcome::Done(Admission::Admitted),
                "{}",
                strategy
            );
        }
    }

    #[test]
    fn releasing_an_idle_bay_faults() {
        let s = station(StrategyKind::IntrinsicMonitor, 2, None);
        assert!(matches!(
            s.release_bay(0),
            Err(CoordinatorError::InvariantViolation { .. })
        ));
        assert!(matches!(
            s.request_recharge(0, false, &CancelToken::new()),
            Err(CoordinatorError::Faulted(ProblemKind::ChargingStation))
        ));
    }
}
