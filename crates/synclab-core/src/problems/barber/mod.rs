//! Sleeping barber: one barber chair, a bounded waiting room and customers
//! who leave when every chair is taken.

pub mod actors;

use crate::cancel::{Admission, CancelToken, Outcome};
use crate::error::CoordinatorError;
use crate::shared::{Invariant, Shared};
use crate::sink::{Events, StateSink};
use crate::strategy::{CondId, StrategyKind};
use crate::types::{ActorId, ActorState, ProblemKind, ResourceId};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const BARBER_READY: CondId = CondId(0);
const CUT_DONE: CondId = CondId(1);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BarberPhase {
    Idle,
    Sleeping,
    Cutting,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarberStats {
    pub waiting: usize,
    pub capacity: usize,
    pub in_chair: Option<u32>,
    pub served: u64,
    pub rejected: u64,
    pub abandoned: u64,
}

struct Shop {
    room: VecDeque<u32>,
    capacity: usize,
    phase: BarberPhase,
    chair: Option<u32>,
    served: u64,
    rejected: u64,
    abandoned: u64,
}

impl Invariant for Shop {
    fn check(&self) -> Result<(), String> {
        if self.room.len() > self.capacity {
            return Err(format!(
                "{} customers in a room of {}",
                self.room.len(),
                self.capacity
            ));
        }
        match (self.chair, self.phase) {
            (Some(id), BarberPhase::Cutting) if self.room.contains(&id) => {
                Err(format!("customer {} is both seated and waiting", id))
            }
            (Some(id), BarberPhase::Idle | BarberPhase::Sleeping) => {
                Err(format!("customer {} in the chair while the barber is not cutting", id))
            }
            _ => Ok(()),
        }
    }
}

pub struct BarberShop {
    shared: Shared<Shop>,
}

impl BarberShop {
    pub fn new(
        strategy: StrategyKind,
        waiting_chairs: usize,
        poll_interval: Duration,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let shop = Shop {
            room: VecDeque::with_capacity(waiting_chairs),
            capacity: waiting_chairs,
            phase: BarberPhase::Idle,
            chair: None,
            served: 0,
            rejected: 0,
            abandoned: 0,
        };
        Self {
            shared: Shared::new(
                ProblemKind::SleepingBarber,
                strategy,
                shop,
                2,
                poll_interval,
                sink,
            ),
        }
    }

    /// Takes a waiting chair, or is turned away when none is free.
    pub fn customer_arrives(&self, customer: u32) -> Result<Admission, CoordinatorError> {
        let id = ActorId::Customer(customer);
        self.shared.sink().on_request_edge(id, ResourceId::WaitingRoom);
        let mut events = Events::new();
        let (admission, verdict) = {
            let mut section = self.shared.enter()?;
            let shop = section.state();
            let admission = if shop.room.len() >= shop.capacity {
                shop.rejected += 1;
                events.clear(id, ResourceId::WaitingRoom);
                events.state(id, ActorState::Rejected);
                Admission::Rejected
            } else {
                shop.room.push_back(customer);
                let occupancy = shop.room.len();
                events.grant(ResourceId::WaitingRoom, id);
                events.state(id, ActorState::Waiting);
                events.level(ResourceId::WaitingRoom, occupancy as u32);
                if occupancy == 1 {
                    section.signal(BARBER_READY);
                }
                Admission::Admitted
            };
            (admission, section.state().check())
        };
        if admission == Admission::Rejected {
            warn!("{} turned away, waiting room full", id);
        }
        self.shared.settle(events, verdict)?;
        Ok(admission)
    }

    /// Blocks an admitted customer until its haircut is finished. A customer
    /// cancelled while still waiting gives its chair back.
    pub fn await_service(
        &self,
        customer: u32,
        cancel: &CancelToken,
    ) -> Result<Outcome<()>, CoordinatorError> {
        let id = ActorId::Customer(customer);
        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            let waited = section.wait_while(CUT_DONE, cancel, &mut |shop: &Shop| {
                shop.chair == Some(customer) || shop.room.contains(&customer)
            });
            let outcome = if waited.is_cancelled() {
                let shop = section.state();
                if let Some(pos) = shop.room.iter().position(|&c| c == customer) {
                    shop.room.remove(pos);
                    shop.abandoned += 1;
                    events.clear(id, ResourceId::WaitingRoom);
                    events.level(ResourceId::WaitingRoom, shop.room.len() as u32);
                }
                Outcome::Cancelled
            } else {
                events.state(id, ActorState::Idle);
                Outcome::Done(())
            };
            (outcome, section.state().check())
        };
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    /// Sleeps while the room is empty, then seats the longest-waiting customer.
    pub fn barber_cut(&self, cancel: &CancelToken) -> Result<Outcome<u32>, CoordinatorError> {
        // Going to sleep is published before blocking so observers see it.
        let mut events = Events::new();
        let verdict = {
            let mut section = self.shared.enter()?;
            let shop = section.state();
            if shop.room.is_empty() {
                shop.phase = BarberPhase::Sleeping;
                events.state(ActorId::Barber, ActorState::Sleeping);
            }
            shop.check()
        };
        self.shared.settle(events, verdict)?;

        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            let waited =
                section.wait_while(BARBER_READY, cancel, &mut |shop: &Shop| shop.room.is_empty());
            let shop = section.state();
            let outcome = match shop.room.pop_front() {
                Some(customer) if !waited.is_cancelled() => {
                    let id = ActorId::Customer(customer);
                    shop.chair = Some(customer);
                    shop.phase = BarberPhase::Cutting;
                    events.clear(id, ResourceId::WaitingRoom);
                    events.grant(ResourceId::BarberChair, id);
                    events.state(id, ActorState::BeingServed);
                    events.state(ActorId::Barber, ActorState::Cutting);
                    events.level(ResourceId::WaitingRoom, shop.room.len() as u32);
                    Outcome::Done(customer)
                }
                Some(customer) => {
                    shop.room.push_front(customer);
                    shop.phase = BarberPhase::Idle;
                    Outcome::Cancelled
                }
                None => {
                    shop.phase = BarberPhase::Idle;
                    Outcome::Cancelled
                }
            };
            (outcome, shop.check())
        };
        if let Outcome::Done(customer) = outcome {
            debug!("barber seats customer-{}", customer);
        }
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    /// Frees the barber chair and wakes the customer being served.
    pub fn finish_cut(&self) -> Result<Option<u32>, CoordinatorError> {
        let mut events = Events::new();
        let (finished, verdict) = {
            let mut section = self.shared.enter()?;
            let shop = section.state();
            let finished = shop.chair.take();
            shop.phase = BarberPhase::Idle;
            if let Some(customer) = finished {
                shop.served += 1;
                events.clear(ActorId::Customer(customer), ResourceId::BarberChair);
            }
            events.state(ActorId::Barber, ActorState::Idle);
            section.signal_all(CUT_DONE);
            (finished, section.state().check())
        };
        self.shared.settle(events, verdict)?;
        Ok(finished)
    }

    pub fn stats(&self) -> BarberStats {
        self.shared.peek(|shop| BarberStats {
            waiting: shop.room.len(),
            capacity: shop.capacity,
            in_chair: shop.chair,
            served: shop.served,
            rejected: shop.rejected,
            abandoned: shop.abandoned,
        })
    }

    pub fn phase(&self) -> BarberPhase {
        self.shared.peek(|shop| shop.phase)
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "{}/{} waiting, {} served, {} turned away, {} gave up",
            stats.waiting, stats.capacity, stats.served, stats.rejected, stats.abandoned
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

    fn shop(strategy: StrategyKind, chairs: usize) -> BarberShop {
        BarberShop::new(strategy, chairs, Duration::from_millis(1), Arc::new(NullSink))
    }

    #[test]
    fn full_room_turns_customers_away() {
        for strategy in StrategyKind::ALL {
            let shop = shop(strategy, 2);
            assert_eq!(shop.customer_arrives(1).unwrap(), Admission::Admitted);
            assert_eq!(shop.customer_arrives(2).unwrap(), Admission::Admitted);
            assert_eq!(shop.customer_arrives(3).unwrap(), Admission::Rejected);
            let stats = shop.stats();
            assert_eq!(stats.waiting, 2);
            assert_eq!(stats.rejected, 1);
        }
    }

    #[test]
    fn customers_are_served_in_arrival_order() {
        let shop = shop(StrategyKind::ConditionMonitor, 4);
        let cancel = CancelToken::new();
        shop.customer_arrives(7).unwrap();
        shop.customer_arrives(3).unwrap();
        assert_eq!(shop.barber_cut(&cancel).unwrap(), Outcome::Done(7));
        assert_eq!(shop.phase(), BarberPhase::Cutting);
        assert_eq!(shop.finish_cut().unwrap(), Some(7));
        assert_eq!(shop.barber_cut(&cancel).unwrap(), Outcome::Done(3));
    }

    #[test]
    fn sleeping_barber_wakes_for_first_customer() {
        for strategy in StrategyKind::ALL {
            let shop = Arc::new(shop(strategy, 4));
            let barber = {
                let shop = Arc::clone(&shop);
                thread::spawn(move || shop.barber_cut(&CancelToken::new()).unwrap())
            };
            thread::sleep(Duration::from_millis(20));
            assert_eq!(shop.phase(), BarberPhase::Sleeping);
            shop.customer_arrives(42).unwrap();
            assert_eq!(barber.join().unwrap(), Outcome::Done(42), "{}", strategy);
        }
    }

    #[test]
    fn customer_waits_until_cut_finishes() {
        for strategy in StrategyKind::ALL {
            let shop = Arc::new(shop(strategy, 4));
            shop.customer_arrives(9).unwrap();
            let customer = {
                let shop = Arc::clone(&shop);
                thread::spawn(move || shop.await_service(9, &CancelToken::new()).unwrap())
            };
            assert_eq!(shop.barber_cut(&CancelToken::new()).unwrap(), Outcome::Done(9));
            thread::sleep(Duration::from_millis(10));
            assert!(!customer.is_finished());
            shop.finish_cut().unwrap();
            assert_eq!(customer.join().unwrap(), Outcome::Done(()));
            assert_eq!(shop.stats().served, 1);
        }
    }

    #[test]
    fn cancelled_waiting_customer_frees_the_chair() {
        let shop = Arc::new(shop(StrategyKind::Semaphore, 1));
        shop.customer_arrives(5).unwrap();
        let cancel = CancelToken::new();
        let customer = {
            let shop = Arc::clone(&shop);
            let cancel = cancel.clone();
            thread::spawn(move || shop.await_service(5, &cancel).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        shop.interrupt();
        assert_eq!(customer.join().unwrap(), Outcome::Cancelled);
        let stats = shop.stats();
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.abandoned, 1);
        assert_eq!(shop.customer_arrives(6).unwrap(), Admission::Admitted);
    }
}
