//! # Controller.
//!
//! Owns the active coordinator and the actor threads driving it. Creating a
//! coordinator for another problem or strategy first cancels every running
//! actor and drops the old shared state.

use crate::actor::{self, ActorContext, ActorHandle};
use crate::cancel::CancelToken;
use crate::config::{ActorCounts, LabConfig};
use crate::error::{ControllerError, CoordinatorError};
use crate::problems::barber::{self, BarberShop};
use crate::problems::buffer::{self, BufferCoordinator};
use crate::problems::charging::{self, ChargingStation};
use crate::problems::dining::{self, TableCoordinator};
use crate::problems::readers_writers::{self, Blackboard};
use crate::problems::smokers::{self, Ingredient, SmokersTable};
use crate::sink::StateSink;
use crate::strategy::StrategyKind;
use crate::types::{ActorId, ProblemKind};
use log::{error, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Upper bound on how long `cancel_all` keeps nudging actors before joining.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle on one coordinator, whatever its problem.
#[derive(Clone)]
pub enum Coordinator {
    Buffer(Arc<BufferCoordinator>),
    Dining(Arc<TableCoordinator>),
    Barber(Arc<BarberShop>),
    ReadersWriters(Arc<Blackboard>),
    Smokers(Arc<SmokersTable>),
    Charging(Arc<ChargingStation>),
}

impl Coordinator {
    pub fn build(
        problem: ProblemKind,
        strategy: StrategyKind,
        config: &LabConfig,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let poll = config.poll_interval;
        match problem {
            ProblemKind::BoundedBuffer => {
                Coordinator::Buffer(Arc::new(BufferCoordinator::new(strategy, poll, sink)))
            }
            ProblemKind::DiningPhilosophers => Coordinator::Dining(Arc::new(TableCoordinator::new(
                strategy,
                config.seats,
                poll,
                config.retry_backoff,
                sink,
            ))),
            ProblemKind::SleepingBarber => Coordinator::Barber(Arc::new(BarberShop::new(
                strategy,
                config.waiting_chairs,
                poll,
                sink,
            ))),
            ProblemKind::ReadersWriters => Coordinator::ReadersWriters(Arc::new(Blackboard::new(
                strategy,
                config.preference,
                poll,
                sink,
            ))),
            ProblemKind::Smokers => {
                Coordinator::Smokers(Arc::new(SmokersTable::new(strategy, poll, sink)))
            }
            ProblemKind::ChargingStation => Coordinator::Charging(Arc::new(ChargingStation::new(
                strategy,
                config.bays,
                config.drone_queue_limit,
                poll,
                sink,
            ))),
        }
    }

    pub fn problem(&self) -> ProblemKind {
        match self {
            Coordinator::Buffer(_) => ProblemKind::BoundedBuffer,
            Coordinator::Dining(_) => ProblemKind::DiningPhilosophers,
            Coordinator::Barber(_) => ProblemKind::SleepingBarber,
            Coordinator::ReadersWriters(_) => ProblemKind::ReadersWriters,
            Coordinator::Smokers(_) => ProblemKind::Smokers,
            Coordinator::Charging(_) => ProblemKind::ChargingStation,
        }
    }

    pub fn strategy(&self) -> StrategyKind {
        match self {
            Coordinator::Buffer(c) => c.strategy(),
            Coordinator::Dining(c) => c.strategy(),
            Coordinator::Barber(c) => c.strategy(),
            Coordinator::ReadersWriters(c) => c.strategy(),
            Coordinator::Smokers(c) => c.strategy(),
            Coordinator::Charging(c) => c.strategy(),
        }
    }

    /// One-line report of the problem's counters.
    pub fn summary(&self) -> String {
        match self {
            Coordinator::Buffer(c) => c.summary(),
            Coordinator::Dining(c) => c.summary(),
            Coordinator::Barber(c) => c.summary(),
            Coordinator::ReadersWriters(c) => c.summary(),
            Coordinator::Smokers(c) => c.summary(),
            Coordinator::Charging(c) => c.summary(),
        }
    }

    pub fn interrupt(&self) {
        match self {
            Coordinator::Buffer(c) => c.interrupt(),
            Coordinator::Dining(c) => c.interrupt(),
            Coordinator::Barber(c) => c.interrupt(),
            Coordinator::ReadersWriters(c) => c.interrupt(),
            Coordinator::Smokers(c) => c.interrupt(),
            Coordinator::Charging(c) => c.interrupt(),
        }
    }

    pub fn is_faulted(&self) -> bool {
        match self {
            Coordinator::Buffer(c) => c.is_faulted(),
            Coordinator::Dining(c) => c.is_faulted(),
            Coordinator::Barber(c) => c.is_faulted(),
            Coordinator::ReadersWriters(c) => c.is_faulted(),
            Coordinator::Smokers(c) => c.is_faulted(),
            Coordinator::Charging(c) => c.is_faulted(),
        }
    }
}

/// What happened to the actors stopped by [`Controller::cancel_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shutdown {
    pub stopped: usize,
    pub panicked: usize,
}

pub struct Controller {
    config: LabConfig,
    sink: Arc<dyn StateSink>,
    coordinator: Option<Coordinator>,
    actors: Vec<ActorHandle>,
}

impl Controller {
    pub fn new(config: LabConfig, sink: Arc<dyn StateSink>) -> Self {
        Self {
            config,
            sink,
            coordinator: None,
            actors: Vec::new(),
        }
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn coordinator(&self) -> Option<&Coordinator> {
        self.coordinator.as_ref()
    }

    pub fn running_actors(&self) -> usize {
        self.actors.iter().filter(|a| !a.is_finished()).count()
    }

    /// Replaces the active coordinator, stopping every actor of the old one.
    pub fn create_coordinator(&mut self, problem: ProblemKind, strategy: StrategyKind) -> Coordinator {
        self.cancel_all();
        self.coordinator = None;
        let coordinator = Coordinator::build(problem, strategy, &self.config, Arc::clone(&self.sink));
        info!("{} coordinator ready under the {} strategy", problem, strategy);
        self.coordinator = Some(coordinator.clone());
        coordinator
    }

    /// Spawns the actors of the active coordinator and returns their ids.
    ///
    /// Each identity exists once per coordinator, so this fails while the
    /// actors of an earlier call have not been stopped by [`Controller::cancel_all`].
    pub fn spawn_actors(&mut self, counts: &ActorCounts) -> Result<Vec<ActorId>, ControllerError> {
        let coordinator = self
            .coordinator
            .clone()
            .ok_or(ControllerError::NoCoordinator)?;
        if !self.actors.is_empty() {
            return Err(ControllerError::ActorsRunning(self.actors.len()));
        }
        let before = self.actors.len();
        let timing = self.config.timing.clone();
        match coordinator {
            Coordinator::Buffer(tank) => {
                for i in 0..counts.producers {
                    let (tank, timing) = (Arc::clone(&tank), timing.clone());
                    self.launch(ActorId::Producer(i), move |ctx| {
                        buffer::actors::producer(ctx, &tank, &timing)
                    })?;
                }
                for i in 0..counts.consumers {
                    let (tank, timing) = (Arc::clone(&tank), timing.clone());
                    self.launch(ActorId::Consumer(i), move |ctx| {
                        buffer::actors::consumer(ctx, &tank, &timing)
                    })?;
                }
            }
            Coordinator::Dining(table) => {
                for seat in 0..table.seats() {
                    let (table, timing) = (Arc::clone(&table), timing.clone());
                    self.launch(ActorId::Philosopher(seat), move |ctx| {
                        dining::actors::philosopher(ctx, &table, seat, &timing)
                    })?;
                }
            }
            Coordinator::Barber(shop) => {
                {
                    let (shop, timing) = (Arc::clone(&shop), timing.clone());
                    self.launch(ActorId::Barber, move |ctx| {
                        barber::actors::barber(ctx, &shop, &timing)
                    })?;
                }
                for i in 0..counts.customers {
                    let (shop, timing) = (Arc::clone(&shop), timing.clone());
                    self.launch(ActorId::Customer(i), move |ctx| {
                        barber::actors::customer(ctx, &shop, i, &timing)
                    })?;
                }
            }
            Coordinator::ReadersWriters(board) => {
                for i in 0..counts.readers {
                    let (board, timing) = (Arc::clone(&board), timing.clone());
                    self.launch(ActorId::Reader(i), move |ctx| {
                        readers_writers::actors::reader(ctx, &board, i, &timing)
                    })?;
                }
                for i in 0..counts.writers {
                    let (board, timing) = (Arc::clone(&board), timing.clone());
                    self.launch(ActorId::Writer(i), move |ctx| {
                        readers_writers::actors::writer(ctx, &board, i, &timing)
                    })?;
                }
            }
            Coordinator::Smokers(table) => {
                {
                    let (table, timing) = (Arc::clone(&table), timing.clone());
                    self.launch(ActorId::Agent, move |ctx| {
                        smokers::actors::agent(ctx, &table, &timing)
                    })?;
                }
                for owner in Ingredient::ALL {
                    let (table, timing) = (Arc::clone(&table), timing.clone());
                    self.launch(owner.smoker(), move |ctx| {
                        smokers::actors::smoker(ctx, &table, owner, &timing)
                    })?;
                }
            }
            Coordinator::Charging(station) => {
                {
                    let (station, timing) = (Arc::clone(&station), timing.clone());
                    self.launch(ActorId::PowerManager, move |ctx| {
                        charging::actors::power_manager(ctx, &station, &timing)
                    })?;
                }
                let threshold = self.config.critical_battery;
                for i in 0..counts.drones {
                    let (station, timing) = (Arc::clone(&station), timing.clone());
                    self.launch(ActorId::Drone(i), move |ctx| {
                        charging::actors::drone(ctx, &station, i, threshold, &timing)
                    })?;
                }
            }
        }
        let started: Vec<ActorId> = self.actors[before..].iter().map(ActorHandle::id).collect();
        info!("{} actors started", started.len());
        Ok(started)
    }

    /// Creates the coordinator and spawns its actors in one go.
    pub fn start(
        &mut self,
        problem: ProblemKind,
        strategy: StrategyKind,
        counts: &ActorCounts,
    ) -> Result<Coordinator, ControllerError> {
        let coordinator = self.create_coordinator(problem, strategy);
        if let Err(err) = self.spawn_actors(counts) {
            self.cancel_all();
            return Err(err);
        }
        Ok(coordinator)
    }

    fn launch<F>(&mut self, id: ActorId, body: F) -> Result<(), ControllerError>
    where
        F: FnOnce(&ActorContext) -> Result<(), CoordinatorError> + Send + 'static,
    {
        let handle = actor::spawn(id, CancelToken::new(), Arc::clone(&self.sink), body)?;
        self.actors.push(handle);
        Ok(())
    }

    /// Cancels and joins every actor. The coordinator stays inspectable
    /// until the next [`Controller::create_coordinator`].
    pub fn cancel_all(&mut self) -> Shutdown {
        if self.actors.is_empty() {
            return Shutdown::default();
        }
        for actor in &self.actors {
            actor.cancel();
        }
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            if let Some(coordinator) = &self.coordinator {
                coordinator.interrupt();
            }
            if self.actors.iter().all(ActorHandle::is_finished) {
                break;
            }
            if Instant::now() >= deadline {
                warn!("{} actors still running after cancellation", self.running_actors());
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let mut shutdown = Shutdown::default();
        for actor in self.actors.drain(..) {
            if actor.join() {
                shutdown.stopped += 1;
            } else {
                shutdown.panicked += 1;
            }
        }
        if shutdown.panicked > 0 {
            error!("{} actors panicked", shutdown.panicked);
        }
        info!("{} actors stopped", shutdown.stopped);
        shutdown
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
