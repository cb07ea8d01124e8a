use core::fmt;
use core::str::FromStr;

use crate::error::ControllerError;

/// The six coordination problems the lab can run.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProblemKind {
    BoundedBuffer,
    DiningPhilosophers,
    SleepingBarber,
    ReadersWriters,
    Smokers,
    ChargingStation,
}

impl ProblemKind {
    pub const ALL: [ProblemKind; 6] = [
        ProblemKind::BoundedBuffer,
        ProblemKind::DiningPhilosophers,
        ProblemKind::SleepingBarber,
        ProblemKind::ReadersWriters,
        ProblemKind::Smokers,
        ProblemKind::ChargingStation,
    ];

    /// Short name accepted on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            ProblemKind::BoundedBuffer => "buffer",
            ProblemKind::DiningPhilosophers => "dining",
            ProblemKind::SleepingBarber => "barber",
            ProblemKind::ReadersWriters => "readers-writers",
            ProblemKind::Smokers => "smokers",
            ProblemKind::ChargingStation => "charging",
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProblemKind {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buffer" | "producer-consumer" | "tank" => Ok(ProblemKind::BoundedBuffer),
            "dining" | "philosophers" => Ok(ProblemKind::DiningPhilosophers),
            "barber" | "sleeping-barber" => Ok(ProblemKind::SleepingBarber),
            "readers-writers" | "rw" | "blackboard" => Ok(ProblemKind::ReadersWriters),
            "smokers" | "cigarette-smokers" => Ok(ProblemKind::Smokers),
            "charging" | "station" | "drones" => Ok(ProblemKind::ChargingStation),
            _ => Err(ControllerError::UnknownProblem(s.to_string())),
        }
    }
}

/// Identity of an actor thread, as shown to a [`StateSink`](crate::sink::StateSink).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ActorId {
    Producer(u32),
    Consumer(u32),
    Philosopher(usize),
    Barber,
    Customer(u32),
    Reader(u32),
    Writer(u32),
    Agent,
    Smoker(usize),
    Drone(u32),
    PowerManager,
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Producer(id) => write!(f, "producer-{}", id),
            ActorId::Consumer(id) => write!(f, "consumer-{}", id),
            ActorId::Philosopher(id) => write!(f, "philosopher-{}", id),
            ActorId::Barber => f.write_str("barber"),
            ActorId::Customer(id) => write!(f, "customer-{}", id),
            ActorId::Reader(id) => write!(f, "reader-{}", id),
            ActorId::Writer(id) => write!(f, "writer-{}", id),
            ActorId::Agent => f.write_str("agent"),
            ActorId::Smoker(id) => write!(f, "smoker-{}", id),
            ActorId::Drone(id) => write!(f, "drone-{}", id),
            ActorId::PowerManager => f.write_str("power-manager"),
        }
    }
}

/// Resource nodes of the allocation graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ResourceId {
    Buffer,
    Fork(usize),
    WaitingRoom,
    BarberChair,
    Blackboard,
    Table,
    Bays,
    Power,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Buffer => f.write_str("buffer"),
            ResourceId::Fork(id) => write!(f, "fork-{}", id),
            ResourceId::WaitingRoom => f.write_str("waiting-room"),
            ResourceId::BarberChair => f.write_str("barber-chair"),
            ResourceId::Blackboard => f.write_str("blackboard"),
            ResourceId::Table => f.write_str("table"),
            ResourceId::Bays => f.write_str("bays"),
            ResourceId::Power => f.write_str("power"),
        }
    }
}

/// Display state of an actor.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ActorState {
    Idle,
    Producing,
    Consuming,
    Thinking,
    Hungry,
    Eating,
    Sleeping,
    Cutting,
    Waiting,
    BeingServed,
    Rejected,
    WaitingToRead,
    Reading,
    WaitingToWrite,
    Writing,
    Placing,
    Smoking,
    Flying,
    Queued { critical: bool },
    Charging,
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorState::Queued { critical: true } => f.write_str("queued (critical)"),
            ActorState::Queued { critical: false } => f.write_str("queued"),
            ActorState::BeingServed => f.write_str("being served"),
            ActorState::WaitingToRead => f.write_str("waiting to read"),
            ActorState::WaitingToWrite => f.write_str("waiting to write"),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_names_parse_back() {
        for problem in ProblemKind::ALL {
            assert_eq!(problem.name().parse::<ProblemKind>().unwrap(), problem);
        }
        assert!("juggling".parse::<ProblemKind>().is_err());
    }

    #[test]
    fn ids_render_for_graph_labels() {
        assert_eq!(ActorId::Philosopher(4).to_string(), "philosopher-4");
        assert_eq!(ResourceId::Fork(0).to_string(), "fork-0");
        assert_eq!(ActorState::Queued { critical: true }.to_string(), "queued (critical)");
        assert_eq!(ActorState::Eating.to_string(), "eating");
    }
}
