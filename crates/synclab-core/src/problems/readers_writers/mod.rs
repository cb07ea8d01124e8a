//! Readers and writers sharing a blackboard.
//!
//! Any number of readers may read together; a writer needs the board to
//! itself. Which side goes first after a write is fixed per board by its
//! [`Preference`].

pub mod actors;

use crate::cancel::{CancelToken, Outcome};
use crate::error::CoordinatorError;
use crate::shared::{Invariant, Shared};
use crate::sink::{Events, StateSink};
use crate::strategy::{CondId, StrategyKind};
use crate::types::{ActorId, ActorState, ProblemKind, ResourceId};
use core::fmt;
use core::str::FromStr;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

const OK_TO_READ: CondId = CondId(0);
const OK_TO_WRITE: CondId = CondId(1);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Preference {
    /// New readers wait behind any waiting writer.
    Writers,
    /// Waiting readers are let in before the next writer.
    Readers,
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preference::Writers => f.write_str("writers"),
            Preference::Readers => f.write_str("readers"),
        }
    }
}

impl FromStr for Preference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "writers" | "writer" => Ok(Preference::Writers),
            "readers" | "reader" => Ok(Preference::Readers),
            other => Err(format!("unknown preference: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardStats {
    pub readers_active: u32,
    pub readers_waiting: u32,
    pub writer_active: bool,
    pub writers_waiting: u32,
    pub reads: u64,
    pub writes: u64,
    pub text: String,
}

struct Board {
    text: String,
    preference: Preference,
    readers_active: u32,
    readers_waiting: u32,
    writer_active: bool,
    writers_waiting: u32,
    reads: u64,
    writes: u64,
}

impl Board {
    fn reader_blocked(&self) -> bool {
        self.writer_active || (self.preference == Preference::Writers && self.writers_waiting > 0)
    }

    fn writer_blocked(&self) -> bool {
        self.writer_active || self.readers_active > 0
    }
}

impl Invariant for Board {
    fn check(&self) -> Result<(), String> {
        if self.writer_active && self.readers_active > 0 {
            return Err(format!(
                "writer active alongside {} readers",
                self.readers_active
            ));
        }
        Ok(())
    }
}

pub struct Blackboard {
    shared: Shared<Board>,
}

impl Blackboard {
    pub fn new(
        strategy: StrategyKind,
        preference: Preference,
        poll_interval: Duration,
        sink: Arc<dyn StateSink>,
    ) -> Self {
        let board = Board {
            text: String::new(),
            preference,
            readers_active: 0,
            readers_waiting: 0,
            writer_active: false,
            writers_waiting: 0,
            reads: 0,
            writes: 0,
        };
        Self {
            shared: Shared::new(
                ProblemKind::ReadersWriters,
                strategy,
                board,
                2,
                poll_interval,
                sink,
            ),
        }
    }

    /// Waits for read access and returns the current text.
    pub fn start_read(
        &self,
        reader: u32,
        cancel: &CancelToken,
    ) -> Result<Outcome<String>, CoordinatorError> {
        let id = ActorId::Reader(reader);
        self.shared.sink().on_request_edge(id, ResourceId::Blackboard);
        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            section.state().readers_waiting += 1;
            let waited = section.wait_while(OK_TO_READ, cancel, &mut Board::reader_blocked);
            let board = section.state();
            board.readers_waiting -= 1;
            let outcome = if waited.is_cancelled() {
                events.clear(id, ResourceId::Blackboard);
                Outcome::Cancelled
            } else {
                board.readers_active += 1;
                board.reads += 1;
                events.grant(ResourceId::Blackboard, id);
                events.state(id, ActorState::Reading);
                events.level(ResourceId::Blackboard, board.readers_active);
                Outcome::Done(board.text.clone())
            };
            (outcome, board.check())
        };
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    /// Leaves the board; the last reader out lets a writer in.
    pub fn end_read(&self, reader: u32) -> Result<(), CoordinatorError> {
        let id = ActorId::Reader(reader);
        let mut events = Events::new();
        let verdict = {
            let mut section = self.shared.enter()?;
            let board = section.state();
            match board.readers_active.checked_sub(1) {
                None => Err(format!("{} ended a read nobody started", id)),
                Some(remaining) => {
                    board.readers_active = remaining;
                    events.clear(id, ResourceId::Blackboard);
                    events.state(id, ActorState::Idle);
                    events.level(ResourceId::Blackboard, remaining);
                    if remaining == 0 {
                        section.signal(OK_TO_WRITE);
                    }
                    section.state().check()
                }
            }
        };
        self.shared.settle(events, verdict)
    }

    /// Waits until no reader or writer is on the board.
    pub fn start_write(
        &self,
        writer: u32,
        cancel: &CancelToken,
    ) -> Result<Outcome<()>, CoordinatorError> {
        let id = ActorId::Writer(writer);
        self.shared.sink().on_request_edge(id, ResourceId::Blackboard);
        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            section.state().writers_waiting += 1;
            let waited = section.wait_while(OK_TO_WRITE, cancel, &mut Board::writer_blocked);
            section.state().writers_waiting -= 1;
            let outcome = if waited.is_cancelled() {
                // Readers held back by this writer may go in now.
                if !section.state().reader_blocked() {
                    section.signal_all(OK_TO_READ);
                }
                events.clear(id, ResourceId::Blackboard);
                Outcome::Cancelled
            } else {
                section.state().writer_active = true;
                events.grant(ResourceId::Blackboard, id);
                events.state(id, ActorState::Writing);
                Outcome::Done(())
            };
            (outcome, section.state().check())
        };
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    /// Stores `value` and hands the board to the preferred side.
    pub fn end_write(&self, writer: u32, value: String) -> Result<(), CoordinatorError> {
        let id = ActorId::Writer(writer);
        let mut events = Events::new();
        let verdict = {
            let mut section = self.shared.enter()?;
            let board = section.state();
            if !board.writer_active {
                Err(format!("{} ended a write it never started", id))
            } else {
                debug!("{} wrote {:?}", id, value);
                board.text = value;
                board.writes += 1;
                board.writer_active = false;
                let writers_waiting = board.writers_waiting;
                let readers_waiting = board.readers_waiting;
                let preference = board.preference;
                events.clear(id, ResourceId::Blackboard);
                events.state(id, ActorState::Idle);
                match preference {
                    Preference::Writers if writers_waiting > 0 => section.signal(OK_TO_WRITE),
                    Preference::Writers => section.signal_all(OK_TO_READ),
                    Preference::Readers if readers_waiting > 0 => section.signal_all(OK_TO_READ),
                    Preference::Readers => section.signal(OK_TO_WRITE),
                }
                section.state().check()
            }
        };
        self.shared.settle(events, verdict)
    }

    pub fn preference(&self) -> Preference {
        self.shared.peek(|board| board.preference)
    }

    pub fn stats(&self) -> BoardStats {
        self.shared.peek(|board| BoardStats {
            readers_active: board.readers_active,
            readers_waiting: board.readers_waiting,
            writer_active: board.writer_active,
            writers_waiting: board.writers_waiting,
            reads: board.reads,
            writes: board.writes,
            text: board.text.clone(),
        })
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "{} reads, {} writes, board reads {:?}",
            stats.reads, stats.writes, stats.text
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
