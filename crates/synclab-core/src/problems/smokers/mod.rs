//! Cigarette smokers.
//!
//! Each smoker has an endless supply of one ingredient and needs the other
//! two. The agent puts exactly the pair one designated smoker lacks on the
//! table and wakes only that smoker.

pub mod actors;

use crate::cancel::{CancelToken, Outcome};
use crate::error::CoordinatorError;
use crate::shared::{Invariant, Shared};
use crate::sink::{Events, StateSink};
use crate::strategy::{CondId, StrategyKind};
use crate::types::{ActorId, ActorState, ProblemKind, ResourceId};
use bitflags::bitflags;
use core::fmt;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

bitflags! {
    /// Ingredients lying on the table.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Ingredients: u8 {
        const TOBACCO = 1 << 0;
        const PAPER = 1 << 1;
        const MATCHES = 1 << 2;
    }
}

/// One ingredient, and with it the smoker who owns an endless supply of it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Ingredient {
    Tobacco,
    Paper,
    Matches,
}

impl Ingredient {
    pub const ALL: [Ingredient; 3] = [Ingredient::Tobacco, Ingredient::Paper, Ingredient::Matches];

    pub fn index(self) -> usize {
        match self {
            Ingredient::Tobacco => 0,
            Ingredient::Paper => 1,
            Ingredient::Matches => 2,
        }
    }

    pub fn flag(self) -> Ingredients {
        match self {
            Ingredient::Tobacco => Ingredients::TOBACCO,
            Ingredient::Paper => Ingredients::PAPER,
            Ingredient::Matches => Ingredients::MATCHES,
        }
    }

    /// The pair a smoker owning `self` needs.
    pub fn complement(self) -> Ingredients {
        Ingredients::all().difference(self.flag())
    }

    pub fn smoker(self) -> ActorId {
        ActorId::Smoker(self.index())
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ingredient::Tobacco => f.write_str("tobacco"),
            Ingredient::Paper => f.write_str("paper"),
            Ingredient::Matches => f.write_str("matches"),
        }
    }
}

const AGENT: CondId = CondId(0);

fn smoker_cond(owner: Ingredient) -> CondId {
    CondId(1 + owner.index())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmokersStats {
    pub on_table: Ingredients,
    pub smoking: Option<Ingredient>,
    pub placements: u64,
    pub consumptions: u64,
    pub smoked: [u64; 3],
}

struct Table {
    on_table: Ingredients,
    smoking: Option<Ingredient>,
    placements: u64,
    consumptions: u64,
    smoked: [u64; 3],
}

impl Table {
    fn busy(&self) -> bool {
        !self.on_table.is_empty() || self.smoking.is_some()
    }
}

impl Invariant for Table {
    fn check(&self) -> Result<(), String> {
        let count = self.on_table.bits().count_ones();
        if count != 0 && count != 2 {
            return Err(format!("{} ingredients on the table", count));
        }
        if self.placements < self.consumptions || self.placements > self.consumptions + 1 {
            return Err(format!(
                "{} placements against {} consumptions",
                self.placements, self.consumptions
            ));
        }
        if self.smoking.is_some() && !self.on_table.is_empty() {
            return Err("ingredients placed while someone smokes".to_string());
        }
        Ok(())
    }
}

pub struct SmokersTable {
    shared: Shared<Table>,
}

impl SmokersTable {
    pub fn new(strategy: StrategyKind, poll_interval: Duration, sink: Arc<dyn StateSink>) -> Self {
        let table = Table {
            on_table: Ingredients::empty(),
            smoking: None,
            placements: 0,
            consumptions: 0,
            smoked: [0; 3],
        };
        Self {
            shared: Shared::new(ProblemKind::Smokers, strategy, table, 4, poll_interval, sink),
        }
    }

    /// Agent: waits for a free table, then places the pair `for_smoker` lacks.
    pub fn put_ingredients(
        &self,
        for_smoker: Ingredient,
        cancel: &CancelToken,
    ) -> Result<Outcome<Ingredients>, CoordinatorError> {
        self.shared
            .sink()
            .on_request_edge(ActorId::Agent, ResourceId::Table);
        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            let waited = section.wait_while(AGENT, cancel, &mut Table::busy);
            let outcome = if waited.is_cancelled() {
                Outcome::Cancelled
            } else {
                let pair = for_smoker.complement();
                let table = section.state();
                table.on_table = pair;
                table.placements += 1;
                events.grant(ResourceId::Table, ActorId::Agent);
                events.state(ActorId::Agent, ActorState::Placing);
                events.level(ResourceId::Table, u32::from(pair.bits()));
                section.signal(smoker_cond(for_smoker));
                Outcome::Done(pair)
            };
            (outcome, section.state().check())
        };
        events.clear(ActorId::Agent, ResourceId::Table);
        if let Outcome::Done(pair) = outcome {
            debug!("agent placed {:?} for {}", pair, for_smoker.smoker());
        }
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    /// Smoker owning `owner`: waits for its pair and takes it off the table.
    pub fn take_ingredients(
        &self,
        owner: Ingredient,
        cancel: &CancelToken,
    ) -> Result<Outcome<()>, CoordinatorError> {
        let id = owner.smoker();
        self.shared.sink().on_request_edge(id, ResourceId::Table);
        let mut events = Events::new();
        let (outcome, verdict) = {
            let mut section = self.shared.enter()?;
            let needed = owner.complement();
            let waited = section.wait_while(smoker_cond(owner), cancel, &mut |t: &Table| {
                t.on_table != needed
            });
            let table = section.state();
            let outcome = if waited.is_cancelled() {
                events.clear(id, ResourceId::Table);
                Outcome::Cancelled
            } else {
                table.on_table = Ingredients::empty();
                table.smoking = Some(owner);
                table.consumptions += 1;
                table.smoked[owner.index()] += 1;
                events.grant(ResourceId::Table, id);
                events.state(id, ActorState::Smoking);
                events.level(ResourceId::Table, 0);
                Outcome::Done(())
            };
            (outcome, table.check())
        };
        self.shared.settle(events, verdict)?;
        Ok(outcome)
    }

    /// Smoker owning `owner` is done; the agent may place the next pair.
    pub fn finish_smoking(&self, owner: Ingredient) -> Result<(), CoordinatorError> {
        let id = owner.smoker();
        let mut events = Events::new();
        let verdict = {
            let mut section = self.shared.enter()?;
            if section.state().smoking != Some(owner) {
                Err(format!("{} finished without smoking", id))
            } else {
                section.state().smoking = None;
                events.clear(id, ResourceId::Table);
                events.state(id, ActorState::Waiting);
                section.signal(AGENT);
                section.state().check()
            }
        };
        self.shared.settle(events, verdict)
    }

    pub fn stats(&self) -> SmokersStats {
        self.shared.peek(|t| SmokersStats {
            on_table: t.on_table,
            smoking: t.smoking,
            placements: t.placements,
            consumptions: t.consumptions,
            smoked: t.smoked,
        })
    }

    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "{} placements, {} cigarettes (tobacco {}, paper {}, matches {})",
            stats.placements, stats.consumptions, stats.smoked[0], stats.smoked[1], stats.smoked[2]
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
