//! SyncLab core: six classic coordination problems, each runnable under four
//! interchangeable synchronization strategies, with every state change pushed
//! to a [`StateSink`].

pub mod actor;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod error;
pub mod graph;
pub mod problems;
mod shared;
pub mod sink;
pub mod strategy;
pub mod types;

pub use cancel::{Admission, CancelToken, Outcome, WaitOutcome};
pub use config::{ActorCounts, LabConfig, Span, Timing};
pub use controller::{Controller, Coordinator, Shutdown};
pub use error::{ControllerError, CoordinatorError};
pub use graph::ResourceGraph;
pub use shared::Invariant;
pub use sink::{ChannelSink, LogSink, Notification, NullSink, StateSink, Tee};
pub use strategy::{StrategyKind, SyncStrategy};
pub use types::{ActorId, ActorState, ProblemKind, ResourceId};
