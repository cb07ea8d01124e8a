use thiserror::Error;

use crate::types::ProblemKind;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invariant violated in {problem}: {detail}")]
    InvariantViolation { problem: ProblemKind, detail: String },

    #[error("{0} coordinator is faulted after an invariant violation")]
    Faulted(ProblemKind),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("failed to spawn actor thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("unknown problem: {0}")]
    UnknownProblem(String),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("no coordinator has been created")]
    NoCoordinator,

    #[error("{0} actors are still attached to the coordinator")]
    ActorsRunning(usize),
}
