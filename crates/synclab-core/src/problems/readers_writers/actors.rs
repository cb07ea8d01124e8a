use super::Blackboard;
use crate::actor::ActorContext;
use crate::config::Timing;
use crate::error::CoordinatorError;
use crate::types::ActorState;
use log::trace;

pub fn reader(
    ctx: &ActorContext,
    board: &Blackboard,
    number: u32,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    while !ctx.is_cancelled() {
        ctx.set_state(ActorState::WaitingToRead);
        let Some(text) = board.start_read(number, ctx.cancel_token())?.done() else {
            break;
        };
        trace!("{} read {:?}", ctx.id(), text);
        let interrupted = ctx.pause(timing.read).is_cancelled();
        board.end_read(number)?;
        if interrupted || ctx.pause(timing.read_rest).is_cancelled() {
            break;
        }
    }
    Ok(())
}

pub fn writer(
    ctx: &ActorContext,
    board: &Blackboard,
    number: u32,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    let mut edition = 0u64;
    while !ctx.is_cancelled() {
        ctx.set_state(ActorState::WaitingToWrite);
        if board.start_write(number, ctx.cancel_token())?.is_cancelled() {
            break;
        }
        edition += 1;
        let interrupted = ctx.pause(timing.write).is_cancelled();
        board.end_write(number, format!("{} edition {}", ctx.id(), edition))?;
        if interrupted || ctx.pause(timing.write_rest).is_cancelled() {
            break;
        }
    }
    Ok(())
}
