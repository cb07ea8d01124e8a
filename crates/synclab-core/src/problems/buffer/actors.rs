use super::BufferCoordinator;
use crate::actor::ActorContext;
use crate::config::Timing;
use crate::error::CoordinatorError;
use crate::types::ActorState;

pub fn producer(
    ctx: &ActorContext,
    buffer: &BufferCoordinator,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    while !ctx.is_cancelled() {
        ctx.set_state(ActorState::Waiting);
        if buffer.produce(ctx.id(), ctx.cancel_token())?.is_cancelled() {
            break;
        }
        ctx.set_state(ActorState::Producing);
        if ctx.pause(timing.produce).is_cancelled() {
            break;
        }
    }
    Ok(())
}

pub fn consumer(
    ctx: &ActorContext,
    buffer: &BufferCoordinator,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    while !ctx.is_cancelled() {
        ctx.set_state(ActorState::Waiting);
        if buffer.consume(ctx.id(), ctx.cancel_token())?.is_cancelled() {
            break;
        }
        ctx.set_state(ActorState::Consuming);
        if ctx.pause(timing.consume).is_cancelled() {
            break;
        }
    }
    Ok(())
}
