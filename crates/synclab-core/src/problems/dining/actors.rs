use super::TableCoordinator;
use crate::actor::ActorContext;
use crate::config::Timing;
use crate::error::CoordinatorError;
use crate::types::ActorState;

/// Think, get hungry, eat, put the forks down. Forks are always put down,
/// even when cancellation cuts a meal short.
pub fn philosopher(
    ctx: &ActorContext,
    table: &TableCoordinator,
    seat: usize,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    ctx.set_state(ActorState::Thinking);
    while !ctx.is_cancelled() {
        if ctx.pause(timing.think).is_cancelled() {
            break;
        }
        if table.pick_up(seat, ctx.cancel_token())?.is_cancelled() {
            break;
        }
        let interrupted = ctx.pause(timing.eat).is_cancelled();
        table.put_down(seat)?;
        if interrupted {
            break;
        }
    }
    Ok(())
}
