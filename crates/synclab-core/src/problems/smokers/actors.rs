use super::{Ingredient, SmokersTable};
use crate::actor::ActorContext;
use crate::config::Timing;
use crate::error::CoordinatorError;
use crate::types::ActorState;
use rand::seq::SliceRandom;

pub fn agent(
    ctx: &ActorContext,
    table: &SmokersTable,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    let mut rng = rand::thread_rng();
    while !ctx.is_cancelled() {
        let Some(&for_smoker) = Ingredient::ALL.choose(&mut rng) else {
            break;
        };
        if table
            .put_ingredients(for_smoker, ctx.cancel_token())?
            .is_cancelled()
        {
            break;
        }
        ctx.set_state(ActorState::Idle);
        if ctx.pause(timing.agent_rest).is_cancelled() {
            break;
        }
    }
    Ok(())
}

/// Smokes whenever its pair shows up. A cigarette that was lit is always
/// finished, so the agent is never left waiting on a departed smoker.
pub fn smoker(
    ctx: &ActorContext,
    table: &SmokersTable,
    owner: Ingredient,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    while !ctx.is_cancelled() {
        ctx.set_state(ActorState::Waiting);
        if table.take_ingredients(owner, ctx.cancel_token())?.is_cancelled() {
            break;
        }
        let interrupted = ctx.pause(timing.smoke).is_cancelled();
        table.finish_smoking(owner)?;
        if interrupted {
            break;
        }
    }
    Ok(())
}
