use super::BarberShop;
use crate::actor::ActorContext;
use crate::cancel::{Admission, Outcome};
use crate::config::Timing;
use crate::error::CoordinatorError;
use crate::types::ActorState;

pub fn barber(
    ctx: &ActorContext,
    shop: &BarberShop,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    while !ctx.is_cancelled() {
        match shop.barber_cut(ctx.cancel_token())? {
            Outcome::Cancelled => break,
            Outcome::Done(_customer) => {
                // A haircut in progress is finished off even when cancelled.
                let interrupted = ctx.pause(timing.haircut).is_cancelled();
                shop.finish_cut()?;
                if interrupted {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Comes in at random intervals. A customer turned away simply tries again
/// on the next visit.
pub fn customer(
    ctx: &ActorContext,
    shop: &BarberShop,
    number: u32,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    while !ctx.is_cancelled() {
        ctx.set_state(ActorState::Idle);
        if ctx.pause(timing.customer_arrival).is_cancelled() {
            break;
        }
        match shop.customer_arrives(number)? {
            Admission::Rejected => continue,
            Admission::Admitted => {
                if shop.await_service(number, ctx.cancel_token())?.is_cancelled() {
                    break;
                }
            }
        }
    }
    Ok(())
}
