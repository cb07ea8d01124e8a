use super::ChargingStation;
use crate::actor::ActorContext;
use crate::cancel::{Admission, Outcome};
use crate::config::Timing;
use crate::error::CoordinatorError;
use crate::types::ActorState;
use log::{debug, trace};
use rand::Rng;

pub const FULL_BATTERY: u32 = 100;
pub const MAX_ENERGY: i32 = 150;
pub const INITIAL_ENERGY: i32 = 100;
const ENERGY_SWING: i32 = 15;

/// Battery left after one flight: a flight costs between 10 and 30 points.
pub fn drain(battery: u32, rng: &mut impl Rng) -> u32 {
    battery.saturating_sub(rng.gen_range(10..=30))
}

/// Next solar energy reading, a bounded random walk.
pub fn next_energy(energy: i32, rng: &mut impl Rng) -> i32 {
    (energy + rng.gen_range(-ENERGY_SWING..=ENERGY_SWING)).clamp(0, MAX_ENERGY)
}

/// Flies, drains its battery and queues for a bay. Below `critical_battery`
/// the drone queues as critical.
pub fn drone(
    ctx: &ActorContext,
    station: &ChargingStation,
    number: u32,
    critical_battery: u32,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    let mut rng = rand::thread_rng();
    let mut battery: u32 = rng.gen_range(50..=FULL_BATTERY);
    while !ctx.is_cancelled() {
        ctx.set_state(ActorState::Flying);
        if ctx.pause(timing.fly).is_cancelled() {
            break;
        }
        battery = drain(battery, &mut rng);
        let critical = battery < critical_battery;
        trace!("{} lands with {}% battery", ctx.id(), battery);
        ctx.set_state(ActorState::Queued { critical });
        match station.request_recharge(number, critical, ctx.cancel_token())? {
            Outcome::Cancelled => break,
            Outcome::Done(Admission::Rejected) => continue,
            Outcome::Done(Admission::Admitted) => {
                let interrupted = ctx.pause(timing.recharge).is_cancelled();
                battery = FULL_BATTERY;
                station.release_bay(number)?;
                if interrupted {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Follows the solar energy level and switches station power when it
/// crosses zero.
pub fn power_manager(
    ctx: &ActorContext,
    station: &ChargingStation,
    timing: &Timing,
) -> Result<(), CoordinatorError> {
    let mut rng = rand::thread_rng();
    let mut energy = INITIAL_ENERGY;
    let mut powered = true;
    station.set_power(powered)?;
    while !ctx.pause(timing.solar_tick).is_cancelled() {
        energy = next_energy(energy, &mut rng);
        debug!("solar energy {}", energy);
        if (energy > 0) != powered {
            powered = energy > 0;
            station.set_power(powered)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    proptest! {
        #[test]
        fn energy_stays_in_range(seed in any::<u64>(), start in 0..=MAX_ENERGY) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut energy = start;
            for _ in 0..200 {
                let next = next_energy(energy, &mut rng);
                prop_assert!((0..=MAX_ENERGY).contains(&next));
                prop_assert!((next - energy).abs() <= ENERGY_SWING);
                energy = next;
            }
        }

        #[test]
        fn flights_cost_ten_to_thirty(seed in any::<u64>(), battery in 0u32..=FULL_BATTERY) {
            let mut rng = StdRng::seed_from_u64(seed);
            let after = drain(battery, &mut rng);
            prop_assert!(after <= battery);
            prop_assert!(after == 0 || battery - after >= 10);
            prop_assert!(battery - after <= 30);
        }
    }
}
