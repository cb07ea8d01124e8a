//! Lab configuration: sizes of the shared resources, pacing of the actors and
//! how many actors of each role to spawn.

use crate::problems::readers_writers::Preference;
use rand::Rng;
use std::time::Duration;

/// Inclusive range an actor samples one activity duration from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Span {
    pub min: Duration,
    pub max: Duration,
}

impl Span {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn fixed(duration: Duration) -> Self {
        Self {
            min: duration,
            max: duration,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            min: self.min.mul_f64(factor),
            max: self.max.mul_f64(factor),
        }
    }
}

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// How long every actor activity lasts.
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub produce: Span,
    pub consume: Span,
    pub think: Span,
    pub eat: Span,
    pub customer_arrival: Span,
    pub haircut: Span,
    pub read: Span,
    pub read_rest: Span,
    pub write: Span,
    pub write_rest: Span,
    pub agent_rest: Span,
    pub smoke: Span,
    pub fly: Span,
    pub recharge: Span,
    pub solar_tick: Span,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            produce: Span::fixed(ms(1000)),
            consume: Span::fixed(ms(1200)),
            think: Span::new(ms(1000), ms(4000)),
            eat: Span::new(ms(1000), ms(4000)),
            customer_arrival: Span::new(ms(1000), ms(3000)),
            haircut: Span::new(ms(2000), ms(3000)),
            read: Span::new(ms(0), ms(1000)),
            read_rest: Span::new(ms(0), ms(1000)),
            write: Span::new(ms(0), ms(2000)),
            write_rest: Span::new(ms(0), ms(2000)),
            agent_rest: Span::new(ms(1000), ms(3000)),
            smoke: Span::new(ms(2000), ms(5000)),
            fly: Span::new(ms(1000), ms(3000)),
            recharge: Span::new(ms(1000), ms(2500)),
            solar_tick: Span::fixed(ms(1000)),
        }
    }
}

impl Timing {
    /// Every span multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        Self {
            produce: self.produce.scaled(factor),
            consume: self.consume.scaled(factor),
            think: self.think.scaled(factor),
            eat: self.eat.scaled(factor),
            customer_arrival: self.customer_arrival.scaled(factor),
            haircut: self.haircut.scaled(factor),
            read: self.read.scaled(factor),
            read_rest: self.read_rest.scaled(factor),
            write: self.write.scaled(factor),
            write_rest: self.write_rest.scaled(factor),
            agent_rest: self.agent_rest.scaled(factor),
            smoke: self.smoke.scaled(factor),
            fly: self.fly.scaled(factor),
            recharge: self.recharge.scaled(factor),
            solar_tick: self.solar_tick.scaled(factor),
        }
    }

    /// Millisecond-scale pacing for tests.
    pub fn fast() -> Self {
        Self::default().scaled(0.002)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabConfig {
    pub seats: usize,
    pub waiting_chairs: usize,
    pub bays: usize,
    /// Per-queue limit on waiting drones; `None` never rejects.
    pub drone_queue_limit: Option<usize>,
    pub critical_battery: u32,
    pub preference: Preference,
    /// Sleep between re-checks under the Lock strategy.
    pub poll_interval: Duration,
    /// Upper bound of the jittered back-off after a failed fork try-acquire.
    pub retry_backoff: Duration,
    pub timing: Timing,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            seats: 5,
            waiting_chairs: 4,
            bays: 3,
            drone_queue_limit: None,
            critical_battery: 30,
            preference: Preference::Writers,
            poll_interval: ms(100),
            retry_backoff: ms(100),
            timing: Timing::default(),
        }
    }
}

impl LabConfig {
    /// Defaults with fast pacing and short polls, for tests and demos.
    pub fn fast() -> Self {
        Self {
            poll_interval: ms(1),
            retry_backoff: ms(2),
            timing: Timing::fast(),
            ..Self::default()
        }
    }
}

/// How many actors of each role to spawn.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ActorCounts {
    pub producers: u32,
    pub consumers: u32,
    pub customers: u32,
    pub readers: u32,
    pub writers: u32,
    pub drones: u32,
}

impl Default for ActorCounts {
    fn default() -> Self {
        Self {
            producers: 1,
            consumers: 1,
            customers: 6,
            readers: 5,
            writers: 3,
            drones: 8,
        }
    }
}
