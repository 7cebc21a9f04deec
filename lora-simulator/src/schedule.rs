//! Tick sources for the publish loop.

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Something that says when the next publish cycle is due.
#[allow(async_fn_in_trait)]
pub trait Ticker {
    /// Waits for the next tick. `false` means the schedule is exhausted.
    async fn tick(&mut self) -> bool;
}

/// Wall-clock ticker. The first tick fires one full period after creation, and a
/// late tick is never followed by a burst of catch-up ticks.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}
