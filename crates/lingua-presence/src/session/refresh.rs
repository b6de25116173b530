//! Periodic liveness refresh ticks.

use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};

/// Builds the refresh ticker. The first tick fires one period from now.
pub fn ticker(period: Option<Duration>) -> Option<Interval> {
    period.map(|period| {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    })
}

/// Waits for the next tick, or forever when refresh is disabled.
pub async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
